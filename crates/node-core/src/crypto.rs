//! secp256k1 ECDSA key handling, P2PKH script construction, and sighash.
//!
//! # Signing scheme
//!
//! The sighash a signature commits to is a canonical serialization of the
//! transaction that excludes every `signature_script` (avoiding circularity,
//! since the script is what holds the signature being produced) but
//! includes everything else: version, every input's outpoint and sequence,
//! every output, locktime, and the index of the input being signed. This
//! lets each input be signed independently, in any order.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, SecretKey};

use crate::encoding::{base58check_decode, base58check_encode, hash160, sha256};
use crate::error::CryptoError;
use crate::types::{Hash256, Transaction};

/// Base58Check version byte for mainnet P2PKH addresses.
pub const ADDRESS_VERSION: u8 = 0x00;
/// Base58Check version byte for WIF-encoded private keys.
pub const WIF_VERSION: u8 = 0x80;

fn secp() -> secp256k1::Secp256k1<secp256k1::All> {
    secp256k1::Secp256k1::new()
}

/// A secp256k1 keypair.
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let (secret_key, _) = secp().generate_keypair(&mut rng);
        KeyPair { secret_key }
    }

    /// Build a keypair from 32 bytes of secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(KeyPair { secret_key })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        let public_key = Secp256k1PublicKey::from_secret_key(&secp(), &self.secret_key);
        PublicKey { public_key }
    }

    /// Encode this private key as a Base58Check WIF string.
    pub fn to_wif(&self) -> String {
        base58check_encode(WIF_VERSION, &self.secret_bytes())
    }

    /// Decode a Base58Check WIF string into a keypair.
    pub fn from_wif(wif: &str) -> Result<Self, CryptoError> {
        let (version, payload) = base58check_decode(wif).map_err(|_| CryptoError::InvalidPrivateKey)?;
        if version != WIF_VERSION || payload.len() != 32 {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let bytes: [u8; 32] = payload.try_into().unwrap();
        Self::from_secret_bytes(bytes)
    }

    /// Sign a 32-byte message digest, producing a DER-encoded ECDSA signature.
    pub fn sign(&self, message_hash: &Hash256) -> Vec<u8> {
        let message = Message::from_digest_slice(message_hash.as_bytes()).expect("32-byte digest");
        let sig = secp().sign_ecdsa(&message, &self.secret_key);
        sig.serialize_der().to_vec()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// A secp256k1 public key (compressed, 33-byte form on the wire).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    public_key: Secp256k1PublicKey,
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let public_key = Secp256k1PublicKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(PublicKey { public_key })
    }

    /// Compressed (33-byte) SEC1 encoding, the form used in scripts and addresses.
    pub fn to_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    /// `hash160(compressed_pubkey)`, the recipient identifier stored in a
    /// P2PKH `pubkey_script`.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// The Base58Check P2PKH address string for this key.
    pub fn to_address(&self) -> String {
        base58check_encode(ADDRESS_VERSION, &self.hash160())
    }

    pub fn verify(&self, message_hash: &Hash256, der_signature: &[u8]) -> Result<(), CryptoError> {
        let message = Message::from_digest_slice(message_hash.as_bytes()).expect("32-byte digest");
        let sig = Signature::from_der(der_signature).map_err(|_| CryptoError::InvalidSignature)?;
        secp()
            .verify_ecdsa(&message, &sig, &self.public_key)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// Decode a Base58Check P2PKH address into its 20-byte hash160.
pub fn address_to_hash160(address: &str) -> Result<[u8; 20], CryptoError> {
    let (version, payload) = base58check_decode(address).map_err(|_| CryptoError::InvalidPublicKey)?;
    if version != ADDRESS_VERSION || payload.len() != 20 {
        return Err(CryptoError::InvalidPublicKey);
    }
    Ok(payload.try_into().unwrap())
}

/// Split a `signature_script` (`sig_hex || pubkey_hex`, concatenated as raw
/// bytes) into its signature and public key parts.
///
/// secp256k1 compressed public keys are always exactly 33 bytes, so the
/// split point is unambiguous: everything before the last 33 bytes is the
/// DER signature.
pub fn split_signature_script(signature_script: &[u8]) -> Result<(&[u8], &[u8]), CryptoError> {
    if signature_script.len() <= 33 {
        return Err(CryptoError::InvalidSignature);
    }
    let split_at = signature_script.len() - 33;
    Ok(signature_script.split_at(split_at))
}

/// Build a `signature_script` from a DER signature and compressed public key.
pub fn build_signature_script(der_signature: &[u8], public_key: &PublicKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(der_signature.len() + 33);
    out.extend_from_slice(der_signature);
    out.extend_from_slice(&public_key.to_bytes());
    out
}

/// Compute the sighash for signing/verifying input `input_index` of `tx`.
///
/// Commits to version, every input's outpoint and sequence (never the
/// script), every output, and locktime, plus the index being signed, then
/// hashes the result with a single SHA-256 (the digest consumed directly by
/// ECDSA, not double-hashed like a txid).
pub fn sighash(tx: &Transaction, input_index: usize) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InvalidSignature);
    }

    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());

    data.extend_from_slice(&(tx.inputs.len() as u32).to_le_bytes());
    for input in &tx.inputs {
        data.extend_from_slice(input.prev_txid.as_bytes());
        data.extend_from_slice(&input.prev_output_index.to_le_bytes());
        data.extend_from_slice(&input.sequence.to_le_bytes());
    }

    data.extend_from_slice(&(tx.outputs.len() as u32).to_le_bytes());
    for output in &tx.outputs {
        data.extend_from_slice(&output.value.to_le_bytes());
        data.extend_from_slice(&output.pubkey_script);
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&(input_index as u32).to_le_bytes());

    Ok(Hash256::from_bytes(sha256(&data)))
}

/// Sign input `input_index` of `tx` in place with `keypair`, writing the
/// resulting `signature_script`.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let hash = sighash(tx, input_index)?;
    let der_signature = keypair.sign(&hash);
    let script = build_signature_script(&der_signature, &keypair.public_key());
    tx.inputs[input_index].signature_script = script;
    Ok(())
}

/// Verify input `input_index` of `tx` against the hash160 recorded on the
/// referenced output (`expected_pubkey_script`).
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    expected_pubkey_script: &[u8],
) -> Result<(), CryptoError> {
    let input = tx.inputs.get(input_index).ok_or(CryptoError::InvalidSignature)?;
    let (der_signature, pubkey_bytes) = split_signature_script(&input.signature_script)?;
    let public_key = PublicKey::from_bytes(pubkey_bytes)?;

    if public_key.hash160().as_slice() != expected_pubkey_script {
        return Err(CryptoError::SignatureVerificationFailed);
    }

    let hash = sighash(tx, input_index)?;
    public_key.verify(&hash, der_signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TransactionInput, TransactionOutput};

    fn unsigned_tx(recipient: &PublicKey) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: Hash256::from_bytes([0x11; 32]),
                prev_output_index: 0,
                signature_script: vec![],
                sequence: 0xFFFF_FFFF,
            }],
            outputs: vec![TransactionOutput {
                value: 50_0000_0000,
                pubkey_script: recipient.hash160().to_vec(),
            }],
            lock_time: 0,
        }
    }

    // --- KeyPair ---

    #[test]
    fn keypair_generate_is_unique() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn keypair_from_secret_bytes_is_deterministic() {
        let seed = [0x42u8; 32];
        let a = KeyPair::from_secret_bytes(seed).unwrap();
        let b = KeyPair::from_secret_bytes(seed).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn keypair_rejects_zero_secret() {
        assert!(KeyPair::from_secret_bytes([0u8; 32]).is_err());
    }

    #[test]
    fn keypair_wif_round_trip() {
        let kp = KeyPair::generate();
        let wif = kp.to_wif();
        let decoded = KeyPair::from_wif(&wif).unwrap();
        assert_eq!(kp.public_key(), decoded.public_key());
    }

    #[test]
    fn keypair_debug_omits_secret_bytes() {
        let kp = KeyPair::generate();
        let debug = format!("{kp:?}");
        let secret_hex = hex::encode(kp.secret_bytes());
        assert!(!debug.contains(&secret_hex));
    }

    // --- PublicKey / addresses ---

    #[test]
    fn public_key_hash160_is_twenty_bytes() {
        let pk = KeyPair::generate().public_key();
        assert_eq!(pk.hash160().len(), 20);
    }

    #[test]
    fn address_round_trips_to_hash160() {
        let pk = KeyPair::generate().public_key();
        let address = pk.to_address();
        let decoded = address_to_hash160(&address).unwrap();
        assert_eq!(decoded, pk.hash160());
    }

    #[test]
    fn different_keys_yield_different_addresses() {
        let a = KeyPair::generate().public_key().to_address();
        let b = KeyPair::generate().public_key().to_address();
        assert_ne!(a, b);
    }

    // --- sighash ---

    #[test]
    fn sighash_deterministic() {
        let pk = KeyPair::generate().public_key();
        let tx = unsigned_tx(&pk);
        assert_eq!(sighash(&tx, 0).unwrap(), sighash(&tx, 0).unwrap());
    }

    #[test]
    fn sighash_ignores_signature_script_contents() {
        let pk = KeyPair::generate().public_key();
        let tx1 = unsigned_tx(&pk);
        let mut tx2 = tx1.clone();
        tx2.inputs[0].signature_script = vec![0xAB; 70];
        assert_eq!(sighash(&tx1, 0).unwrap(), sighash(&tx2, 0).unwrap());
    }

    #[test]
    fn sighash_changes_with_output_value() {
        let pk = KeyPair::generate().public_key();
        let tx1 = unsigned_tx(&pk);
        let mut tx2 = tx1.clone();
        tx2.outputs[0].value -= 1;
        assert_ne!(sighash(&tx1, 0).unwrap(), sighash(&tx2, 0).unwrap());
    }

    #[test]
    fn sighash_changes_with_locktime() {
        let pk = KeyPair::generate().public_key();
        let tx1 = unsigned_tx(&pk);
        let mut tx2 = tx1.clone();
        tx2.lock_time = 500_000;
        assert_ne!(sighash(&tx1, 0).unwrap(), sighash(&tx2, 0).unwrap());
    }

    #[test]
    fn sighash_out_of_bounds_input_index_errors() {
        let pk = KeyPair::generate().public_key();
        let tx = unsigned_tx(&pk);
        assert!(sighash(&tx, 5).is_err());
    }

    // --- sign / verify transaction input ---

    #[test]
    fn sign_and_verify_round_trip() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(&kp.public_key());
        sign_transaction_input(&mut tx, 0, &kp).unwrap();
        assert!(verify_transaction_input(&tx, 0, &kp.public_key().hash160()).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_expected_hash160() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(&kp.public_key());
        sign_transaction_input(&mut tx, 0, &kp).unwrap();
        let wrong = [0xFFu8; 20];
        assert!(verify_transaction_input(&tx, 0, &wrong).is_err());
    }

    #[test]
    fn verify_rejects_tampered_output_after_signing() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(&kp.public_key());
        sign_transaction_input(&mut tx, 0, &kp).unwrap();
        tx.outputs[0].value = 1;
        assert!(verify_transaction_input(&tx, 0, &kp.public_key().hash160()).is_err());
    }

    #[test]
    fn verify_rejects_signature_from_wrong_key() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let mut tx = unsigned_tx(&kp1.public_key());
        // Signed by kp2, but the output is claimed to belong to kp1.
        sign_transaction_input(&mut tx, 0, &kp2).unwrap();
        assert!(verify_transaction_input(&tx, 0, &kp1.public_key().hash160()).is_err());
    }

    #[test]
    fn split_signature_script_round_trips_with_build() {
        let kp = KeyPair::generate();
        let sig = kp.sign(&Hash256::from_bytes([1u8; 32]));
        let script = build_signature_script(&sig, &kp.public_key());
        let (der, pubkey_bytes) = split_signature_script(&script).unwrap();
        assert_eq!(der, sig.as_slice());
        assert_eq!(pubkey_bytes, kp.public_key().to_bytes());
    }
}
