//! Core wire-format data types: hashes, transactions, block headers, blocks,
//! and UTXO entries.
//!
//! Every `serialize`/`deserialize` pair here is hand-rolled rather than
//! derived through `serde`/`bincode`, because the byte layout is externally
//! fixed (see module docs in [`crate::encoding`]) rather than free for this
//! crate to choose.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::{double_sha256, read_varint, write_varint};
use crate::error::EncodingError;

/// A 32-byte double-SHA256 digest.
///
/// Stored internally in natural (little-endian) byte order, but `Display`
/// and `Debug` print it in reversed "RPC byte order" to match the
/// conventional hex representation of block and transaction hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Hex-encode in reversed byte order, the conventional display form.
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse a reversed-byte-order hex string back into natural order.
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let mut bytes = hex::decode(s).map_err(|_| EncodingError::InvalidEncoding)?;
        if bytes.len() != 32 {
            return Err(EncodingError::InvalidEncoding);
        }
        bytes.reverse();
        let array: [u8; 32] = bytes.try_into().unwrap();
        Ok(Hash256(array))
    }

    /// Interpret the hash as a big-endian 256-bit integer, after reversing
    /// the raw little-endian bytes. Used for PoW target comparisons.
    pub fn to_be_u256(&self) -> [u8; 32] {
        let mut reversed = self.0;
        reversed.reverse();
        reversed
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A transaction output reference: the txid being spent and the index of
/// the output within that transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// The marker outpoint used by coinbase inputs: zero txid, max index.
    pub fn coinbase_marker() -> Self {
        OutPoint {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    pub fn is_coinbase_marker(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl fmt::Debug for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// One input of a transaction.
///
/// For a P2PKH-template spend, `signature_script` is the concatenation of
/// the raw ECDSA signature bytes and the raw public key bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prev_txid: Hash256,
    pub prev_output_index: u32,
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

impl TransactionInput {
    pub fn previous_output(&self) -> OutPoint {
        OutPoint {
            txid: self.prev_txid,
            index: self.prev_output_index,
        }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.prev_txid.as_bytes());
        out.extend_from_slice(&self.prev_output_index.to_le_bytes());
        write_varint(out, self.signature_script.len() as u64);
        out.extend_from_slice(&self.signature_script);
        out.extend_from_slice(&self.sequence.to_le_bytes());
    }

    fn deserialize_from(data: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let txid_bytes: [u8; 32] = data
            .get(offset..offset + 32)
            .ok_or(EncodingError::UnexpectedEof)?
            .try_into()
            .unwrap();
        offset += 32;
        let index_bytes: [u8; 4] = data
            .get(offset..offset + 4)
            .ok_or(EncodingError::UnexpectedEof)?
            .try_into()
            .unwrap();
        let prev_output_index = u32::from_le_bytes(index_bytes);
        offset += 4;
        let (script_len, consumed) = read_varint(&data[offset..])?;
        offset += consumed;
        let signature_script = data
            .get(offset..offset + script_len as usize)
            .ok_or(EncodingError::UnexpectedEof)?
            .to_vec();
        offset += script_len as usize;
        let sequence_bytes: [u8; 4] = data
            .get(offset..offset + 4)
            .ok_or(EncodingError::UnexpectedEof)?
            .try_into()
            .unwrap();
        let sequence = u32::from_le_bytes(sequence_bytes);
        offset += 4;
        Ok((
            TransactionInput {
                prev_txid: Hash256::from_bytes(txid_bytes),
                prev_output_index,
                signature_script,
                sequence,
            },
            offset,
        ))
    }
}

/// One output of a transaction.
///
/// `pubkey_script` holds the raw 20-byte hash160 of the recipient's public
/// key for the P2PKH template this crate implements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: i64,
    pub pubkey_script: Vec<u8>,
}

impl TransactionOutput {
    /// An output below [`crate::constants::DUST_THRESHOLD`] is not rejected
    /// by consensus, but is worth flagging to a caller that cares (e.g. a
    /// wallet deciding whether to include it in a spend).
    pub fn is_dust(&self) -> bool {
        self.value < crate::constants::DUST_THRESHOLD
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        write_varint(out, self.pubkey_script.len() as u64);
        out.extend_from_slice(&self.pubkey_script);
    }

    fn deserialize_from(data: &[u8]) -> Result<(Self, usize), EncodingError> {
        let value_bytes: [u8; 8] = data.get(0..8).ok_or(EncodingError::UnexpectedEof)?.try_into().unwrap();
        let value = i64::from_le_bytes(value_bytes);
        let mut offset = 8;
        let (script_len, consumed) = read_varint(&data[offset..])?;
        offset += consumed;
        let pubkey_script = data
            .get(offset..offset + script_len as usize)
            .ok_or(EncodingError::UnexpectedEof)?
            .to_vec();
        offset += script_len as usize;
        Ok((TransactionOutput { value, pubkey_script }, offset))
    }
}

/// A transaction: a versioned list of inputs and outputs plus a locktime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// `version (4 LE) || varint(inputs) || inputs || varint(outputs) || outputs || locktime (4 LE)`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.serialize_into(&mut out);
        }
        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.serialize_into(&mut out);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, EncodingError> {
        let version_bytes: [u8; 4] = data.get(0..4).ok_or(EncodingError::UnexpectedEof)?.try_into().unwrap();
        let version = u32::from_le_bytes(version_bytes);
        let mut offset = 4;

        let (input_count, consumed) = read_varint(&data[offset..])?;
        offset += consumed;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            let (input, consumed) = TransactionInput::deserialize_from(&data[offset..])?;
            offset += consumed;
            inputs.push(input);
        }

        let (output_count, consumed) = read_varint(&data[offset..])?;
        offset += consumed;
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            let (output, consumed) = TransactionOutput::deserialize_from(&data[offset..])?;
            offset += consumed;
            outputs.push(output);
        }

        let lock_time_bytes: [u8; 4] = data
            .get(offset..offset + 4)
            .ok_or(EncodingError::UnexpectedEof)?
            .try_into()
            .unwrap();
        let lock_time = u32::from_le_bytes(lock_time_bytes);
        offset += 4;

        if offset != data.len() {
            return Err(EncodingError::TrailingBytes);
        }

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn txid(&self) -> Hash256 {
        Hash256::from_bytes(double_sha256(&self.serialize()))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output().is_coinbase_marker()
    }

    /// Sum of output values, or `None` on overflow.
    pub fn total_output_value(&self) -> Option<i64> {
        self.outputs
            .iter()
            .try_fold(0i64, |acc, out| acc.checked_add(out.value))
    }
}

/// An 80-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub nbits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 80;

    /// `version (4 LE) || prev_block_hash (32) || merkle_root (32) || timestamp (4 LE) || nbits (4 LE) || nonce (4 LE)`.
    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.nbits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, EncodingError> {
        if data.len() != Self::SIZE {
            return Err(EncodingError::InvalidEncoding);
        }
        let version = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let prev_block_hash = Hash256::from_bytes(data[4..36].try_into().unwrap());
        let merkle_root = Hash256::from_bytes(data[36..68].try_into().unwrap());
        let timestamp = u32::from_le_bytes(data[68..72].try_into().unwrap());
        let nbits = u32::from_le_bytes(data[72..76].try_into().unwrap());
        let nonce = u32::from_le_bytes(data[76..80].try_into().unwrap());
        Ok(BlockHeader {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            nbits,
            nonce,
        })
    }

    /// `SHA256(SHA256(serialize(header)))`.
    pub fn hash(&self) -> Hash256 {
        Hash256::from_bytes(double_sha256(&self.serialize()))
    }
}

/// A block: a header plus an ordered list of transactions, the first of
/// which must be the coinbase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn txids(&self) -> Vec<Hash256> {
        self.transactions.iter().map(Transaction::txid).collect()
    }

    /// `serialize(header) || varint(tx_count) || serialize(tx) for each tx`,
    /// each transaction length-prefixed with its own varint.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.header.serialize());
        write_varint(&mut out, self.transactions.len() as u64);
        for tx in &self.transactions {
            let encoded = tx.serialize();
            write_varint(&mut out, encoded.len() as u64);
            out.extend_from_slice(&encoded);
        }
        out
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, EncodingError> {
        let header = BlockHeader::deserialize(data.get(0..BlockHeader::SIZE).ok_or(EncodingError::UnexpectedEof)?)?;
        let mut offset = BlockHeader::SIZE;
        let (tx_count, consumed) = read_varint(&data[offset..])?;
        offset += consumed;
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            let (tx_len, consumed) = read_varint(&data[offset..])?;
            offset += consumed;
            let tx_bytes = data
                .get(offset..offset + tx_len as usize)
                .ok_or(EncodingError::UnexpectedEof)?;
            transactions.push(Transaction::deserialize(tx_bytes)?);
            offset += tx_len as usize;
        }
        if offset != data.len() {
            return Err(EncodingError::TrailingBytes);
        }
        Ok(Block { header, transactions })
    }
}

/// A single unspent transaction output as tracked by the UTXO set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub value: i64,
    pub pubkey_script: Vec<u8>,
    pub block_height: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn from_output(output: &TransactionOutput, block_height: u64, is_coinbase: bool) -> Self {
        UtxoEntry {
            value: output.value,
            pubkey_script: output.pubkey_script.clone(),
            block_height,
            is_coinbase,
        }
    }

    /// Coinbase outputs are spendable only once they reach `maturity`
    /// confirmations: `current_height - block_height >= maturity`.
    pub fn is_mature(&self, current_height: u64, maturity: u64) -> bool {
        if !self.is_coinbase {
            return true;
        }
        current_height.saturating_sub(self.block_height) >= maturity
    }
}
