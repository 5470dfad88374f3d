//! Coinbase construction and the proof-of-work nonce search.
//!
//! Kept free of any reference to [`crate::coordinator::Coordinator`]: it only
//! ever touches the header and coinbase it is handed, so it can be tested
//! (and, if ever needed, run on a separate thread) without the rest of the
//! chain state.

use node_core::difficulty::meets_difficulty_target;
use node_core::types::{BlockHeader, Transaction, TransactionInput, TransactionOutput};

/// Minimal BIP34-style height push: a length byte followed by the
/// little-endian encoding of `height`, trimmed of trailing zero bytes (but
/// never trimmed below one byte), so every height produces a distinct,
/// short encoding.
fn encode_height(height: u64) -> Vec<u8> {
    let mut bytes = height.to_le_bytes().to_vec();
    while bytes.len() > 1 && *bytes.last().unwrap() == 0 {
        bytes.pop();
    }
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(bytes.len() as u8);
    out.extend(bytes);
    out
}

/// Build a coinbase transaction paying `reward` to `recipient_hash160`.
///
/// The signature script carries the block height and `extra_nonce`, which
/// is all that separates otherwise-identical coinbases mined against the
/// same template after a nonce-space exhaustion.
pub fn create_coinbase(height: u64, reward: i64, recipient_hash160: [u8; 20], extra_nonce: u32) -> Transaction {
    let mut signature_script = encode_height(height);
    signature_script.extend_from_slice(&extra_nonce.to_le_bytes());

    Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prev_txid: node_core::types::Hash256::ZERO,
            prev_output_index: u32::MAX,
            signature_script,
            sequence: u32::MAX,
        }],
        outputs: vec![TransactionOutput {
            value: reward,
            pubkey_script: recipient_hash160.to_vec(),
        }],
        lock_time: 0,
    }
}

/// Search the full nonce space for a value satisfying `header.nbits`,
/// mutating `header.nonce` in place. Returns `false` if no nonce in
/// `0..=u32::MAX` satisfies the target, signaling the caller to roll the
/// extra-nonce and rebuild the template.
pub fn search_nonce(header: &mut BlockHeader) -> bool {
    for nonce in 0..=u32::MAX {
        header.nonce = nonce;
        if meets_difficulty_target(&header.hash().to_be_u256(), header.nbits) {
            return true;
        }
    }
    false
}

/// Produce a block with `nonce = 0` without checking the difficulty
/// target. Such a block fails [`node_core::block_validation::validate_block_structure`]'s
/// proof-of-work check, so this is for tests that construct fixtures
/// without paying the mining cost, never for submission through a
/// [`crate::coordinator::Coordinator`].
#[cfg(any(test, feature = "testing"))]
pub fn instant_mine(mut header: BlockHeader) -> BlockHeader {
    header.nonce = 0;
    header
}
