//! Genesis block construction.
//!
//! Built parametrically from a [`ConsensusParams`] value rather than a
//! single global singleton, since `max_target_nbits` (and therefore the
//! genesis header) differs between the Dev and Prod profiles.

use crate::config::ConsensusParams;
use crate::constants::GENESIS_TIMESTAMP;
use crate::merkle::merkle_root;
use crate::types::{Block, BlockHeader, Hash256, Transaction, TransactionInput, TransactionOutput};

/// The genesis block's coinbase carries no payout: it has no discoverable
/// recipient, so it mints zero outputs rather than an arbitrary burn
/// address. All circulating supply therefore comes from mined blocks.
fn genesis_coinbase() -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prev_txid: Hash256::ZERO,
            prev_output_index: u32::MAX,
            signature_script: b"genesis".to_vec(),
            sequence: u32::MAX,
        }],
        outputs: vec![],
        lock_time: 0,
    }
}

/// Build the genesis block for a given consensus profile.
///
/// `timestamp = 1231006505`, `nonce = 0`, `prev_block_hash = ZERO`,
/// `nbits = params.max_target_nbits`. This block is inserted without PoW
/// verification.
pub fn genesis_block(params: &ConsensusParams) -> Block {
    let coinbase = genesis_coinbase();
    let root = merkle_root(&[coinbase.txid()]);
    let header = BlockHeader {
        version: 1,
        prev_block_hash: Hash256::ZERO,
        merkle_root: root,
        timestamp: GENESIS_TIMESTAMP,
        nbits: params.max_target_nbits,
        nonce: 0,
    };
    Block {
        header,
        transactions: vec![coinbase],
    }
}

pub fn genesis_hash(params: &ConsensusParams) -> Hash256 {
    genesis_block(params).hash()
}

pub fn is_genesis(block: &Block) -> bool {
    block.header.prev_block_hash.is_zero() && block.header.timestamp == GENESIS_TIMESTAMP
}
