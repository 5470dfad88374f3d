//! Block-level consensus rules: the ten checks a candidate block must pass
//! before it can extend any chain.

use std::collections::HashSet;

use crate::constants::{MAX_BLOCK_SIZE, MAX_FUTURE_BLOCK_TIME};
use crate::difficulty::meets_difficulty_target;
use crate::error::BlockError;
use crate::merkle::merkle_root;
use crate::types::{Block, OutPoint, UtxoEntry};
use crate::validation::{validate_transaction, validate_transaction_structure};

/// Everything `validate_block` needs about the position a block would
/// occupy in the chain, computed once by the caller from committed state.
#[derive(Clone, Debug)]
pub struct BlockContext {
    pub height: u64,
    pub expected_nbits: u32,
    /// Timestamps of up to the last 11 ancestors, oldest first.
    pub ancestor_timestamps: Vec<u32>,
    pub current_time: u32,
    pub block_reward: i64,
    pub coinbase_maturity: u64,
}

/// What a block validated to, beyond "it passed": the totals needed to
/// update chain state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedBlock {
    pub total_fees: i64,
    pub coinbase_value: i64,
}

/// Median of the given timestamps. Used for the median-time-past rule with
/// up to the last 11 ancestors; for heights below that all available
/// ancestors are used, per the spec's "use all available" fallback.
pub fn median_time_past(timestamps: &[u32]) -> u32 {
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

/// Structural checks independent of chain position: version, transaction
/// shape, coinbase placement, no duplicate txids, merkle root, PoW, size.
pub fn validate_block_structure(block: &Block) -> Result<(), BlockError> {
    if block.header.version == 0 {
        return Err(BlockError::BadVersion);
    }
    if block.transactions.is_empty() {
        return Err(BlockError::EmptyBlock);
    }
    if !block.transactions[0].is_coinbase() {
        return Err(BlockError::MissingCoinbase);
    }
    for tx in &block.transactions[1..] {
        if tx.is_coinbase() {
            return Err(BlockError::UnexpectedCoinbase);
        }
        validate_transaction_structure(tx)?;
    }
    validate_transaction_structure(&block.transactions[0])?;

    let mut seen = HashSet::new();
    for tx in &block.transactions {
        if !seen.insert(tx.txid()) {
            return Err(BlockError::DuplicateTransaction(tx.txid()));
        }
    }

    let txids = block.txids();
    if block.header.merkle_root != merkle_root(&txids) {
        return Err(BlockError::BadMerkleRoot);
    }

    if block.serialize().len() > MAX_BLOCK_SIZE {
        return Err(BlockError::TooLarge);
    }

    if !meets_difficulty_target(&block.hash().to_be_u256(), block.header.nbits) {
        return Err(BlockError::InsufficientWork);
    }

    Ok(())
}

/// Full validation of a candidate block against the position it would
/// occupy in the chain (`context`) and a UTXO view of its parent.
pub fn validate_block<F>(
    block: &Block,
    context: &BlockContext,
    expected_prev_hash: crate::types::Hash256,
    get_utxo: F,
) -> Result<ValidatedBlock, BlockError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
{
    validate_block_structure(block)?;

    if block.header.prev_block_hash != expected_prev_hash {
        return Err(BlockError::BadPrevHash {
            expected: expected_prev_hash,
            actual: block.header.prev_block_hash,
        });
    }

    if block.header.nbits != context.expected_nbits {
        return Err(BlockError::BadDifficulty {
            expected: context.expected_nbits,
            actual: block.header.nbits,
        });
    }

    if !context.ancestor_timestamps.is_empty() {
        let mtp = median_time_past(&context.ancestor_timestamps);
        if block.header.timestamp <= mtp {
            return Err(BlockError::TimestampTooOld);
        }
    }
    if block.header.timestamp > context.current_time.saturating_add(MAX_FUTURE_BLOCK_TIME) {
        return Err(BlockError::TimestampTooNew);
    }

    let mut block_spent: HashSet<OutPoint> = HashSet::new();
    let mut total_fees: i64 = 0;
    for tx in &block.transactions[1..] {
        let fee = validate_transaction(
            tx,
            context.height,
            context.coinbase_maturity,
            &get_utxo,
            &mut block_spent,
        )?;
        total_fees = total_fees
            .checked_add(fee)
            .ok_or(BlockError::Transaction(crate::error::TransactionError::OutputOverflow))?;
    }

    let coinbase_value = block.transactions[0]
        .total_output_value()
        .ok_or(BlockError::BadCoinbaseValue)?;
    let allowed = context
        .block_reward
        .checked_add(total_fees)
        .ok_or(BlockError::BadCoinbaseValue)?;
    if coinbase_value > allowed {
        return Err(BlockError::BadCoinbaseValue);
    }

    Ok(ValidatedBlock {
        total_fees,
        coinbase_value,
    })
}
