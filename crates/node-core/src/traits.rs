//! Narrow interfaces decoupling the validator and miner from the
//! coordinator's concrete type.
//!
//! `ChainView` is read-only access to committed chain state: the shape a
//! validator needs. `BlockSink` is the single write entry point a miner
//! uses to hand over a solved block. Neither depends on `Coordinator`
//! directly, so both sides are testable against fakes.

use crate::error::ChainError;
use crate::types::{Block, Hash256, OutPoint, UtxoEntry};

/// Read-only view over committed chain + UTXO state.
pub trait ChainView {
    fn best_tip(&self) -> Hash256;
    fn height(&self) -> u64;
    fn get_block(&self, hash: &Hash256) -> Option<Block>;
    fn get_block_by_height(&self, height: u64) -> Option<Block>;
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<UtxoEntry>;

    fn contains_utxo(&self, outpoint: &OutPoint) -> bool {
        self.get_utxo(outpoint).is_some()
    }
}

/// The single entry point a miner uses to submit a solved block.
pub trait BlockSink {
    fn submit_block(&mut self, block: Block) -> Result<(), ChainError>;
}
