//! Chain coordinator and proof-of-work mining loop built on top of
//! `node-core`'s consensus primitives.
//!
//! `node-core` has no notion of "the" chain, only rules a block or
//! transaction must satisfy. This crate owns the mutable state — the block
//! store, the UTXO set, the mempool, the best-tip pointer — and the fork
//! handling and mining logic that mutate it.

pub mod coordinator;
pub mod miner;

pub use coordinator::{ChainSnapshot, Coordinator};
