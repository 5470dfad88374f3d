//! Consensus types, validation, and chain-state primitives for an
//! educational Bitcoin-compatible full-archival node.
//!
//! This crate has no networking and no I/O of its own: it defines the wire
//! formats, the rules a block or transaction must satisfy, the UTXO set,
//! the mempool, and the interfaces ([`traits::ChainView`],
//! [`traits::BlockSink`]) a coordinator built on top of it exposes to a
//! validator and a miner.

pub mod block_validation;
pub mod chain_state;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod difficulty;
pub mod encoding;
pub mod error;
pub mod genesis;
pub mod mempool;
pub mod merkle;
pub mod reward;
pub mod traits;
pub mod types;
pub mod validation;
