//! Consensus configuration.
//!
//! `ConsensusParams` is constructed once, at coordinator creation, and
//! threaded by reference into the validator, difficulty module, and miner —
//! never a mutable global. This is what lets difficulty adjustment stay a
//! pure function of chain history and parameters, and lets tests run with
//! independent parameter sets concurrently.

use serde::{Deserialize, Serialize};

/// Which deployment profile a [`ConsensusParams`] was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Dev,
    Prod,
}

/// Immutable, profile-derived consensus parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub mode: Mode,
    /// Compact-bits encoding of the easiest allowed target; also the
    /// genesis block's `nbits`.
    pub max_target_nbits: u32,
    /// Height interval at which difficulty retargets.
    pub adjustment_interval: u64,
    /// Target seconds between blocks over one adjustment interval.
    pub target_block_time_sec: u64,
    /// Confirmations a coinbase output needs before it is spendable.
    pub coinbase_maturity: u64,
}

impl ConsensusParams {
    pub fn dev() -> Self {
        ConsensusParams {
            mode: Mode::Dev,
            max_target_nbits: 0x1f0f_ffff,
            adjustment_interval: 10,
            target_block_time_sec: 5,
            coinbase_maturity: 5,
        }
    }

    pub fn prod() -> Self {
        ConsensusParams {
            mode: Mode::Prod,
            max_target_nbits: 0x1d00_ffff,
            adjustment_interval: 2016,
            target_block_time_sec: 600,
            coinbase_maturity: 100,
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Dev => Self::dev(),
            Mode::Prod => Self::prod(),
        }
    }
}
