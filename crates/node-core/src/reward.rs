//! Block subsidy schedule: a fixed initial reward halved every
//! `HALVING_INTERVAL` blocks, with no premine.

use crate::constants::{HALVING_INTERVAL, INITIAL_REWARD};

/// The block subsidy at `height`, in satoshis. `50 * 10^8 >> (height / 210_000)`.
///
/// Saturates to zero once the shift exceeds the width of the reward, which
/// happens well past the point where the subsidy is economically relevant.
pub fn block_reward(height: u64) -> i64 {
    let halvings = height / HALVING_INTERVAL;
    if halvings >= 64 {
        return 0;
    }
    INITIAL_REWARD >> halvings
}
