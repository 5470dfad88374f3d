//! Protocol constants. Everything that varies between development and
//! production deployments lives in [`crate::config::ConsensusParams`]
//! instead; this module holds only the values fixed across every profile.

/// Satoshis per coin.
pub const COIN: i64 = 100_000_000;

/// Total supply ceiling: 21,000,000 coins.
pub const MAX_SUPPLY: i64 = 21_000_000 * COIN;

/// Initial block subsidy: 50 coins.
pub const INITIAL_REWARD: i64 = 50 * COIN;

/// Blocks between each halving of the block subsidy.
pub const HALVING_INTERVAL: u64 = 210_000;

/// Maximum serialized block size, in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_048_576;

/// Maximum serialized transaction size, in bytes.
pub const MAX_TX_SIZE: usize = 100_000;

/// Below this value an output is considered dust: not rejected, but a
/// candidate for flagging by callers that care (e.g. a wallet UI).
pub const DUST_THRESHOLD: i64 = 546;

/// Maximum bytes of free-form data in a coinbase signature script.
pub const MAX_COINBASE_DATA: usize = 100;

/// A block's timestamp may not exceed `now + MAX_FUTURE_BLOCK_TIME` seconds.
pub const MAX_FUTURE_BLOCK_TIME: u32 = 7200;

/// Number of ancestor blocks examined for the median-time-past rule.
pub const MEDIAN_TIME_PAST_WINDOW: usize = 11;

/// Genesis block timestamp: the Bitcoin genesis block's unix timestamp.
pub const GENESIS_TIMESTAMP: u32 = 1_231_006_505;
