//! Compact-bits target encoding and interval-boundary difficulty retargeting.
//!
//! Targets are arbitrary-precision 256-bit integers; `num-bigint` stands in
//! for a native `u256` since Rust's standard integer types top out at 128
//! bits and this arithmetic needs the full range.

use num_bigint::BigUint;
use num_traits::Zero;

/// Decode a compact-bits value into its full 256-bit target.
///
/// `exp = nbits >> 24`, `mant = nbits & 0x007FFFFF`, `target = mant * 256^(exp - 3)`.
/// An exponent below 3 right-shifts the mantissa instead of left-shifting it.
pub fn target_from_compact(nbits: u32) -> BigUint {
    let exp = (nbits >> 24) as i32;
    let mant = BigUint::from(nbits & 0x007F_FFFF);
    if mant.is_zero() {
        return BigUint::zero();
    }
    if exp <= 3 {
        let shift = 8 * (3 - exp);
        mant >> shift
    } else {
        let shift = 8 * (exp - 3);
        mant << shift
    }
}

/// Encode a 256-bit target back into compact-bits form.
///
/// Idempotent for any canonical `nbits` produced by a prior call to this
/// function: `compact_from_target(target_from_compact(b)) == b`.
pub fn compact_from_target(target: &BigUint) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let bytes_be = target.to_bytes_be();
    let mut size = bytes_be.len() as i32;
    let mut mant: u32 = if size <= 3 {
        let mut padded = vec![0u8; 3];
        let start = 3 - bytes_be.len();
        padded[start..].copy_from_slice(&bytes_be);
        u32::from_be_bytes([0, padded[0], padded[1], padded[2]])
    } else {
        let top3 = &bytes_be[0..3];
        u32::from_be_bytes([0, top3[0], top3[1], top3[2]])
    };
    if mant & 0x0080_0000 != 0 {
        mant >>= 8;
        size += 1;
    }
    debug_assert!(mant & !0x007F_FFFF == 0);
    mant | ((size as u32) << 24)
}

/// Given a double-SHA256 block hash (already converted to a big-endian
/// 256-bit integer via [`crate::types::Hash256::to_be_u256`]), check it
/// against the target implied by `nbits`.
pub fn meets_difficulty_target(hash_be: &[u8; 32], nbits: u32) -> bool {
    let value = BigUint::from_bytes_be(hash_be);
    value <= target_from_compact(nbits)
}

/// The minimal ancestor context `expected_difficulty` needs: the nbits and
/// timestamp of arbitrary prior blocks by height.
pub trait DifficultyHistory {
    fn nbits_at(&self, height: u64) -> u32;
    fn timestamp_at(&self, height: u64) -> u32;
}

/// Compute the nbits a block at `height` must carry.
///
/// Pure function of committed chain history plus the consensus parameters;
/// never reads or mutates instance state.
pub fn expected_difficulty<H: DifficultyHistory>(
    history: &H,
    height: u64,
    adjustment_interval: u64,
    target_block_time_sec: u64,
    max_target_nbits: u32,
) -> u32 {
    if height % adjustment_interval != 0 {
        return history.nbits_at(height - 1);
    }
    let first = history.timestamp_at(height - adjustment_interval);
    let last_timestamp = history.timestamp_at(height - 1);
    let last_nbits = history.nbits_at(height - 1);

    let expected = adjustment_interval * target_block_time_sec;
    let actual = (last_timestamp as i64 - first as i64).max(0) as u64;

    let old_target = target_from_compact(last_nbits);
    let unclamped = (old_target.clone() * actual) / expected;

    // Clamp the resulting target directly rather than pre-clamping `actual`
    // against an integer-divided `expected / 4`: dividing the (typically
    // small) time-domain values first rounds away the fraction and admits
    // more than a 4x swing once multiplied back through a large target.
    let floor = old_target.clone() / 4u64;
    let ceiling = old_target * 4u64;
    let new_target = unclamped.clamp(floor, ceiling);

    let max_target = target_from_compact(max_target_nbits);
    let capped = new_target.min(max_target);
    compact_from_target(&capped)
}
