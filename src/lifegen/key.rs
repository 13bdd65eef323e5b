//! Order-preserving linear keys for grid coordinates.
//!
//! `key = x * INDEX_MULT + (y - ENCODE_MIN)`. Biasing `y` by `2^31` keeps the
//! low half of the key non-negative, so the key is strictly monotonic in
//! `(x, y)` lexicographic order for negative `y` too.

use super::error::LifeGenError;

/// Multiplier applied to `x`. Twice the largest encodable `|y|`.
pub const INDEX_MULT: i64 = 1 << 32;

/// Smallest coordinate (either axis) that still encodes to a key.
pub const ENCODE_MIN: i64 = -(1 << 31);
/// Largest coordinate (either axis) that still encodes to a key.
pub const ENCODE_MAX: i64 = (1 << 31) - 1;

/// Smallest coordinate a live cell may occupy.
///
/// One inside the encodable range so that every neighbor of a live cell can
/// be looked up.
pub const MIN_COORD: i64 = ENCODE_MIN + 1;
/// Largest coordinate a live cell may occupy.
pub const MAX_COORD: i64 = ENCODE_MAX - 1;

#[inline(always)]
pub fn encodable(x: i64, y: i64) -> bool {
    (ENCODE_MIN..=ENCODE_MAX).contains(&x) && (ENCODE_MIN..=ENCODE_MAX).contains(&y)
}

#[inline(always)]
pub fn in_cell_range(x: i64, y: i64) -> bool {
    (MIN_COORD..=MAX_COORD).contains(&x) && (MIN_COORD..=MAX_COORD).contains(&y)
}

/// Encode a coordinate that is already known to be encodable.
#[inline(always)]
pub fn key_of(x: i64, y: i64) -> i64 {
    debug_assert!(encodable(x, y), "({x},{y}) outside key range");
    x * INDEX_MULT + (y - ENCODE_MIN)
}

/// Encode a coordinate, or `None` when it falls outside the key range.
#[inline]
pub fn try_key_of(x: i64, y: i64) -> Option<i64> {
    encodable(x, y).then(|| key_of(x, y))
}

/// Validate a live-cell coordinate.
pub fn check_cell(x: i64, y: i64) -> Result<i64, LifeGenError> {
    if in_cell_range(x, y) {
        Ok(key_of(x, y))
    } else {
        Err(LifeGenError::CoordinateOutOfRange { x, y })
    }
}

/// Inverse of [`key_of`].
#[inline]
pub fn coords_of(key: i64) -> (i64, i64) {
    let x = key.div_euclid(INDEX_MULT);
    let y = key.rem_euclid(INDEX_MULT) + ENCODE_MIN;
    (x, y)
}
