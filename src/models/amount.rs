//! Exact fixed-point amount conversion.
//!
//! Wire quantities arrive as 18-digit raw integers; everything persisted is
//! 8-digit canonical. The reduction is integer division, never float.

use alloy::primitives::U256;
use rust_decimal::Decimal;

/// Fractional digits on the wire
pub const RAW_SCALE: u32 = 18;

/// Fractional digits of every persisted amount
pub const CANONICAL_SCALE: u32 = 8;

/// 10^(RAW_SCALE - CANONICAL_SCALE), the truncating reduction divisor
const DOWNSCALE: u64 = 10_000_000_000;

/// Reduce an 18-digit raw integer to an 8-digit canonical `Decimal`.
///
/// Truncates the discarded 10 digits. Returns `None` when the reduced
/// value does not fit a `Decimal` mantissa (amounts that large are not
/// representable in the store either).
pub fn from_raw_18(raw: U256) -> Option<Decimal> {
    let reduced = raw / U256::from(DOWNSCALE);
    let units = u128::try_from(reduced).ok()?;
    let units = i128::try_from(units).ok()?;
    Decimal::try_from_i128_with_scale(units, CANONICAL_SCALE).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(units: u128) -> U256 {
        U256::from(units)
    }

    #[test]
    fn test_whole_units() {
        // 3 * 10^18 -> 3.00000000
        let d = from_raw_18(raw(3_000_000_000_000_000_000)).unwrap();
        assert_eq!(d.to_string(), "3.00000000");
    }

    #[test]
    fn test_fractional_truncation() {
        // 1.234567890123456789 * 10^18 -> 1.23456789 (trailing digits dropped)
        let d = from_raw_18(raw(1_234_567_890_123_456_789)).unwrap();
        assert_eq!(d.to_string(), "1.23456789");
    }

    #[test]
    fn test_zero() {
        let d = from_raw_18(U256::ZERO).unwrap();
        assert_eq!(d, Decimal::ZERO);
        assert_eq!(d.scale(), CANONICAL_SCALE);
    }

    #[test]
    fn test_sub_canonical_dust_truncates_to_zero() {
        // 1 wei is below the canonical resolution
        let d = from_raw_18(raw(1)).unwrap();
        assert_eq!(d, Decimal::ZERO);
    }

    #[test]
    fn test_overflow_rejected() {
        let d = from_raw_18(U256::MAX);
        assert!(d.is_none());
    }
}
