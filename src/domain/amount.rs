//! Amount Conversion
//!
//! All venue and chain amounts travel as `u64` base units; everything shown
//! to a user is a `Decimal` scaled by the asset's `decimals`. Readable values
//! below the dust threshold are reported as zero so balance listings do not
//! fill up with unusable remainders.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Largest decimal count any supported asset may declare.
pub const MAX_DECIMALS: u8 = 18;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmountError {
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),

    #[error("asset declares {0} decimals, maximum supported is {MAX_DECIMALS}")]
    UnsupportedDecimals(u8),

    #[error("amount {0} does not fit into base units")]
    Overflow(Decimal),
}

fn unit_factor(decimals: u8) -> Result<Decimal, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    Ok(Decimal::from(10u64.pow(decimals as u32)))
}

/// Convert a human-readable amount into integer base units, truncating any
/// fraction below the asset's precision.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }
    let scaled = amount
        .checked_mul(unit_factor(decimals)?)
        .ok_or(AmountError::Overflow(amount))?;
    scaled
        .trunc()
        .to_u64()
        .ok_or(AmountError::Overflow(amount))
}

/// Convert integer base units into an exact readable amount.
pub fn to_readable(units: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, decimals as u32).normalize()
}

/// Readable amount with dust suppression: anything below `dust_threshold`
/// reports as zero.
pub fn to_readable_or_zero(units: u64, decimals: u8, dust_threshold: Decimal) -> Decimal {
    let readable = to_readable(units, decimals);
    if readable < dust_threshold {
        Decimal::ZERO
    } else {
        readable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_trip_whole_units() {
        let units = to_base_units(dec!(1.5), 9).unwrap();
        assert_eq!(units, 1_500_000_000);
        assert_eq!(to_readable(units, 9), dec!(1.5));
    }

    #[test]
    fn test_truncates_excess_precision() {
        // 6-decimal asset cannot represent the 7th digit
        let units = to_base_units(dec!(0.1234567), 6).unwrap();
        assert_eq!(units, 123_456);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            to_base_units(dec!(0), 9),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            to_base_units(dec!(-1), 9),
            Err(AmountError::NotPositive(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_decimals() {
        assert!(matches!(
            to_base_units(dec!(1), 19),
            Err(AmountError::UnsupportedDecimals(19))
        ));
    }

    #[test]
    fn test_dust_reports_zero() {
        // 5 base units of a 9-decimal asset is far below a 1e-6 threshold
        assert_eq!(to_readable_or_zero(5, 9, dec!(0.000001)), Decimal::ZERO);
        // at the threshold it survives
        assert_eq!(to_readable_or_zero(1_000, 9, dec!(0.000001)), dec!(0.000001));
    }
}
