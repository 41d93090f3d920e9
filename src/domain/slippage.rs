//! Slippage Floor Math
//!
//! The router promises a venue a minimum acceptable output before anything is
//! submitted. The service fee is deducted from the quoted output first, then
//! the slippage tolerance is applied on top. A floor that collapses to zero
//! refuses execution outright.

use thiserror::Error;

/// Basis-point scale: 10_000 bps = 100%.
pub const BPS_SCALE: u64 = 10_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlippageError {
    #[error("slippage must be below 10000 bps, got {0}")]
    InvalidBps(u16),

    #[error("fee must be below 10000 bps, got {0}")]
    InvalidFeeBps(u16),

    #[error("slippage and fee deductions exhaust the quoted output")]
    Exhausted,
}

/// Reject tolerances outside `[0, 10000)` before any venue is contacted.
pub fn validate_bps(slippage_bps: u16) -> Result<(), SlippageError> {
    if u64::from(slippage_bps) >= BPS_SCALE {
        return Err(SlippageError::InvalidBps(slippage_bps));
    }
    Ok(())
}

/// Minimum acceptable output for a quoted amount.
///
/// Fee first, slippage second:
/// `floor = quoted * (10000 - fee) / 10000 * (10000 - slippage) / 10000`,
/// truncating at each step. Fails with [`SlippageError::Exhausted`] when the
/// combined deduction leaves nothing.
pub fn min_output_floor(
    quoted_out: u64,
    slippage_bps: u16,
    fee_bps: u16,
) -> Result<u64, SlippageError> {
    validate_bps(slippage_bps)?;
    if u64::from(fee_bps) >= BPS_SCALE {
        return Err(SlippageError::InvalidFeeBps(fee_bps));
    }

    let after_fee =
        (quoted_out as u128) * (BPS_SCALE - u64::from(fee_bps)) as u128 / BPS_SCALE as u128;
    let floor =
        after_fee * (BPS_SCALE - u64::from(slippage_bps)) as u128 / BPS_SCALE as u128;

    if floor == 0 {
        return Err(SlippageError::Exhausted);
    }
    // quoted_out fits u64 and both multipliers are < 1, so the cast is exact
    Ok(floor as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_full_range() {
        assert!(validate_bps(0).is_ok());
        assert!(validate_bps(9_999).is_ok());
        assert_eq!(validate_bps(10_000), Err(SlippageError::InvalidBps(10_000)));
    }

    #[test]
    fn test_floor_is_strictly_below_quote() {
        for (quoted, slippage, fee) in [
            (1_000_000u64, 100u16, 0u16),
            (1_000_000, 1, 0),
            (62_000_000, 100, 100),
            (u64::MAX, 9_999, 0),
        ] {
            let floor = min_output_floor(quoted, slippage, fee).unwrap();
            assert!(floor < quoted, "floor {floor} not below quote {quoted}");
            assert!(floor > 0);
        }
    }

    #[test]
    fn test_fee_applies_before_slippage() {
        // 1% fee on 10_000 leaves 9_900, then 1% slippage leaves 9_801
        assert_eq!(min_output_floor(10_000, 100, 100).unwrap(), 9_801);
    }

    #[test]
    fn test_zero_tolerances_keep_quote() {
        assert_eq!(min_output_floor(500, 0, 0).unwrap(), 500);
    }

    #[test]
    fn test_exhausted_floor_refuses() {
        // one base unit cannot survive any deduction
        assert_eq!(min_output_floor(1, 100, 0), Err(SlippageError::Exhausted));
        assert_eq!(min_output_floor(0, 0, 0), Err(SlippageError::Exhausted));
    }

    #[test]
    fn test_floor_worked_example() {
        // 62 units quoted at 6 decimals, 100 bps slippage, no fee
        let quoted = 62_000_000u64;
        assert_eq!(min_output_floor(quoted, 100, 0).unwrap(), 61_380_000);
    }
}
