//! Engine constants and calibration defaults.
//!
//! All amounts, prices and health factors share one fixed-point convention:
//! 18 fractional digits. The risk calibration is the 50% threshold paired
//! with a minimum health factor of 1.0.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fractional digits used by every amount in the engine
pub const WAD_DECIMALS: u8 = 18;

/// Engine precision (1.0 in 18-digit fixed point)
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Typical price feed decimals (USD feeds report 8 fractional digits)
pub const DEFAULT_FEED_DECIMALS: u8 = 8;

/// Scale-up applied to an 8-decimal feed answer to reach engine precision
pub const ADDITIONAL_FEED_PRECISION: u128 = 10_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// RISK CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Share of nominal collateral value that counts toward solvency (50%)
pub const LIQUIDATION_THRESHOLD: u128 = 50;

/// Denominator for the liquidation threshold
pub const LIQUIDATION_PRECISION: u128 = 100;

/// Extra collateral awarded to liquidators (10%)
pub const LIQUIDATION_BONUS: u128 = 10;

/// Denominator for the liquidation bonus
pub const BONUS_PRECISION: u128 = 100;

/// Minimum health factor (1.0)
pub const MIN_HEALTH_FACTOR: u128 = PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum price staleness in seconds (3 hours)
pub const MAX_PRICE_STALENESS_SECS: u64 = 3 * 3600;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_constants() {
        assert_eq!(PRECISION, 10u128.pow(WAD_DECIMALS as u32));
        assert_eq!(
            ADDITIONAL_FEED_PRECISION,
            10u128.pow((WAD_DECIMALS - DEFAULT_FEED_DECIMALS) as u32)
        );
    }

    #[test]
    fn test_risk_constants() {
        assert!(LIQUIDATION_THRESHOLD > 0 && LIQUIDATION_THRESHOLD <= LIQUIDATION_PRECISION);
        assert!(LIQUIDATION_BONUS < BONUS_PRECISION);
        assert_eq!(MIN_HEALTH_FACTOR, PRECISION);
    }
}
