//! Fixed-point arithmetic and mathematical utilities.
//!
//! Every amount in the engine is a `u128` with 18 fractional digits.
//! Products such as `amount × price` can exceed `u128`, so multiplication
//! followed by division goes through a 256-bit intermediate.

use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{PRECISION, WAD_DECIMALS};

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision
/// Used for health factors and ratios
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FixedPoint(u128);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: u128 = PRECISION;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Largest representable value, used as the "unbounded" sentinel
    pub const MAX: Self = Self(u128::MAX);

    /// Create a new FixedPoint from raw value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from an integer (scales up)
    pub fn from_integer(value: u64) -> Self {
        Self((value as u128) * Self::SCALE)
    }

    /// Get the raw underlying value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True for the unbounded sentinel
    pub fn is_max(&self) -> bool {
        self.0 == u128::MAX
    }

    /// Multiply two fixed-point values
    pub fn checked_mul(self, rhs: Self) -> Result<Self> {
        mul_div(self.0, rhs.0, Self::SCALE).map(Self)
    }

    /// Divide two fixed-point values
    pub fn checked_div(self, rhs: Self) -> Result<Self> {
        mul_div(self.0, Self::SCALE, rhs.0).map(Self)
    }
}

impl std::fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_max() {
            write!(f, "∞")
        } else {
            write!(f, "{}", format_units(self.0))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding down
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    narrow(result, || format!("({} * {}) / {}", a, b, c))
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding up
pub fn mul_div_up(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let numerator = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let result = (numerator + divisor - U256::one()) / divisor;
    narrow(result, || format!("ceil(({} * {}) / {})", a, b, c))
}

fn narrow(value: U256, describe: impl FnOnce() -> String) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow { operation: describe() });
    }
    Ok(value.as_u128())
}

/// 10^exp as u128
pub fn pow10(exp: u8) -> Result<u128> {
    10u128.checked_pow(exp as u32).ok_or(Error::Overflow {
        operation: format!("10^{}", exp),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL FORMATTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Render a raw 18-decimal value as a decimal string without trailing zeros
pub fn format_units(raw: u128) -> String {
    let whole = raw / PRECISION;
    let frac = raw % PRECISION;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = WAD_DECIMALS as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parse a decimal string such as `"10.5"` into raw 18-decimal units
pub fn parse_units(value: &str) -> Result<u128> {
    let invalid = |reason: &str| Error::InvalidParameter {
        name: "amount".into(),
        reason: format!("{:?}: {}", value, reason),
    };

    let decimal = Decimal::from_str(value.trim())
        .map_err(|e| invalid(&e.to_string()))?
        .normalize();

    if decimal.is_sign_negative() {
        return Err(invalid("negative amounts are not allowed"));
    }
    if decimal.scale() > WAD_DECIMALS as u32 {
        return Err(invalid("more than 18 fractional digits"));
    }

    let mantissa = decimal.mantissa() as u128;
    let scale_up = pow10(WAD_DECIMALS - decimal.scale() as u8)?;
    mantissa.checked_mul(scale_up).ok_or(Error::Overflow {
        operation: format!("parse {}", value),
    })
}
