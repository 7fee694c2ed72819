//! Engine configuration and risk parameters.
//!
//! The parameters are fixed when the engine is built. They calibrate the
//! health-factor formula and the liquidation incentive:
//! - Liquidation threshold: share of nominal collateral value counted toward solvency
//! - Minimum health factor: solvency floor in 18-decimal fixed point
//! - Liquidation bonus: extra collateral awarded to liquidators
//! - Price staleness: maximum age of an oracle answer

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::FixedPoint;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Risk parameters of a vault engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Numerator of the collateral discount (50 → half of nominal value counts)
    pub liquidation_threshold: u128,

    /// Denominator of the collateral discount
    pub liquidation_precision: u128,

    /// Numerator of the liquidator's bonus on seized collateral
    pub liquidation_bonus: u128,

    /// Denominator of the liquidator's bonus
    pub bonus_precision: u128,

    /// Accounts below this health factor can be liquidated
    pub min_health_factor: FixedPoint,

    /// Maximum age of an oracle answer in seconds
    pub max_price_staleness_secs: u64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            liquidation_threshold: LIQUIDATION_THRESHOLD,
            liquidation_precision: LIQUIDATION_PRECISION,
            liquidation_bonus: LIQUIDATION_BONUS,
            bonus_precision: BONUS_PRECISION,
            min_health_factor: FixedPoint::from_raw(MIN_HEALTH_FACTOR),
            max_price_staleness_secs: MAX_PRICE_STALENESS_SECS,
        }
    }
}

impl EngineParams {
    /// Override the collateral discount
    pub fn with_threshold(mut self, threshold: u128, precision: u128) -> Self {
        self.liquidation_threshold = threshold;
        self.liquidation_precision = precision;
        self
    }

    /// Override the liquidation bonus
    pub fn with_bonus(mut self, bonus: u128, precision: u128) -> Self {
        self.liquidation_bonus = bonus;
        self.bonus_precision = precision;
        self
    }

    /// Override the solvency floor
    pub fn with_min_health_factor(mut self, min_health_factor: FixedPoint) -> Self {
        self.min_health_factor = min_health_factor;
        self
    }

    /// Override the oracle staleness bound
    pub fn with_max_price_staleness(mut self, secs: u64) -> Self {
        self.max_price_staleness_secs = secs;
        self
    }

    /// Check the calibration is self-consistent
    pub fn validate(&self) -> Result<()> {
        if self.liquidation_precision == 0 {
            return Err(invalid("liquidation_precision", "must be greater than zero"));
        }
        if self.liquidation_threshold == 0 || self.liquidation_threshold > self.liquidation_precision {
            return Err(invalid(
                "liquidation_threshold",
                "must be in (0, liquidation_precision]",
            ));
        }
        if self.bonus_precision == 0 {
            return Err(invalid("bonus_precision", "must be greater than zero"));
        }
        if self.liquidation_bonus >= self.bonus_precision {
            return Err(invalid("liquidation_bonus", "must be below bonus_precision"));
        }
        if self.min_health_factor.is_zero() {
            return Err(invalid("min_health_factor", "must be greater than zero"));
        }
        if self.max_price_staleness_secs == 0 {
            return Err(invalid("max_price_staleness_secs", "must be greater than zero"));
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn invalid(name: &str, reason: &str) -> Error {
    Error::InvalidParameter {
        name: name.into(),
        reason: reason.into(),
    }
}
