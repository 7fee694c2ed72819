//! Liquidation engine.
//!
//! Repairs under-collateralized positions: a third-party liquidator repays
//! part of the target's debt with their own stable tokens and receives the
//! equivalent collateral plus a fixed bonus.
//!
//! The fixed-bonus scheme relies on aggregate collateralization staying well
//! above 100%. When collateral value collapses far enough that seizing
//! `amount + bonus` lowers the target's health factor, liquidation fails with
//! `HealthFactorNotImproved`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::core::assets::AssetId;
use crate::core::health::{HealthFactor, HealthFactorCalculator};
use crate::core::token::TokenAmount;
use crate::core::vault::CollateralAmount;
use crate::error::{Error, Result};
use crate::protocol::engine::VaultEngine;
use crate::protocol::events::{EngineEvent, LiquidatedEvent};
use crate::utils::crypto::Address;
use crate::utils::math::mul_div;
use crate::utils::validation::{validate_non_zero, validate_supported_asset};

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION QUOTE
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral owed to a liquidator for covering some debt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    /// Collateral asset to seize
    pub asset: AssetId,
    /// Debt the liquidator repays
    pub debt_to_cover: TokenAmount,
    /// Collateral worth `debt_to_cover` at the current price
    pub asset_amount: CollateralAmount,
    /// Extra collateral awarded on top
    pub bonus: CollateralAmount,
    /// `asset_amount + bonus`
    pub total_seized: CollateralAmount,
}

impl LiquidationQuote {
    /// Price `debt_to_cover` in `asset` and add the liquidation bonus
    pub fn compute(
        calculator: &HealthFactorCalculator<'_>,
        asset: &AssetId,
        debt_to_cover: TokenAmount,
    ) -> Result<Self> {
        let params = calculator.params();
        let asset_amount = calculator.asset_amount_from_usd(asset, debt_to_cover)?;
        let bonus = CollateralAmount::from_raw(mul_div(
            asset_amount.raw(),
            params.liquidation_bonus,
            params.bonus_precision,
        )?);
        let total_seized = asset_amount.checked_add(bonus).ok_or(Error::Overflow {
            operation: "liquidation seizure".into(),
        })?;

        Ok(Self {
            asset: asset.clone(),
            debt_to_cover,
            asset_amount,
            bonus,
            total_seized,
        })
    }
}

/// Result of a successful liquidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Liquidated user
    pub user: Address,
    /// Liquidator
    pub liquidator: Address,
    /// Amounts moved
    pub quote: LiquidationQuote,
    /// Target health factor before
    pub health_before: HealthFactor,
    /// Target health factor after
    pub health_after: HealthFactor,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Liquidation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Completed liquidations
    pub total_liquidations: u64,
    /// Debt repaid by liquidators
    pub total_debt_liquidated: TokenAmount,
    /// Collateral seized per asset, bonus included
    pub collateral_seized: BTreeMap<AssetId, CollateralAmount>,
    /// Bonus paid per asset
    pub bonus_paid: BTreeMap<AssetId, CollateralAmount>,
}

impl LiquidationStats {
    /// Account for a completed liquidation
    pub fn record(&mut self, outcome: &LiquidationOutcome) {
        let quote = &outcome.quote;
        self.total_liquidations += 1;
        self.total_debt_liquidated = self.total_debt_liquidated.saturating_add(quote.debt_to_cover);

        let seized = self.collateral_seized.entry(quote.asset.clone()).or_default();
        *seized = seized.saturating_add(quote.total_seized);
        let bonus = self.bonus_paid.entry(quote.asset.clone()).or_default();
        *bonus = bonus.saturating_add(quote.bonus);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION EXECUTION
// ═══════════════════════════════════════════════════════════════════════════════

impl VaultEngine {
    /// Collateral a liquidator would receive for covering `debt_to_cover`
    pub fn quote_liquidation(
        &self,
        asset: &AssetId,
        debt_to_cover: TokenAmount,
    ) -> Result<LiquidationQuote> {
        validate_non_zero(debt_to_cover.raw(), "debt_to_cover")?;
        validate_supported_asset(self.registry(), asset)?;
        LiquidationQuote::compute(&self.calculator(), asset, debt_to_cover)
    }

    /// Repay `debt_to_cover` of `user`'s debt and seize collateral plus bonus
    pub fn liquidate(
        &self,
        liquidator: &Address,
        user: &Address,
        asset: &AssetId,
        debt_to_cover: TokenAmount,
    ) -> Result<LiquidationOutcome> {
        let outcome = self.transact(|tx| {
            validate_non_zero(debt_to_cover.raw(), "debt_to_cover")?;
            validate_supported_asset(self.registry(), asset)?;

            let health_before = tx.health_factor(user)?;
            let minimum = self.params().min_health_factor;
            if health_before >= minimum {
                return Err(Error::NotLiquidatable {
                    health_factor: health_before,
                });
            }

            let quote = LiquidationQuote::compute(&tx.calculator(), asset, debt_to_cover)?;

            tx.redeem_collateral(asset, quote.total_seized, user, liquidator)
                .map_err(|err| match err {
                    Error::InsufficientBalance { required, available, .. } => {
                        Error::TransferFailed(format!(
                            "target holds {} {}, seizure needs {}",
                            CollateralAmount::from_raw(available),
                            asset,
                            CollateralAmount::from_raw(required)
                        ))
                    }
                    other => other,
                })?;
            tx.burn_debt(debt_to_cover, user, liquidator)?;

            let health_after = tx.health_factor(user)?;
            if health_after <= health_before {
                warn!(
                    user = %user.short(),
                    before = %health_before,
                    after = %health_after,
                    "Liquidation would not improve health factor"
                );
                return Err(Error::HealthFactorNotImproved {
                    before: health_before,
                    after: health_after,
                });
            }
            tx.assert_solvent(liquidator)?;

            tx.emit(EngineEvent::Liquidated(LiquidatedEvent {
                liquidator: *liquidator,
                user: *user,
                asset: asset.clone(),
                debt_covered: debt_to_cover,
                collateral_seized: quote.total_seized,
                bonus: quote.bonus,
                health_before,
                health_after,
                timestamp: tx.timestamp,
            }));

            Ok(LiquidationOutcome {
                user: *user,
                liquidator: *liquidator,
                quote,
                health_before,
                health_after,
            })
        })?;

        self.stats().write().map_err(|_| Error::Lock)?.record(&outcome);

        info!(
            liquidator = %liquidator.short(),
            user = %user.short(),
            %asset,
            debt_covered = %outcome.quote.debt_to_cover,
            seized = %outcome.quote.total_seized,
            health_before = %outcome.health_before,
            health_after = %outcome.health_after,
            "Position liquidated"
        );
        Ok(outcome)
    }
}
