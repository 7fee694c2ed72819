//! Health factor calculation.
//!
//! The health factor is the ratio of a user's discounted collateral value to
//! their debt, in 18-decimal fixed point:
//!
//! ```text
//! adjusted = collateral_usd × threshold / precision
//! health   = adjusted × 1e18 / debt
//! ```
//!
//! A user with no debt cannot be under-collateralized, so zero debt yields
//! [`FixedPoint::MAX`] instead of dividing by zero.

use tracing::warn;

use crate::core::assets::{AssetId, AssetRegistry};
use crate::core::config::EngineParams;
use crate::core::ledger::LedgerView;
use crate::core::token::TokenAmount;
use crate::core::vault::CollateralAmount;
use crate::error::{Error, Result};
use crate::oracle::adapter::PriceOracleAdapter;
use crate::utils::constants::PRECISION;
use crate::utils::crypto::Address;
use crate::utils::math::{mul_div, safe_add, FixedPoint};

/// Solvency ratio in 18-decimal fixed point
pub type HealthFactor = FixedPoint;

/// Health factor of a hypothetical position
pub fn calculate_health_factor(
    debt: TokenAmount,
    collateral_value_usd: TokenAmount,
    params: &EngineParams,
) -> Result<HealthFactor> {
    if debt.is_zero() {
        return Ok(FixedPoint::MAX);
    }
    let adjusted = mul_div(
        collateral_value_usd.raw(),
        params.liquidation_threshold,
        params.liquidation_precision,
    )?;
    // Anything past u128 is as good as unbounded
    Ok(mul_div(adjusted, PRECISION, debt.raw())
        .map(FixedPoint::from_raw)
        .unwrap_or(FixedPoint::MAX))
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH FACTOR CALCULATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Values positions and derives health factors.
///
/// Read-only: ledger state comes in through a [`LedgerView`], so the same
/// calculator checks committed state and staged overlays alike.
#[derive(Debug, Clone, Copy)]
pub struct HealthFactorCalculator<'a> {
    registry: &'a AssetRegistry,
    oracle: &'a PriceOracleAdapter,
    params: &'a EngineParams,
}

impl<'a> HealthFactorCalculator<'a> {
    /// Create a calculator over the engine's assets, oracle and parameters
    pub fn new(
        registry: &'a AssetRegistry,
        oracle: &'a PriceOracleAdapter,
        params: &'a EngineParams,
    ) -> Self {
        Self {
            registry,
            oracle,
            params,
        }
    }

    /// USD value of `amount` units of `asset`
    pub fn usd_value(&self, asset: &AssetId, amount: CollateralAmount) -> Result<TokenAmount> {
        let price = self.oracle.price_of(asset)?;
        mul_div(amount.raw(), price, PRECISION).map(TokenAmount::from_raw)
    }

    /// Units of `asset` worth `usd` at the current price (rounded down)
    pub fn asset_amount_from_usd(&self, asset: &AssetId, usd: TokenAmount) -> Result<CollateralAmount> {
        let price = self.oracle.price_of(asset)?;
        mul_div(usd.raw(), PRECISION, price).map(CollateralAmount::from_raw)
    }

    /// Total USD value of everything `user` has deposited
    pub fn account_collateral_value_usd<L: LedgerView + ?Sized>(
        &self,
        ledgers: &L,
        user: &Address,
    ) -> Result<TokenAmount> {
        let mut total = 0u128;
        for asset in self.registry.ids() {
            let amount = ledgers.collateral_of(user, asset);
            if amount.is_zero() {
                continue;
            }
            total = safe_add(total, self.usd_value(asset, amount)?.raw())?;
        }
        Ok(TokenAmount::from_raw(total))
    }

    /// Debt and collateral value of `user`
    pub fn account_information<L: LedgerView + ?Sized>(
        &self,
        ledgers: &L,
        user: &Address,
    ) -> Result<(TokenAmount, TokenAmount)> {
        let debt = ledgers.debt_of(user);
        let collateral = self.account_collateral_value_usd(ledgers, user)?;
        Ok((debt, collateral))
    }

    /// Current health factor of `user`
    pub fn health_factor<L: LedgerView + ?Sized>(
        &self,
        ledgers: &L,
        user: &Address,
    ) -> Result<HealthFactor> {
        let debt = ledgers.debt_of(user);
        if debt.is_zero() {
            return Ok(FixedPoint::MAX);
        }
        let collateral = self.account_collateral_value_usd(ledgers, user)?;
        calculate_health_factor(debt, collateral, self.params)
    }

    /// Fail with `HealthFactorBroken` if `user` is below the minimum
    pub fn assert_solvent<L: LedgerView + ?Sized>(&self, ledgers: &L, user: &Address) -> Result<()> {
        let health_factor = self.health_factor(ledgers, user)?;
        if health_factor < self.params.min_health_factor {
            warn!(
                user = %user.short(),
                %health_factor,
                minimum = %self.params.min_health_factor,
                "Solvency check failed"
            );
            return Err(Error::HealthFactorBroken {
                health_factor,
                minimum: self.params.min_health_factor,
            });
        }
        Ok(())
    }

    /// True if `user` may be liquidated
    pub fn is_liquidatable<L: LedgerView + ?Sized>(&self, ledgers: &L, user: &Address) -> Result<bool> {
        Ok(self.health_factor(ledgers, user)? < self.params.min_health_factor)
    }

    /// Parameters in use
    pub fn params(&self) -> &EngineParams {
        self.params
    }
}
