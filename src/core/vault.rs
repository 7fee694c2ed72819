//! Collateral custody and bookkeeping.
//!
//! This module manages deposited collateral:
//! - Strongly-typed collateral amounts
//! - The external collateral token interface
//! - The per-user, per-asset collateral ledger

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::core::assets::AssetId;
use crate::error::{Error, Result};
use crate::utils::crypto::Address;
use crate::utils::math::format_units;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed collateral quantity (18 fractional digits)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CollateralAmount(u128);

impl CollateralAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from raw 18-decimal units
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole units (for convenience)
    pub fn from_units(units: u64) -> Self {
        Self(units as u128 * crate::utils::constants::PRECISION)
    }

    /// Get raw value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Saturating addition
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl std::fmt::Display for CollateralAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_units(self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL TOKEN INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// External collateral token the engine pulls deposits from and pays out with.
///
/// Implementations are untrusted: a `false` return means the movement did not
/// happen, and the engine treats it as a failed transfer.
pub trait CollateralAsset: Send + Sync {
    /// Identifier of the asset this token moves
    fn asset_id(&self) -> AssetId;

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: CollateralAmount,
    ) -> bool;

    /// Move `amount` out of the caller's own balance
    fn transfer(&self, caller: &Address, to: &Address, amount: CollateralAmount) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-user, per-asset deposited balances plus per-asset totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLedger {
    /// Balances keyed by (user, asset)
    balances: HashMap<Address, BTreeMap<AssetId, CollateralAmount>>,
    /// Total deposited per asset
    totals: BTreeMap<AssetId, CollateralAmount>,
}

impl CollateralLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposited amount of `asset` for `user`
    pub fn balance_of(&self, user: &Address, asset: &AssetId) -> CollateralAmount {
        self.balances
            .get(user)
            .and_then(|by_asset| by_asset.get(asset))
            .copied()
            .unwrap_or(CollateralAmount::ZERO)
    }

    /// Total deposited of `asset` across all users
    pub fn total(&self, asset: &AssetId) -> CollateralAmount {
        self.totals.get(asset).copied().unwrap_or(CollateralAmount::ZERO)
    }

    /// Credit `amount` to a user's position
    pub fn deposit(
        &mut self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<CollateralAmount> {
        let current = self.balance_of(user, asset);
        let updated = current.checked_add(amount).ok_or(Error::Overflow {
            operation: "deposit collateral".into(),
        })?;
        self.set_balance(user, asset, updated)?;
        Ok(updated)
    }

    /// Debit `amount` from a user's position, rejecting underflow
    pub fn withdraw(
        &mut self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<CollateralAmount> {
        let current = self.balance_of(user, asset);
        let updated = current.checked_sub(amount).ok_or_else(|| Error::InsufficientBalance {
            what: format!("{} collateral", asset),
            required: amount.raw(),
            available: current.raw(),
        })?;
        self.set_balance(user, asset, updated)?;
        Ok(updated)
    }

    /// Overwrite a balance, moving the asset total by the difference.
    ///
    /// Zero balances stay in the map: an emptied position is still a position.
    pub(crate) fn set_balance(
        &mut self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<()> {
        let previous = self.balance_of(user, asset);
        let total = self.total(asset);
        let total = if amount >= previous {
            total.checked_add(CollateralAmount(amount.0 - previous.0))
        } else {
            total.checked_sub(CollateralAmount(previous.0 - amount.0))
        }
        .ok_or_else(|| Error::InvariantViolation(format!("{} total out of range", asset)))?;

        self.totals.insert(asset.clone(), total);
        self.balances
            .entry(*user)
            .or_default()
            .insert(asset.clone(), amount);
        Ok(())
    }

    /// Number of users with a recorded position
    pub fn user_count(&self) -> usize {
        self.balances.len()
    }

    /// Verify per-asset totals equal the sum of user balances
    pub fn verify_invariant(&self) -> bool {
        let mut sums: BTreeMap<&AssetId, u128> = BTreeMap::new();
        for by_asset in self.balances.values() {
            for (asset, amount) in by_asset {
                let entry = sums.entry(asset).or_insert(0);
                match entry.checked_add(amount.raw()) {
                    Some(sum) => *entry = sum,
                    None => return false,
                }
            }
        }
        self.totals
            .iter()
            .all(|(asset, total)| sums.get(asset).copied().unwrap_or(0) == total.raw())
            && sums.keys().all(|asset| self.totals.contains_key(*asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weth() -> AssetId {
        AssetId::from("WETH")
    }

    #[test]
    fn test_collateral_amount() {
        let amount = CollateralAmount::from_units(10);
        assert_eq!(amount.raw(), 10_000_000_000_000_000_000);
        assert_eq!(amount.to_string(), "10");
    }

    #[test]
    fn test_deposit() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");

        ledger.deposit(&alice, &weth(), CollateralAmount::from_units(1)).unwrap();
        ledger.deposit(&alice, &weth(), CollateralAmount::from_units(2)).unwrap();

        assert_eq!(ledger.balance_of(&alice, &weth()), CollateralAmount::from_units(3));
        assert_eq!(ledger.total(&weth()), CollateralAmount::from_units(3));
    }

    #[test]
    fn test_withdraw() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");

        ledger.deposit(&alice, &weth(), CollateralAmount::from_units(2)).unwrap();
        ledger.withdraw(&alice, &weth(), CollateralAmount::from_units(1)).unwrap();

        assert_eq!(ledger.balance_of(&alice, &weth()), CollateralAmount::from_units(1));
        assert_eq!(ledger.total(&weth()), CollateralAmount::from_units(1));
    }

    #[test]
    fn test_withdraw_insufficient() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");

        ledger.deposit(&alice, &weth(), CollateralAmount::from_units(1)).unwrap();
        let result = ledger.withdraw(&alice, &weth(), CollateralAmount::from_units(2));

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(ledger.balance_of(&alice, &weth()), CollateralAmount::from_units(1));
    }

    #[test]
    fn test_zero_balance_is_kept() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");

        ledger.deposit(&alice, &weth(), CollateralAmount::from_units(1)).unwrap();
        ledger.withdraw(&alice, &weth(), CollateralAmount::from_units(1)).unwrap();

        assert_eq!(ledger.user_count(), 1);
        assert!(ledger.balance_of(&alice, &weth()).is_zero());
    }

    #[test]
    fn test_invariant() {
        let mut ledger = CollateralLedger::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let wbtc = AssetId::from("WBTC");

        ledger.deposit(&alice, &weth(), CollateralAmount::from_units(1)).unwrap();
        ledger.deposit(&bob, &weth(), CollateralAmount::from_units(2)).unwrap();
        ledger.deposit(&bob, &wbtc, CollateralAmount::from_units(5)).unwrap();
        ledger.withdraw(&bob, &weth(), CollateralAmount::from_raw(500)).unwrap();

        assert!(ledger.verify_invariant());
    }
}
