//! Committed ledgers and the staged change set.
//!
//! Operations never write the committed ledgers directly. They stage their
//! writes in a [`StagedLedgers`] overlay, run solvency checks against it, and
//! hand the resulting [`ChangeSet`] back for commit once every external
//! effect has settled. A failed operation simply drops its overlay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::assets::AssetId;
use crate::core::debt::DebtLedger;
use crate::core::token::TokenAmount;
use crate::core::vault::{CollateralAmount, CollateralLedger};
use crate::error::{Error, Result};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access shared by committed and staged ledgers
pub trait LedgerView {
    /// Deposited amount of `asset` for `user`
    fn collateral_of(&self, user: &Address, asset: &AssetId) -> CollateralAmount;

    /// Outstanding debt of `user`
    fn debt_of(&self, user: &Address) -> TokenAmount;

    /// Total deposited of `asset`
    fn collateral_total(&self, asset: &AssetId) -> CollateralAmount;

    /// Total outstanding debt
    fn debt_total(&self) -> TokenAmount;
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMITTED LEDGERS
// ═══════════════════════════════════════════════════════════════════════════════

/// The engine's committed bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledgers {
    /// Collateral positions
    pub collateral: CollateralLedger,
    /// Debt positions
    pub debt: DebtLedger,
}

impl Ledgers {
    /// Create empty ledgers
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an overlay on top of the committed state
    pub fn stage(&self) -> StagedLedgers<'_> {
        StagedLedgers {
            base: self,
            changes: ChangeSet::default(),
        }
    }

    /// Write a change set into the committed state
    pub fn apply(&mut self, changes: ChangeSet) -> Result<()> {
        for ((user, asset), amount) in changes.collateral {
            self.collateral.set_balance(&user, &asset, amount)?;
        }
        for (user, amount) in changes.debt {
            self.debt.set_debt(&user, amount)?;
        }
        Ok(())
    }

    /// Check both ledgers' totals against their entries
    pub fn verify_invariants(&self) -> bool {
        self.collateral.verify_invariant() && self.debt.verify_invariant()
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl LedgerView for Ledgers {
    fn collateral_of(&self, user: &Address, asset: &AssetId) -> CollateralAmount {
        self.collateral.balance_of(user, asset)
    }

    fn debt_of(&self, user: &Address) -> TokenAmount {
        self.debt.debt_of(user)
    }

    fn collateral_total(&self, asset: &AssetId) -> CollateralAmount {
        self.collateral.total(asset)
    }

    fn debt_total(&self) -> TokenAmount {
        self.debt.total()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANGE SET
// ═══════════════════════════════════════════════════════════════════════════════

/// Absolute new values for every position an operation touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    collateral: BTreeMap<(Address, AssetId), CollateralAmount>,
    collateral_totals: BTreeMap<AssetId, CollateralAmount>,
    debt: BTreeMap<Address, TokenAmount>,
    debt_total: Option<TokenAmount>,
}

impl ChangeSet {
    /// True when nothing was staged
    pub fn is_empty(&self) -> bool {
        self.collateral.is_empty() && self.debt.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGED LEDGERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Write overlay on top of committed ledgers.
///
/// Totals are tracked alongside positions so an overflow is caught while
/// staging and a later commit cannot fail halfway.
#[derive(Debug)]
pub struct StagedLedgers<'a> {
    base: &'a Ledgers,
    changes: ChangeSet,
}

impl<'a> StagedLedgers<'a> {
    /// Credit collateral to `user`
    pub fn deposit_collateral(
        &mut self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<CollateralAmount> {
        let overflow = || Error::Overflow {
            operation: "deposit collateral".into(),
        };
        let balance = self.collateral_of(user, asset).checked_add(amount).ok_or_else(overflow)?;
        let total = self.collateral_total(asset).checked_add(amount).ok_or_else(overflow)?;

        self.changes.collateral.insert((*user, asset.clone()), balance);
        self.changes.collateral_totals.insert(asset.clone(), total);
        Ok(balance)
    }

    /// Debit collateral from `user`, rejecting underflow
    pub fn withdraw_collateral(
        &mut self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<CollateralAmount> {
        let current = self.collateral_of(user, asset);
        let balance = current.checked_sub(amount).ok_or_else(|| Error::InsufficientBalance {
            what: format!("{} collateral", asset),
            required: amount.raw(),
            available: current.raw(),
        })?;
        let total = self
            .collateral_total(asset)
            .checked_sub(amount)
            .ok_or_else(|| Error::InvariantViolation(format!("{} total below a position", asset)))?;

        self.changes.collateral.insert((*user, asset.clone()), balance);
        self.changes.collateral_totals.insert(asset.clone(), total);
        Ok(balance)
    }

    /// Record newly minted debt for `user`
    pub fn increase_debt(&mut self, user: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        let overflow = || Error::Overflow {
            operation: "increase debt".into(),
        };
        let debt = self.debt_of(user).checked_add(amount).ok_or_else(overflow)?;
        let total = self.debt_total().checked_add(amount).ok_or_else(overflow)?;

        self.changes.debt.insert(*user, debt);
        self.changes.debt_total = Some(total);
        Ok(debt)
    }

    /// Record repaid debt for `user`, rejecting underflow
    pub fn decrease_debt(&mut self, user: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        let current = self.debt_of(user);
        let debt = current.checked_sub(amount).ok_or_else(|| Error::InsufficientBalance {
            what: "debt".into(),
            required: amount.raw(),
            available: current.raw(),
        })?;
        let total = self
            .debt_total()
            .checked_sub(amount)
            .ok_or_else(|| Error::InvariantViolation("total debt below a position".into()))?;

        self.changes.debt.insert(*user, debt);
        self.changes.debt_total = Some(total);
        Ok(debt)
    }

    /// Finish staging and take the accumulated writes
    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }
}

impl LedgerView for StagedLedgers<'_> {
    fn collateral_of(&self, user: &Address, asset: &AssetId) -> CollateralAmount {
        self.changes
            .collateral
            .get(&(*user, asset.clone()))
            .copied()
            .unwrap_or_else(|| self.base.collateral_of(user, asset))
    }

    fn debt_of(&self, user: &Address) -> TokenAmount {
        self.changes
            .debt
            .get(user)
            .copied()
            .unwrap_or_else(|| self.base.debt_of(user))
    }

    fn collateral_total(&self, asset: &AssetId) -> CollateralAmount {
        self.changes
            .collateral_totals
            .get(asset)
            .copied()
            .unwrap_or_else(|| self.base.collateral_total(asset))
    }

    fn debt_total(&self) -> TokenAmount {
        self.changes
            .debt_total
            .unwrap_or_else(|| self.base.debt_total())
    }
}
