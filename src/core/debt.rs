//! Minted-debt bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::token::TokenAmount;
use crate::error::{Error, Result};
use crate::utils::crypto::Address;

/// Per-user minted debt plus the system total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLedger {
    debts: HashMap<Address, TokenAmount>,
    total: TokenAmount,
}

impl DebtLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding debt of `user`
    pub fn debt_of(&self, user: &Address) -> TokenAmount {
        self.debts.get(user).copied().unwrap_or(TokenAmount::ZERO)
    }

    /// Total outstanding debt
    pub fn total(&self) -> TokenAmount {
        self.total
    }

    /// Record newly minted debt
    pub fn increase(&mut self, user: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        let updated = self.debt_of(user).checked_add(amount).ok_or(Error::Overflow {
            operation: "increase debt".into(),
        })?;
        self.set_debt(user, updated)?;
        Ok(updated)
    }

    /// Record repaid debt, rejecting underflow
    pub fn decrease(&mut self, user: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        let current = self.debt_of(user);
        let updated = current.checked_sub(amount).ok_or_else(|| Error::InsufficientBalance {
            what: "debt".into(),
            required: amount.raw(),
            available: current.raw(),
        })?;
        self.set_debt(user, updated)?;
        Ok(updated)
    }

    pub(crate) fn set_debt(&mut self, user: &Address, amount: TokenAmount) -> Result<()> {
        let previous = self.debt_of(user);
        self.total = if amount >= previous {
            self.total.checked_add(TokenAmount::from_raw(amount.raw() - previous.raw()))
        } else {
            self.total.checked_sub(TokenAmount::from_raw(previous.raw() - amount.raw()))
        }
        .ok_or_else(|| Error::InvariantViolation("total debt out of range".into()))?;

        self.debts.insert(*user, amount);
        Ok(())
    }

    /// Verify the total equals the sum of user debts
    pub fn verify_invariant(&self) -> bool {
        self.debts
            .values()
            .try_fold(0u128, |acc, d| acc.checked_add(d.raw()))
            .map(|sum| sum == self.total.raw())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_and_decrease() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");

        ledger.increase(&alice, TokenAmount::from_units(100)).unwrap();
        ledger.decrease(&alice, TokenAmount::from_units(40)).unwrap();

        assert_eq!(ledger.debt_of(&alice), TokenAmount::from_units(60));
        assert_eq!(ledger.total(), TokenAmount::from_units(60));
        assert!(ledger.verify_invariant());
    }

    #[test]
    fn test_decrease_rejects_underflow() {
        let mut ledger = DebtLedger::new();
        let alice = Address::from_label("alice");

        ledger.increase(&alice, TokenAmount::from_units(10)).unwrap();
        let result = ledger.decrease(&alice, TokenAmount::from_units(11));

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert_eq!(ledger.debt_of(&alice), TokenAmount::from_units(10));
    }
}
