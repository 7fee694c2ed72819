//! Stable token interface and an in-memory fungible token.
//!
//! This module provides:
//! - `TokenAmount`, the strongly-typed stable unit (also the engine's USD unit)
//! - `StableToken`, the external synthetic-asset contract the engine drives
//! - `InMemoryToken`, a fungible token with balances, allowances and a single
//!   minter, usable as either the stable token or a collateral token

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::core::assets::AssetId;
use crate::core::vault::{CollateralAmount, CollateralAsset};
use crate::utils::constants::PRECISION;
use crate::utils::crypto::Address;
use crate::utils::math::format_units;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed stable token amount (18 fractional digits).
///
/// The stable unit is pegged to one US dollar, so USD valuations use this
/// type as well.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from raw 18-decimal units
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole units (for convenience)
    pub fn from_units(units: u64) -> Self {
        Self(units as u128 * PRECISION)
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

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_units(self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABLE TOKEN INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// External stable token contract.
///
/// The engine is the token's minter. Every call reports success as a bool;
/// the engine maps `false` to a typed failure and unwinds.
pub trait StableToken: Send + Sync {
    /// Create `amount` new tokens for `to`
    fn mint(&self, minter: &Address, to: &Address, amount: TokenAmount) -> bool;

    /// Destroy `amount` tokens held by `holder` (the minter's own balance)
    fn burn(&self, holder: &Address, amount: TokenAmount) -> bool;

    /// Move `amount` out of the caller's own balance
    fn transfer(&self, caller: &Address, to: &Address, amount: TokenAmount) -> bool;

    /// Move `amount` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct TokenState {
    total_supply: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

impl TokenState {
    fn balance(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: u128) -> bool {
        let from_balance = self.balance(from);
        let Some(new_from) = from_balance.checked_sub(amount) else {
            return false;
        };
        if from == to {
            return true;
        }
        let Some(new_to) = self.balance(to).checked_add(amount) else {
            return false;
        };
        self.balances.insert(*from, new_from);
        self.balances.insert(*to, new_to);
        true
    }
}

/// Fungible token kept in memory.
///
/// Holders must `approve` the engine before it can pull funds. Failure
/// switches let tests make transfers or mints report `false`.
#[derive(Debug)]
pub struct InMemoryToken {
    symbol: String,
    state: RwLock<TokenState>,
    minter: RwLock<Option<Address>>,
    fail_transfers: AtomicBool,
    fail_mints: AtomicBool,
}

impl InMemoryToken {
    /// Create a token with no supply and no minter
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: RwLock::new(TokenState::default()),
            minter: RwLock::new(None),
            fail_transfers: AtomicBool::new(false),
            fail_mints: AtomicBool::new(false),
        }
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Hand minting rights to `minter` (the engine's custody address)
    pub fn set_minter(&self, minter: Address) {
        if let Ok(mut slot) = self.minter.write() {
            *slot = Some(minter);
        }
    }

    /// Create tokens for `to` outside the minter check (test faucet)
    pub fn credit(&self, to: &Address, amount: u128) {
        if let Ok(mut state) = self.state.write() {
            let balance = state.balance(to).saturating_add(amount);
            state.balances.insert(*to, balance);
            state.total_supply = state.total_supply.saturating_add(amount);
        }
    }

    /// Allow `spender` to move up to `amount` of `owner`'s tokens
    pub fn approve(&self, owner: &Address, spender: &Address, amount: u128) {
        if let Ok(mut state) = self.state.write() {
            state.allowances.insert((*owner, *spender), amount);
        }
    }

    /// Balance of `owner`
    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.state.read().map(|s| s.balance(owner)).unwrap_or(0)
    }

    /// Remaining allowance of `spender` over `owner`'s tokens
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state
            .read()
            .map(|s| s.allowances.get(&(*owner, *spender)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total supply
    pub fn total_supply(&self) -> u128 {
        self.state.read().map(|s| s.total_supply).unwrap_or(0)
    }

    /// Make every transfer report failure
    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    /// Make every mint report failure
    pub fn set_fail_mints(&self, fail: bool) {
        self.fail_mints.store(fail, Ordering::SeqCst);
    }

    fn is_minter(&self, who: &Address) -> bool {
        self.minter
            .read()
            .map(|m| m.as_ref() == Some(who))
            .unwrap_or(false)
    }

    fn do_transfer(&self, caller: &Address, to: &Address, amount: u128) -> bool {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return false;
        }
        match self.state.write() {
            Ok(mut state) => state.move_balance(caller, to, amount),
            Err(_) => false,
        }
    }

    fn do_transfer_from(&self, spender: &Address, from: &Address, to: &Address, amount: u128) -> bool {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return false;
        }
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        let key = (*from, *spender);
        let allowance = state.allowances.get(&key).copied().unwrap_or(0);
        let Some(remaining) = allowance.checked_sub(amount) else {
            return false;
        };
        if !state.move_balance(from, to, amount) {
            return false;
        }
        state.allowances.insert(key, remaining);
        true
    }
}

impl StableToken for InMemoryToken {
    fn mint(&self, minter: &Address, to: &Address, amount: TokenAmount) -> bool {
        if self.fail_mints.load(Ordering::SeqCst) || !self.is_minter(minter) {
            return false;
        }
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        let (Some(supply), Some(balance)) = (
            state.total_supply.checked_add(amount.raw()),
            state.balance(to).checked_add(amount.raw()),
        ) else {
            return false;
        };
        state.total_supply = supply;
        state.balances.insert(*to, balance);
        true
    }

    fn burn(&self, holder: &Address, amount: TokenAmount) -> bool {
        if !self.is_minter(holder) {
            return false;
        }
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        let Some(balance) = state.balance(holder).checked_sub(amount.raw()) else {
            return false;
        };
        state.balances.insert(*holder, balance);
        state.total_supply -= amount.raw();
        true
    }

    fn transfer(&self, caller: &Address, to: &Address, amount: TokenAmount) -> bool {
        self.do_transfer(caller, to, amount.raw())
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> bool {
        self.do_transfer_from(spender, from, to, amount.raw())
    }
}

impl CollateralAsset for InMemoryToken {
    fn asset_id(&self) -> AssetId {
        AssetId::new(self.symbol.clone())
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: CollateralAmount,
    ) -> bool {
        self.do_transfer_from(spender, from, to, amount.raw())
    }

    fn transfer(&self, caller: &Address, to: &Address, amount: CollateralAmount) -> bool {
        self.do_transfer(caller, to, amount.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_token_amount_display() {
        assert_eq!(TokenAmount::from_units(8_000).to_string(), "8000");
        assert_eq!(TokenAmount::from_raw(PRECISION / 4).to_string(), "0.25");
    }

    #[test]
    fn test_mint_requires_minter() {
        let token = InMemoryToken::new("svUSD");
        let engine = addr("engine");
        let alice = addr("alice");

        assert!(!StableToken::mint(&token, &engine, &alice, TokenAmount::from_units(1)));

        token.set_minter(engine);
        assert!(StableToken::mint(&token, &engine, &alice, TokenAmount::from_units(1)));
        assert_eq!(token.balance_of(&alice), PRECISION);
        assert_eq!(token.total_supply(), PRECISION);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let token = InMemoryToken::new("WETH");
        let engine = addr("engine");
        let alice = addr("alice");
        token.credit(&alice, 10 * PRECISION);

        let amount = CollateralAmount::from_units(4);
        assert!(!CollateralAsset::transfer_from(&token, &engine, &alice, &engine, amount));

        token.approve(&alice, &engine, 5 * PRECISION);
        assert!(CollateralAsset::transfer_from(&token, &engine, &alice, &engine, amount));
        assert_eq!(token.balance_of(&engine), 4 * PRECISION);
        assert_eq!(token.allowance(&alice, &engine), PRECISION);
    }

    #[test]
    fn test_burn_reduces_supply() {
        let token = InMemoryToken::new("svUSD");
        let engine = addr("engine");
        token.set_minter(engine);
        token.credit(&engine, 3 * PRECISION);

        assert!(token.burn(&engine, TokenAmount::from_units(2)));
        assert_eq!(token.total_supply(), PRECISION);
        assert!(!token.burn(&engine, TokenAmount::from_units(2)));
    }

    #[test]
    fn test_failure_switch() {
        let token = InMemoryToken::new("WETH");
        let alice = addr("alice");
        let bob = addr("bob");
        token.credit(&alice, PRECISION);

        token.set_fail_transfers(true);
        assert!(!CollateralAsset::transfer(&token, &alice, &bob, CollateralAmount::from_units(1)));
        token.set_fail_transfers(false);
        assert!(CollateralAsset::transfer(&token, &alice, &bob, CollateralAmount::from_units(1)));
    }
}
