//! Position operations: deposit, mint, redeem, burn.
//!
//! Each public operation validates its inputs, stages ledger writes, checks
//! solvency against the staged state where the operation can lower a health
//! factor, and queues the matching external effects. The generalized
//! primitives take distinct `from`/`to`/`payer` identities so liquidation can
//! reuse them; the public entry points fix every identity to the caller.

use tracing::debug;

use crate::core::assets::AssetId;
use crate::core::token::TokenAmount;
use crate::core::vault::CollateralAmount;
use crate::error::Result;
use crate::protocol::engine::{Transaction, VaultEngine};
use crate::protocol::events::{
    CollateralDepositedEvent, CollateralRedeemedEvent, DebtBurnedEvent, DebtMintedEvent,
    EngineEvent,
};
use crate::protocol::settlement::Effect;
use crate::utils::crypto::Address;
use crate::utils::validation::{validate_non_zero, validate_supported_asset};

// ═══════════════════════════════════════════════════════════════════════════════
// PRIMITIVES
// ═══════════════════════════════════════════════════════════════════════════════

impl Transaction<'_, '_> {
    /// Credit `amount` of `asset` to `user` and pull it into custody
    pub(crate) fn deposit_collateral(
        &mut self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<()> {
        validate_non_zero(amount.raw(), "collateral")?;
        validate_supported_asset(self.engine.registry(), asset)?;

        let balance = self.staged.deposit_collateral(user, asset, amount)?;
        self.effect(Effect::CollateralIn {
            asset: asset.clone(),
            from: *user,
            amount,
        });
        self.emit(EngineEvent::CollateralDeposited(CollateralDepositedEvent {
            user: *user,
            asset: asset.clone(),
            amount,
            timestamp: self.timestamp,
        }));

        debug!(user = %user.short(), %asset, %amount, %balance, "Collateral deposited");
        Ok(())
    }

    /// Record new debt for `user` and mint it to them.
    ///
    /// Solvency is not checked here; callers check once all writes are staged.
    pub(crate) fn mint_debt(&mut self, user: &Address, amount: TokenAmount) -> Result<()> {
        validate_non_zero(amount.raw(), "debt")?;

        let new_debt = self.staged.increase_debt(user, amount)?;
        self.effect(Effect::MintStable { to: *user, amount });
        self.emit(EngineEvent::DebtMinted(DebtMintedEvent {
            user: *user,
            amount,
            new_debt,
            timestamp: self.timestamp,
        }));

        debug!(user = %user.short(), %amount, %new_debt, "Debt minted");
        Ok(())
    }

    /// Debit `amount` of `asset` from `from` and pay it out to `to`
    pub(crate) fn redeem_collateral(
        &mut self,
        asset: &AssetId,
        amount: CollateralAmount,
        from: &Address,
        to: &Address,
    ) -> Result<()> {
        validate_non_zero(amount.raw(), "collateral")?;
        validate_supported_asset(self.engine.registry(), asset)?;

        let remaining = self.staged.withdraw_collateral(from, asset, amount)?;
        self.effect(Effect::CollateralOut {
            asset: asset.clone(),
            to: *to,
            amount,
        });
        self.emit(EngineEvent::CollateralRedeemed(CollateralRedeemedEvent {
            from: *from,
            to: *to,
            asset: asset.clone(),
            amount,
            timestamp: self.timestamp,
        }));

        debug!(
            from = %from.short(),
            to = %to.short(),
            %asset,
            %amount,
            %remaining,
            "Collateral redeemed"
        );
        Ok(())
    }

    /// Reduce `on_behalf_of`'s debt using tokens pulled from `payer`, then burn them
    pub(crate) fn burn_debt(
        &mut self,
        amount: TokenAmount,
        on_behalf_of: &Address,
        payer: &Address,
    ) -> Result<()> {
        validate_non_zero(amount.raw(), "debt")?;

        let remaining_debt = self.staged.decrease_debt(on_behalf_of, amount)?;
        self.effect(Effect::PullStable {
            from: *payer,
            amount,
        });
        self.effect(Effect::BurnStable { amount });
        self.emit(EngineEvent::DebtBurned(DebtBurnedEvent {
            on_behalf_of: *on_behalf_of,
            payer: *payer,
            amount,
            remaining_debt,
            timestamp: self.timestamp,
        }));

        debug!(
            on_behalf_of = %on_behalf_of.short(),
            payer = %payer.short(),
            %amount,
            %remaining_debt,
            "Debt burned"
        );
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

impl VaultEngine {
    /// Lock `amount` of `asset` as collateral
    pub fn deposit_collateral(
        &self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<()> {
        self.transact(|tx| tx.deposit_collateral(user, asset, amount))
    }

    /// Mint `amount` stable tokens against existing collateral
    pub fn mint_debt(&self, user: &Address, amount: TokenAmount) -> Result<()> {
        self.transact(|tx| {
            tx.mint_debt(user, amount)?;
            tx.assert_solvent(user)
        })
    }

    /// Deposit collateral and mint against it in one operation
    pub fn deposit_and_mint(
        &self,
        user: &Address,
        asset: &AssetId,
        collateral_amount: CollateralAmount,
        debt_amount: TokenAmount,
    ) -> Result<()> {
        self.transact(|tx| {
            tx.deposit_collateral(user, asset, collateral_amount)?;
            tx.mint_debt(user, debt_amount)?;
            tx.assert_solvent(user)
        })
    }

    /// Withdraw `amount` of `asset` back to the caller
    pub fn redeem_collateral(
        &self,
        user: &Address,
        asset: &AssetId,
        amount: CollateralAmount,
    ) -> Result<()> {
        self.transact(|tx| {
            tx.redeem_collateral(asset, amount, user, user)?;
            tx.assert_solvent(user)
        })
    }

    /// Repay `amount` of the caller's debt with the caller's tokens
    pub fn burn_debt(&self, user: &Address, amount: TokenAmount) -> Result<()> {
        self.transact(|tx| {
            tx.burn_debt(amount, user, user)?;
            // Burning cannot lower a health factor; checked anyway
            tx.assert_solvent(user)
        })
    }

    /// Repay debt and withdraw collateral in one operation
    pub fn redeem_for_burn(
        &self,
        user: &Address,
        asset: &AssetId,
        redeem_amount: CollateralAmount,
        burn_amount: TokenAmount,
    ) -> Result<()> {
        self.transact(|tx| {
            tx.burn_debt(burn_amount, user, user)?;
            tx.redeem_collateral(asset, redeem_amount, user, user)?;
            tx.assert_solvent(user)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineParams;
    use crate::core::token::InMemoryToken;
    use crate::core::vault::CollateralAsset;
    use crate::error::Error;
    use crate::oracle::adapter::FixedClock;
    use crate::oracle::price_feed::{PriceFeed, StaticPriceFeed};
    use crate::utils::constants::PRECISION;
    use crate::utils::math::FixedPoint;
    use std::sync::Arc;

    struct Fixture {
        engine: VaultEngine,
        weth: Arc<InMemoryToken>,
        stable: Arc<InMemoryToken>,
        alice: Address,
    }

    fn weth() -> AssetId {
        AssetId::from("WETH")
    }

    fn fixture() -> Fixture {
        let custody = Address::from_label("engine");
        let alice = Address::from_label("alice");

        let weth = Arc::new(InMemoryToken::new("WETH"));
        let stable = Arc::new(InMemoryToken::new("svUSD"));
        stable.set_minter(custody);
        weth.credit(&alice, 10 * PRECISION);
        weth.approve(&alice, &custody, u128::MAX);
        stable.approve(&alice, &custody, u128::MAX);

        let token: Arc<dyn CollateralAsset> = weth.clone();
        let feed: Arc<dyn PriceFeed> = Arc::new(StaticPriceFeed::new(8, 2_000_00000000, 0));
        let engine = VaultEngine::with_clock(
            vec![token],
            vec![feed],
            stable.clone(),
            custody,
            EngineParams::default(),
            Arc::new(FixedClock::new(0)),
        )
        .unwrap();

        Fixture { engine, weth, stable, alice }
    }

    #[test]
    fn test_deposit_collateral() {
        let f = fixture();
        f.engine
            .deposit_collateral(&f.alice, &weth(), CollateralAmount::from_units(10))
            .unwrap();

        assert_eq!(
            f.engine.collateral_balance(&f.alice, &weth()).unwrap(),
            CollateralAmount::from_units(10)
        );
        assert_eq!(f.weth.balance_of(&f.engine.custody_address()), 10 * PRECISION);
        assert_eq!(
            f.engine.account_collateral_value_usd(&f.alice).unwrap(),
            TokenAmount::from_units(20_000)
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        let f = fixture();
        let result = f.engine.deposit_collateral(&f.alice, &weth(), CollateralAmount::ZERO);
        assert!(matches!(result, Err(Error::InvalidAmount)));
        assert!(matches!(
            f.engine.mint_debt(&f.alice, TokenAmount::ZERO),
            Err(Error::InvalidAmount)
        ));
    }

    #[test]
    fn test_unsupported_asset_rejected() {
        let f = fixture();
        let result =
            f.engine
                .deposit_collateral(&f.alice, &AssetId::from("DOGE"), CollateralAmount::from_units(1));
        assert!(matches!(result, Err(Error::UnsupportedAsset(_))));
    }

    #[test]
    fn test_mint_within_limit() {
        let f = fixture();
        f.engine
            .deposit_and_mint(
                &f.alice,
                &weth(),
                CollateralAmount::from_units(10),
                TokenAmount::from_units(8_000),
            )
            .unwrap();

        assert_eq!(f.engine.debt_of(&f.alice).unwrap(), TokenAmount::from_units(8_000));
        assert_eq!(f.stable.balance_of(&f.alice), 8_000 * PRECISION);
        assert_eq!(
            f.engine.health_factor(&f.alice).unwrap(),
            FixedPoint::from_raw(1_250_000_000_000_000_000)
        );
    }

    #[test]
    fn test_mint_breaking_health_factor_rolls_back() {
        let f = fixture();
        f.engine
            .deposit_collateral(&f.alice, &weth(), CollateralAmount::from_units(10))
            .unwrap();

        let result = f.engine.mint_debt(&f.alice, TokenAmount::from_units(11_000));
        assert!(matches!(result, Err(Error::HealthFactorBroken { .. })));
        assert!(f.engine.debt_of(&f.alice).unwrap().is_zero());
        assert_eq!(f.stable.total_supply(), 0);
    }

    #[test]
    fn test_redeem_collateral() {
        let f = fixture();
        f.engine
            .deposit_collateral(&f.alice, &weth(), CollateralAmount::from_units(10))
            .unwrap();
        f.engine
            .redeem_collateral(&f.alice, &weth(), CollateralAmount::from_units(4))
            .unwrap();

        assert_eq!(
            f.engine.collateral_balance(&f.alice, &weth()).unwrap(),
            CollateralAmount::from_units(6)
        );
        assert_eq!(f.weth.balance_of(&f.alice), 4 * PRECISION);
    }

    #[test]
    fn test_redeem_more_than_deposited() {
        let f = fixture();
        f.engine
            .deposit_collateral(&f.alice, &weth(), CollateralAmount::from_units(1))
            .unwrap();

        let result = f.engine.redeem_collateral(&f.alice, &weth(), CollateralAmount::from_units(2));
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
    }

    #[test]
    fn test_redeem_breaking_health_factor() {
        let f = fixture();
        f.engine
            .deposit_and_mint(
                &f.alice,
                &weth(),
                CollateralAmount::from_units(10),
                TokenAmount::from_units(8_000),
            )
            .unwrap();

        let result = f.engine.redeem_collateral(&f.alice, &weth(), CollateralAmount::from_units(3));
        assert!(matches!(result, Err(Error::HealthFactorBroken { .. })));
        assert_eq!(
            f.engine.collateral_balance(&f.alice, &weth()).unwrap(),
            CollateralAmount::from_units(10)
        );
        assert_eq!(f.weth.balance_of(&f.alice), 0);
    }

    #[test]
    fn test_burn_and_redeem_for_burn() {
        let f = fixture();
        f.engine
            .deposit_and_mint(
                &f.alice,
                &weth(),
                CollateralAmount::from_units(10),
                TokenAmount::from_units(8_000),
            )
            .unwrap();

        f.engine.burn_debt(&f.alice, TokenAmount::from_units(3_000)).unwrap();
        assert_eq!(f.engine.debt_of(&f.alice).unwrap(), TokenAmount::from_units(5_000));
        assert_eq!(f.stable.total_supply(), 5_000 * PRECISION);

        f.engine
            .redeem_for_burn(
                &f.alice,
                &weth(),
                CollateralAmount::from_units(10),
                TokenAmount::from_units(5_000),
            )
            .unwrap();
        assert!(f.engine.debt_of(&f.alice).unwrap().is_zero());
        assert!(f.engine.collateral_balance(&f.alice, &weth()).unwrap().is_zero());
        assert_eq!(f.weth.balance_of(&f.alice), 10 * PRECISION);
        assert!(f.engine.health_factor(&f.alice).unwrap().is_max());
    }

    #[test]
    fn test_burn_more_than_owed() {
        let f = fixture();
        let result = f.engine.burn_debt(&f.alice, TokenAmount::from_units(1));
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
    }

    #[test]
    fn test_events_recorded_on_commit_only() {
        let f = fixture();
        f.engine
            .deposit_collateral(&f.alice, &weth(), CollateralAmount::from_units(1))
            .unwrap();
        let _ = f.engine.mint_debt(&f.alice, TokenAmount::from_units(5_000));

        let events = f.engine.take_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "CollateralDeposited");
        assert!(f.engine.take_events().unwrap().is_empty());
    }
}
