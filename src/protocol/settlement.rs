//! External effects of an operation, executed all-or-nothing.
//!
//! An operation collects the token movements it needs as [`Effect`]s and
//! settles them in one go. Inbound effects (funds entering custody, burns)
//! run before outbound ones (mints, collateral leaving custody). If any step
//! reports failure, the steps already taken are compensated in reverse order
//! and the original failure is returned.

use std::fmt;

use tracing::{debug, error, warn};

use crate::core::assets::{AssetId, AssetRegistry};
use crate::core::token::{StableToken, TokenAmount};
use crate::core::vault::CollateralAmount;
use crate::error::{Error, Result};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// EFFECTS
// ═══════════════════════════════════════════════════════════════════════════════

/// One call into an external collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Pull collateral from `from` into custody
    CollateralIn {
        /// Asset moved
        asset: AssetId,
        /// Owner of the funds
        from: Address,
        /// Amount moved
        amount: CollateralAmount,
    },
    /// Pay collateral out of custody to `to`
    CollateralOut {
        /// Asset moved
        asset: AssetId,
        /// Recipient
        to: Address,
        /// Amount moved
        amount: CollateralAmount,
    },
    /// Mint new stable tokens for `to`
    MintStable {
        /// Recipient
        to: Address,
        /// Amount minted
        amount: TokenAmount,
    },
    /// Pull stable tokens from `from` into custody
    PullStable {
        /// Payer
        from: Address,
        /// Amount pulled
        amount: TokenAmount,
    },
    /// Burn stable tokens held in custody
    BurnStable {
        /// Amount burned
        amount: TokenAmount,
    },
}

impl Effect {
    /// True for effects that move value into custody or out of supply
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Effect::CollateralIn { .. } | Effect::PullStable { .. } | Effect::BurnStable { .. }
        )
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::CollateralIn { asset, from, amount } => {
                write!(f, "pull {} {} from {}", amount, asset, from.short())
            }
            Effect::CollateralOut { asset, to, amount } => {
                write!(f, "send {} {} to {}", amount, asset, to.short())
            }
            Effect::MintStable { to, amount } => write!(f, "mint {} to {}", amount, to.short()),
            Effect::PullStable { from, amount } => {
                write!(f, "pull {} stable from {}", amount, from.short())
            }
            Effect::BurnStable { amount } => write!(f, "burn {} stable", amount),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Pending external effects of one operation
pub struct Settlement<'a> {
    registry: &'a AssetRegistry,
    stable: &'a dyn StableToken,
    custody: Address,
    effects: Vec<Effect>,
}

impl fmt::Debug for Settlement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("custody", &self.custody)
            .field("effects", &self.effects)
            .finish()
    }
}

impl<'a> Settlement<'a> {
    /// Start an empty settlement acting as `custody`
    pub fn new(registry: &'a AssetRegistry, stable: &'a dyn StableToken, custody: Address) -> Self {
        Self {
            registry,
            stable,
            custody,
            effects: Vec::new(),
        }
    }

    /// Queue an effect
    pub fn push(&mut self, effect: Effect) -> &mut Self {
        self.effects.push(effect);
        self
    }

    /// Queued effects in execution order
    pub fn effects(&self) -> Vec<&Effect> {
        let (inbound, outbound): (Vec<&Effect>, Vec<&Effect>) =
            self.effects.iter().partition(|e| e.is_inbound());
        inbound.into_iter().chain(outbound).collect()
    }

    /// Run every effect, compensating the executed ones if a later one fails
    pub fn execute(&self) -> Result<()> {
        let ordered = self.effects();
        let mut executed: Vec<&Effect> = Vec::with_capacity(ordered.len());

        for effect in ordered {
            if let Err(err) = self.perform(effect) {
                warn!(%effect, error = %err, "External call failed, unwinding");
                self.unwind(&executed)?;
                return Err(err);
            }
            debug!(%effect, "Settled");
            executed.push(effect);
        }
        Ok(())
    }

    /// Compensate every effect of a settlement that already executed
    pub(crate) fn revert(&self) -> Result<()> {
        warn!(effects = self.effects.len(), "Reverting settled effects");
        self.unwind(&self.effects())
    }

    fn perform(&self, effect: &Effect) -> Result<()> {
        let custody = &self.custody;
        let ok = match effect {
            Effect::CollateralIn { asset, from, amount } => {
                self.registry
                    .get(asset)?
                    .token
                    .transfer_from(custody, from, custody, *amount)
            }
            Effect::CollateralOut { asset, to, amount } => {
                self.registry.get(asset)?.token.transfer(custody, to, *amount)
            }
            Effect::MintStable { to, amount } => self.stable.mint(custody, to, *amount),
            Effect::PullStable { from, amount } => {
                self.stable.transfer_from(custody, from, custody, *amount)
            }
            Effect::BurnStable { amount } => self.stable.burn(custody, *amount),
        };

        if ok {
            return Ok(());
        }
        Err(match effect {
            Effect::MintStable { .. } => Error::MintFailed(effect.to_string()),
            _ => Error::TransferFailed(effect.to_string()),
        })
    }

    /// Reverse call for an executed effect
    fn compensate(&self, effect: &Effect) -> Result<bool> {
        let custody = &self.custody;
        Ok(match effect {
            Effect::CollateralIn { asset, from, amount } => {
                self.registry.get(asset)?.token.transfer(custody, from, *amount)
            }
            Effect::CollateralOut { asset, to, amount } => {
                self.registry
                    .get(asset)?
                    .token
                    .transfer_from(custody, to, custody, *amount)
            }
            Effect::MintStable { to, amount } => {
                self.stable.transfer_from(custody, to, custody, *amount)
                    && self.stable.burn(custody, *amount)
            }
            Effect::PullStable { from, amount } => self.stable.transfer(custody, from, *amount),
            Effect::BurnStable { amount } => self.stable.mint(custody, custody, *amount),
        })
    }

    fn unwind(&self, executed: &[&Effect]) -> Result<()> {
        let mut failures = Vec::new();
        for effect in executed.iter().rev() {
            if !self.compensate(effect).unwrap_or(false) {
                error!(%effect, "Compensation failed");
                failures.push(effect.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::SettlementUnwind(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::InMemoryToken;
    use crate::core::vault::CollateralAsset;
    use crate::oracle::price_feed::{PriceFeed, StaticPriceFeed};
    use crate::utils::constants::PRECISION;
    use std::sync::Arc;

    struct Fixture {
        weth: Arc<InMemoryToken>,
        stable: InMemoryToken,
        registry: AssetRegistry,
        custody: Address,
        alice: Address,
    }

    fn fixture() -> Fixture {
        let weth = Arc::new(InMemoryToken::new("WETH"));
        let token: Arc<dyn CollateralAsset> = weth.clone();
        let feed: Arc<dyn PriceFeed> = Arc::new(StaticPriceFeed::new(8, 2_000_00000000, 0));
        let registry = AssetRegistry::new(vec![token], vec![feed]).unwrap();

        let custody = Address::from_label("custody");
        let alice = Address::from_label("alice");
        let stable = InMemoryToken::new("svUSD");
        stable.set_minter(custody);

        weth.credit(&alice, 10 * PRECISION);
        weth.approve(&alice, &custody, u128::MAX);

        Fixture { weth, stable, registry, custody, alice }
    }

    #[test]
    fn test_inbound_runs_first() {
        let f = fixture();
        let mut settlement = Settlement::new(&f.registry, &f.stable, f.custody);
        settlement
            .push(Effect::MintStable { to: f.alice, amount: TokenAmount::from_units(1) })
            .push(Effect::CollateralIn {
                asset: AssetId::from("WETH"),
                from: f.alice,
                amount: CollateralAmount::from_units(1),
            });

        let order = settlement.effects();
        assert!(order[0].is_inbound());
        assert!(!order[1].is_inbound());
    }

    #[test]
    fn test_failed_mint_returns_collateral() {
        let f = fixture();
        f.stable.set_fail_mints(true);

        let mut settlement = Settlement::new(&f.registry, &f.stable, f.custody);
        settlement
            .push(Effect::CollateralIn {
                asset: AssetId::from("WETH"),
                from: f.alice,
                amount: CollateralAmount::from_units(4),
            })
            .push(Effect::MintStable { to: f.alice, amount: TokenAmount::from_units(1) });

        assert!(matches!(settlement.execute(), Err(Error::MintFailed(_))));
        assert_eq!(f.weth.balance_of(&f.alice), 10 * PRECISION);
        assert_eq!(f.weth.balance_of(&f.custody), 0);
    }

    #[test]
    fn test_revert_after_execute() {
        let f = fixture();
        let mut settlement = Settlement::new(&f.registry, &f.stable, f.custody);
        settlement
            .push(Effect::CollateralIn {
                asset: AssetId::from("WETH"),
                from: f.alice,
                amount: CollateralAmount::from_units(3),
            })
            .push(Effect::MintStable { to: f.alice, amount: TokenAmount::from_units(100) });
        f.stable.approve(&f.alice, &f.custody, u128::MAX);

        settlement.execute().unwrap();
        assert_eq!(f.weth.balance_of(&f.custody), 3 * PRECISION);
        assert_eq!(f.stable.balance_of(&f.alice), 100 * PRECISION);

        settlement.revert().unwrap();
        assert_eq!(f.weth.balance_of(&f.alice), 10 * PRECISION);
        assert_eq!(f.weth.balance_of(&f.custody), 0);
        assert_eq!(f.stable.balance_of(&f.alice), 0);
        assert_eq!(f.stable.total_supply(), 0);
    }

    #[test]
    fn test_failed_transfer_reports_transfer_failed() {
        let f = fixture();
        let mut settlement = Settlement::new(&f.registry, &f.stable, f.custody);
        settlement.push(Effect::PullStable { from: f.alice, amount: TokenAmount::from_units(1) });

        assert!(matches!(settlement.execute(), Err(Error::TransferFailed(_))));
    }

    #[test]
    fn test_failed_compensation_is_critical() {
        let f = fixture();
        let token: Arc<dyn CollateralAsset> = Arc::new(RefuseAfterFirst::new(f.weth.clone()));
        let feed: Arc<dyn PriceFeed> = Arc::new(StaticPriceFeed::new(8, 2_000_00000000, 0));
        let registry = AssetRegistry::new(vec![token], vec![feed]).unwrap();

        // Collateral comes in, the stable pull fails, then the refund is refused
        let mut settlement = Settlement::new(&registry, &f.stable, f.custody);
        settlement
            .push(Effect::CollateralIn {
                asset: AssetId::from("WETH"),
                from: f.alice,
                amount: CollateralAmount::from_units(1),
            })
            .push(Effect::PullStable { from: f.alice, amount: TokenAmount::from_units(1) });

        let err = settlement.execute().unwrap_err();
        assert!(matches!(err, Error::SettlementUnwind(_)));
        assert!(err.is_critical());
    }

    /// Collateral token that accepts one call and refuses the rest
    struct RefuseAfterFirst {
        inner: Arc<InMemoryToken>,
        calls: std::sync::atomic::AtomicU32,
    }

    impl RefuseAfterFirst {
        fn new(inner: Arc<InMemoryToken>) -> Self {
            Self { inner, calls: std::sync::atomic::AtomicU32::new(0) }
        }

        fn allowed(&self) -> bool {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0
        }
    }

    impl CollateralAsset for RefuseAfterFirst {
        fn asset_id(&self) -> AssetId {
            self.inner.asset_id()
        }

        fn transfer_from(
            &self,
            spender: &Address,
            from: &Address,
            to: &Address,
            amount: CollateralAmount,
        ) -> bool {
            self.allowed() && CollateralAsset::transfer_from(&*self.inner, spender, from, to, amount)
        }

        fn transfer(&self, caller: &Address, to: &Address, amount: CollateralAmount) -> bool {
            self.allowed() && CollateralAsset::transfer(&*self.inner, caller, to, amount)
        }
    }
}
