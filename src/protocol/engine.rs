//! Vault engine - state ownership and orchestration.
//!
//! The engine exclusively owns the ledgers. Every state-mutating operation
//! runs through [`VaultEngine::transact`]:
//!
//! 1. enter the re-entrancy guard
//! 2. stage ledger writes and run solvency checks on the overlay
//! 3. settle external effects, unwinding on failure
//! 4. commit the staged writes and record events
//!
//! Nothing is written to the committed ledgers before step 4, so a failure
//! at any point leaves no trace.

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{error, info};

use crate::core::assets::{AssetId, AssetRegistry};
use crate::core::config::EngineParams;
use crate::core::health::{calculate_health_factor, HealthFactor, HealthFactorCalculator};
use crate::core::ledger::{ChangeSet, LedgerView, Ledgers, StagedLedgers};
use crate::core::token::{StableToken, TokenAmount};
use crate::core::vault::{CollateralAmount, CollateralAsset};
use crate::error::{Error, Result};
use crate::liquidation::engine::LiquidationStats;
use crate::oracle::adapter::{Clock, PriceOracleAdapter, SystemClock};
use crate::oracle::price_feed::PriceFeed;
use crate::protocol::events::{EngineEvent, EventLog};
use crate::protocol::guard::ReentrancyGuard;
use crate::protocol::settlement::{Effect, Settlement};
use crate::utils::crypto::Address;
use crate::utils::validation::validate_address;

// ═══════════════════════════════════════════════════════════════════════════════
// VAULT ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Over-collateralized vault engine
pub struct VaultEngine {
    /// Supported collateral assets
    registry: AssetRegistry,
    /// Price lookup for supported assets
    oracle: PriceOracleAdapter,
    /// Stable token the engine mints and burns
    stable: Arc<dyn StableToken>,
    /// Address holding deposited collateral
    custody: Address,
    /// Risk parameters
    params: EngineParams,
    /// Committed ledgers
    ledgers: RwLock<Ledgers>,
    /// Committed events not yet drained
    events: RwLock<EventLog>,
    /// Liquidation counters
    stats: RwLock<LiquidationStats>,
    /// Operation-in-progress flag
    guard: ReentrancyGuard,
}

impl fmt::Debug for VaultEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEngine")
            .field("registry", &self.registry)
            .field("custody", &self.custody)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl VaultEngine {
    /// Create an engine reading wall-clock time for price staleness
    pub fn new(
        tokens: Vec<Arc<dyn CollateralAsset>>,
        price_feeds: Vec<Arc<dyn PriceFeed>>,
        stable: Arc<dyn StableToken>,
        custody: Address,
        params: EngineParams,
    ) -> Result<Self> {
        Self::with_clock(tokens, price_feeds, stable, custody, params, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock
    pub fn with_clock(
        tokens: Vec<Arc<dyn CollateralAsset>>,
        price_feeds: Vec<Arc<dyn PriceFeed>>,
        stable: Arc<dyn StableToken>,
        custody: Address,
        params: EngineParams,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        params.validate()?;
        validate_address(&custody, "custody")?;
        let registry = AssetRegistry::new(tokens, price_feeds)?;
        let oracle =
            PriceOracleAdapter::from_registry(&registry, params.max_price_staleness_secs, clock);

        info!(
            assets = registry.len(),
            custody = %custody.short(),
            "Vault engine initialized"
        );

        Ok(Self {
            registry,
            oracle,
            stable,
            custody,
            params,
            ledgers: RwLock::new(Ledgers::new()),
            events: RwLock::new(EventLog::new()),
            stats: RwLock::new(LiquidationStats::default()),
            guard: ReentrancyGuard::new(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCOUNT QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposited amount of `asset` for `user`
    pub fn collateral_balance(&self, user: &Address, asset: &AssetId) -> Result<CollateralAmount> {
        Ok(self.read_ledgers()?.collateral_of(user, asset))
    }

    /// Outstanding debt of `user`
    pub fn debt_of(&self, user: &Address) -> Result<TokenAmount> {
        Ok(self.read_ledgers()?.debt_of(user))
    }

    /// Debt and USD collateral value of `user`
    pub fn account_information(&self, user: &Address) -> Result<(TokenAmount, TokenAmount)> {
        let ledgers = self.read_ledgers()?;
        self.calculator().account_information(&*ledgers, user)
    }

    /// Total USD value of everything `user` has deposited
    pub fn account_collateral_value_usd(&self, user: &Address) -> Result<TokenAmount> {
        let ledgers = self.read_ledgers()?;
        self.calculator().account_collateral_value_usd(&*ledgers, user)
    }

    /// Current health factor of `user`
    pub fn health_factor(&self, user: &Address) -> Result<HealthFactor> {
        let ledgers = self.read_ledgers()?;
        self.calculator().health_factor(&*ledgers, user)
    }

    /// USD value of `amount` units of `asset`
    pub fn usd_value(&self, asset: &AssetId, amount: CollateralAmount) -> Result<TokenAmount> {
        self.calculator().usd_value(asset, amount)
    }

    /// Units of `asset` worth `usd` at the current price
    pub fn asset_amount_from_usd(&self, asset: &AssetId, usd: TokenAmount) -> Result<CollateralAmount> {
        self.calculator().asset_amount_from_usd(asset, usd)
    }

    /// Health factor of a hypothetical position under this engine's parameters
    pub fn calculate_health_factor(
        &self,
        debt: TokenAmount,
        collateral_value_usd: TokenAmount,
    ) -> Result<HealthFactor> {
        calculate_health_factor(debt, collateral_value_usd, &self.params)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ENGINE QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Supported assets in registration order
    pub fn collateral_assets(&self) -> Vec<AssetId> {
        self.registry.ids().cloned().collect()
    }

    /// Price feed of a supported asset
    pub fn price_feed_of(&self, asset: &AssetId) -> Result<Arc<dyn PriceFeed>> {
        Ok(self.registry.get(asset)?.price_feed.clone())
    }

    /// Risk parameters
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Address holding deposited collateral
    pub fn custody_address(&self) -> Address {
        self.custody
    }

    /// Total deposited of `asset` across all users
    pub fn total_collateral(&self, asset: &AssetId) -> Result<CollateralAmount> {
        Ok(self.read_ledgers()?.collateral_total(asset))
    }

    /// Total outstanding debt
    pub fn total_debt(&self) -> Result<TokenAmount> {
        Ok(self.read_ledgers()?.debt_total())
    }

    /// Copy of the committed ledgers
    pub fn snapshot(&self) -> Result<Ledgers> {
        Ok(self.read_ledgers()?.clone())
    }

    /// Check ledger totals against their entries
    pub fn verify_invariants(&self) -> Result<bool> {
        Ok(self.read_ledgers()?.verify_invariants())
    }

    /// Drain committed events
    pub fn take_events(&self) -> Result<Vec<EngineEvent>> {
        Ok(self.events.write().map_err(|_| Error::Lock)?.take())
    }

    /// Liquidation counters
    pub fn liquidation_stats(&self) -> Result<LiquidationStats> {
        Ok(self.stats.read().map_err(|_| Error::Lock)?.clone())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn calculator(&self) -> HealthFactorCalculator<'_> {
        HealthFactorCalculator::new(&self.registry, &self.oracle, &self.params)
    }

    pub(crate) fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub(crate) fn stats(&self) -> &RwLock<LiquidationStats> {
        &self.stats
    }

    fn read_ledgers(&self) -> Result<std::sync::RwLockReadGuard<'_, Ledgers>> {
        self.ledgers.read().map_err(|_| Error::Lock)
    }

    /// Run one state-mutating operation atomically.
    ///
    /// The closure stages ledger writes and queues effects; nothing reaches
    /// committed state unless it returns `Ok` and every effect settles.
    pub(crate) fn transact<T>(
        &self,
        op: impl FnOnce(&mut Transaction<'_, '_>) -> Result<T>,
    ) -> Result<T> {
        let _token = self.guard.enter()?;

        let (value, changes, settlement, events) = {
            let ledgers = self.read_ledgers()?;
            let mut tx = Transaction {
                engine: self,
                staged: ledgers.stage(),
                settlement: Settlement::new(&self.registry, self.stable.as_ref(), self.custody),
                events: Vec::new(),
                timestamp: self.oracle.now(),
            };
            let value = op(&mut tx)?;
            let Transaction {
                staged,
                settlement,
                events,
                ..
            } = tx;
            (value, staged.into_changes(), settlement, events)
        };

        settlement.execute()?;

        if let Err(err) = self.commit(changes) {
            error!(error = %err, "Commit failed after settlement, reversing effects");
            settlement.revert()?;
            return Err(err);
        }
        let mut log = self.events.write().map_err(|_| Error::Lock)?;
        for event in events {
            log.push(event);
        }
        Ok(value)
    }

    /// Write staged changes; the committed ledgers are untouched on failure
    fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut ledgers = self.ledgers.write().map_err(|_| Error::Lock)?;
        let mut next = ledgers.clone();
        next.apply(changes)?;
        *ledgers = next;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Working state of one in-flight operation
pub(crate) struct Transaction<'l, 'e> {
    pub(crate) engine: &'e VaultEngine,
    pub(crate) staged: StagedLedgers<'l>,
    settlement: Settlement<'e>,
    events: Vec<EngineEvent>,
    pub(crate) timestamp: u64,
}

impl<'l, 'e> Transaction<'l, 'e> {
    /// Calculator over the engine's assets, oracle and parameters
    pub(crate) fn calculator(&self) -> HealthFactorCalculator<'e> {
        self.engine.calculator()
    }

    /// Queue an external effect
    pub(crate) fn effect(&mut self, effect: Effect) {
        self.settlement.push(effect);
    }

    /// Record an event to publish on commit
    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    /// Fail with `HealthFactorBroken` if `user` is below the minimum after staging
    pub(crate) fn assert_solvent(&self, user: &Address) -> Result<()> {
        self.calculator().assert_solvent(&self.staged, user)
    }

    /// Health factor of `user` against staged state
    pub(crate) fn health_factor(&self, user: &Address) -> Result<HealthFactor> {
        self.calculator().health_factor(&self.staged, user)
    }
}
