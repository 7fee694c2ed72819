//! Price oracle adapter.
//!
//! Wraps one external price feed per collateral asset and returns the USD
//! price of one whole unit at engine precision (18 fractional digits).
//! Answers older than the configured bound are rejected as stale.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::core::assets::{AssetId, AssetRegistry};
use crate::error::{Error, OracleFailure, Result};
use crate::oracle::price_feed::PriceFeed;
use crate::utils::constants::WAD_DECIMALS;
use crate::utils::math::pow10;

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the current unix time, used for staleness checks
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds
    fn now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    /// Create a clock stopped at `now`
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    /// Jump to `now`
    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE ORACLE ADAPTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-asset price lookup with normalization and staleness checks
#[derive(Clone)]
pub struct PriceOracleAdapter {
    feeds: HashMap<AssetId, Arc<dyn PriceFeed>>,
    max_staleness_secs: u64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for PriceOracleAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceOracleAdapter")
            .field("assets", &self.feeds.keys().collect::<Vec<_>>())
            .field("max_staleness_secs", &self.max_staleness_secs)
            .finish()
    }
}

impl PriceOracleAdapter {
    /// Create an adapter with no feeds
    pub fn new(max_staleness_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            feeds: HashMap::new(),
            max_staleness_secs,
            clock,
        }
    }

    /// Create an adapter over every feed of a registry
    pub fn from_registry(
        registry: &AssetRegistry,
        max_staleness_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut adapter = Self::new(max_staleness_secs, clock);
        for asset in registry.iter() {
            adapter.register(asset.id.clone(), asset.price_feed.clone());
        }
        adapter
    }

    /// Attach a feed to an asset, replacing any previous one
    pub fn register(&mut self, asset: AssetId, feed: Arc<dyn PriceFeed>) {
        self.feeds.insert(asset, feed);
    }

    /// Feed registered for `asset`
    pub fn feed_of(&self, asset: &AssetId) -> Option<&Arc<dyn PriceFeed>> {
        self.feeds.get(asset)
    }

    /// Current time as seen by the staleness check
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// USD price of one whole unit of `asset`, 18 fractional digits
    pub fn price_of(&self, asset: &AssetId) -> Result<u128> {
        let unavailable = |reason: OracleFailure| {
            warn!(asset = %asset, %reason, "Price unavailable");
            Error::OracleUnavailable {
                asset: asset.to_string(),
                reason,
            }
        };

        let feed = self
            .feeds
            .get(asset)
            .ok_or_else(|| unavailable(OracleFailure::NoPriceFeed))?;
        let data = feed
            .latest_price()
            .ok_or_else(|| unavailable(OracleFailure::NoAnswer))?;

        if data.answer <= 0 {
            return Err(unavailable(OracleFailure::NonPositive));
        }
        if data.decimals > WAD_DECIMALS {
            return Err(unavailable(OracleFailure::UnsupportedDecimals(data.decimals)));
        }

        let now = self.clock.now();
        if !data.is_fresh(now, self.max_staleness_secs) {
            return Err(unavailable(OracleFailure::Stale {
                age: data.age(now),
                max_age: self.max_staleness_secs,
            }));
        }

        let scale = pow10(WAD_DECIMALS - data.decimals)?;
        (data.answer as u128).checked_mul(scale).ok_or(Error::Overflow {
            operation: format!("scale {} price", asset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::price_feed::StaticPriceFeed;
    use crate::utils::constants::PRECISION;

    fn adapter_with(feed: Arc<StaticPriceFeed>, clock: Arc<FixedClock>) -> PriceOracleAdapter {
        let mut adapter = PriceOracleAdapter::new(3_600, clock);
        adapter.register(AssetId::from("WETH"), feed);
        adapter
    }

    fn reason(result: Result<u128>) -> Option<OracleFailure> {
        match result {
            Err(Error::OracleUnavailable { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn test_price_normalized_to_engine_precision() {
        let clock = Arc::new(FixedClock::new(100));
        let adapter = adapter_with(Arc::new(StaticPriceFeed::new(8, 2_000_00000000, 100)), clock);

        assert_eq!(adapter.price_of(&AssetId::from("WETH")).unwrap(), 2_000 * PRECISION);
    }

    #[test]
    fn test_eighteen_decimal_feed_not_rescaled() {
        let clock = Arc::new(FixedClock::new(0));
        let feed = Arc::new(StaticPriceFeed::new(18, 3 * PRECISION as i128, 0));
        let adapter = adapter_with(feed, clock);

        assert_eq!(adapter.price_of(&AssetId::from("WETH")).unwrap(), 3 * PRECISION);
    }

    #[test]
    fn test_missing_feed() {
        let adapter = PriceOracleAdapter::new(3_600, Arc::new(FixedClock::new(0)));
        assert_eq!(
            reason(adapter.price_of(&AssetId::from("WBTC"))),
            Some(OracleFailure::NoPriceFeed)
        );
    }

    #[test]
    fn test_no_answer_and_non_positive() {
        let clock = Arc::new(FixedClock::new(0));
        let feed = Arc::new(StaticPriceFeed::empty(8));
        let adapter = adapter_with(feed.clone(), clock);
        let weth = AssetId::from("WETH");

        assert_eq!(reason(adapter.price_of(&weth)), Some(OracleFailure::NoAnswer));

        feed.set_price(-1, 0);
        assert_eq!(reason(adapter.price_of(&weth)), Some(OracleFailure::NonPositive));
    }

    #[test]
    fn test_stale_price_rejected() {
        let clock = Arc::new(FixedClock::new(0));
        let adapter = adapter_with(Arc::new(StaticPriceFeed::new(8, 2_000_00000000, 0)), clock.clone());
        let weth = AssetId::from("WETH");

        clock.advance(3_600);
        assert!(adapter.price_of(&weth).is_ok());

        clock.advance(1);
        assert_eq!(
            reason(adapter.price_of(&weth)),
            Some(OracleFailure::Stale { age: 3_601, max_age: 3_600 })
        );
    }
}
