//! Price feed interface.
//!
//! This module provides:
//! - `PriceData`, one reported answer with its scale and update time
//! - `PriceFeed`, the external per-asset price source the engine reads
//! - `StaticPriceFeed`, a settable feed for tests and simulations

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::utils::constants::WAD_DECIMALS;
use crate::utils::math::{format_units, pow10};

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single reported price: USD per whole unit of the asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Signed answer as reported by the source (e.g. 2000_00000000 = $2000 at 8 decimals)
    pub answer: i128,
    /// Fractional digits of `answer`
    pub decimals: u8,
    /// Unix timestamp of the last update
    pub updated_at: u64,
}

impl PriceData {
    /// Create a new price data point
    pub fn new(answer: i128, decimals: u8, updated_at: u64) -> Self {
        Self {
            answer,
            decimals,
            updated_at,
        }
    }

    /// Check if price is fresh
    pub fn is_fresh(&self, current_time: u64, max_age: u64) -> bool {
        self.age(current_time) <= max_age
    }

    /// Get age of price in seconds
    pub fn age(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.updated_at)
    }

    /// Format price for display
    pub fn format_price(&self) -> String {
        if self.answer <= 0 || self.decimals > WAD_DECIMALS {
            return format!("{} (raw, {} decimals)", self.answer, self.decimals);
        }
        pow10(WAD_DECIMALS - self.decimals)
            .ok()
            .and_then(|scale| (self.answer as u128).checked_mul(scale))
            .map(|scaled| format!("${}", format_units(scaled)))
            .unwrap_or_else(|| self.answer.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// External price source for one collateral asset
pub trait PriceFeed: Send + Sync {
    /// Latest answer, or `None` if the source has never reported
    fn latest_price(&self) -> Option<PriceData>;

    /// Human-readable name of the feed
    fn description(&self) -> String;
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Feed whose answer is set by hand
#[derive(Debug)]
pub struct StaticPriceFeed {
    decimals: u8,
    latest: RwLock<Option<PriceData>>,
}

impl StaticPriceFeed {
    /// Create a feed with an initial answer
    pub fn new(decimals: u8, answer: i128, updated_at: u64) -> Self {
        Self {
            decimals,
            latest: RwLock::new(Some(PriceData::new(answer, decimals, updated_at))),
        }
    }

    /// Create a feed that has never reported
    pub fn empty(decimals: u8) -> Self {
        Self {
            decimals,
            latest: RwLock::new(None),
        }
    }

    /// Report a new answer
    pub fn set_price(&self, answer: i128, updated_at: u64) {
        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(PriceData::new(answer, self.decimals, updated_at));
        }
    }

    /// Forget the current answer
    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.write() {
            *latest = None;
        }
    }

    /// Fractional digits of reported answers
    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl PriceFeed for StaticPriceFeed {
    fn latest_price(&self) -> Option<PriceData> {
        self.latest.read().ok().and_then(|latest| *latest)
    }

    fn description(&self) -> String {
        match self.latest_price() {
            Some(data) => format!("static feed {}", data.format_price()),
            None => "static feed (no answer)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_freshness() {
        let data = PriceData::new(2_000_00000000, 8, 1_000);
        assert!(data.is_fresh(1_500, 600));
        assert!(!data.is_fresh(2_000, 600));
        assert_eq!(data.age(900), 0);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(PriceData::new(2_000_00000000, 8, 0).format_price(), "$2000");
        assert_eq!(PriceData::new(1_50000000, 8, 0).format_price(), "$1.5");
    }

    #[test]
    fn test_static_feed_updates() {
        let feed = StaticPriceFeed::new(8, 2_000_00000000, 0);
        feed.set_price(1_000_00000000, 60);
        let data = feed.latest_price().unwrap();
        assert_eq!(data.answer, 1_000_00000000);
        assert_eq!(data.updated_at, 60);

        feed.clear();
        assert!(feed.latest_price().is_none());
        assert!(feed.description().contains("no answer"));
    }
}
