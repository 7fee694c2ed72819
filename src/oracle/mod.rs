//! Oracle module for price feeds.
//!
//! This module provides price lookup for collateral assets:
//! - The external price feed interface and a settable feed
//! - The adapter that normalizes answers to engine precision
//! - Staleness checks against a pluggable clock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synthvault::oracle::{PriceOracleAdapter, StaticPriceFeed, SystemClock};
//!
//! let mut oracle = PriceOracleAdapter::new(3 * 3600, Arc::new(SystemClock));
//! oracle.register("WETH".into(), Arc::new(StaticPriceFeed::new(8, 2_000_00000000, now)));
//!
//! let price = oracle.price_of(&"WETH".into())?;
//! ```

pub mod adapter;
pub mod price_feed;

pub use adapter::*;
pub use price_feed::*;
