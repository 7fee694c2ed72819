//! # synthvault
//!
//! An over-collateralized synthetic asset engine. Users lock supported
//! collateral tokens, mint a USD-pegged stable token against them, and repay
//! or withdraw as long as their position stays solvent. Positions whose
//! health factor drops below the minimum can be liquidated by anyone for a
//! collateral bonus.
//!
//! ## Architecture
//!
//! - **Core**: Amount types, engine parameters, ledgers and health factor math
//! - **Oracle**: Price feed interface, staleness checks and normalization
//! - **Protocol**: The vault engine, re-entrancy guard, settlement and events
//! - **Liquidation**: Liquidation quotes, execution and statistics
//! - **CLI**: Scenario files replayed against a simulated market
//!
//! Every state-changing operation is atomic: ledger writes are staged, the
//! external token calls settle, and only then is the staged state committed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use synthvault::prelude::*;
//!
//! let engine = VaultEngine::new(tokens, price_feeds, stable, custody, EngineParams::default())?;
//!
//! engine.deposit_and_mint(&user, &"WETH".into(), CollateralAmount::from_units(10), TokenAmount::from_units(8_000))?;
//! assert_eq!(engine.health_factor(&user)?.to_string(), "1.25");
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod liquidation;
pub mod oracle;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        assets::AssetId,
        config::EngineParams,
        health::{calculate_health_factor, HealthFactor},
        token::{InMemoryToken, StableToken, TokenAmount},
        vault::{CollateralAmount, CollateralAsset},
    };
    pub use crate::error::{Error, OracleFailure, Result};
    pub use crate::liquidation::engine::{LiquidationOutcome, LiquidationQuote, LiquidationStats};
    pub use crate::oracle::{
        adapter::{Clock, FixedClock, SystemClock},
        price_feed::{PriceData, PriceFeed, StaticPriceFeed},
    };
    pub use crate::protocol::{events::EngineEvent, VaultEngine};
    pub use crate::utils::{crypto::Address, math::FixedPoint};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const PROTOCOL_NAME: &str = "synthvault";
