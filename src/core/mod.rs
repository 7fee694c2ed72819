//! Core modules for the synthvault engine.
//!
//! This module contains the fundamental building blocks:
//! - Engine parameters
//! - Supported collateral assets
//! - Collateral and debt ledgers, plus the staged change set
//! - Stable token interface
//! - Health factor calculation

pub mod assets;
pub mod config;
pub mod debt;
pub mod health;
pub mod ledger;
pub mod token;
pub mod vault;

pub use assets::*;
pub use config::*;
pub use debt::*;
pub use health::*;
pub use ledger::*;
pub use token::*;
pub use vault::*;
