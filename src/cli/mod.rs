//! synthvault command line support.
//!
//! Scenario files drive a simulated engine so parameter choices and
//! liquidation paths can be explored without a chain.

pub mod config;
pub mod output;
pub mod scenario;

pub use config::*;
pub use output::*;
pub use scenario::*;
