//! Utility modules for the synthvault engine.
//!
//! This module contains shared utilities used across the engine:
//! - Account addresses
//! - Fixed-point arithmetic
//! - Validation helpers
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;
pub mod validation;

pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use validation::*;
