//! Liquidation module for the synthvault engine.
//!
//! This module handles liquidation of under-collateralized positions:
//! - Quotes for seized collateral with the fixed liquidation bonus
//! - Atomic liquidation built on the position primitives
//! - Running liquidation statistics

pub mod engine;

pub use engine::*;
