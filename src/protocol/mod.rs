//! Protocol module - engine state and orchestration.
//!
//! This module provides the vault engine that owns the ledgers and runs
//! every position operation atomically:
//! - Re-entrancy guard held for each operation
//! - Settlement of external effects with unwind on failure
//! - Event log of committed operations

pub mod engine;
pub mod events;
pub mod guard;
pub mod positions;
pub mod settlement;

pub use engine::VaultEngine;
pub use events::*;
pub use guard::*;
pub use settlement::*;
