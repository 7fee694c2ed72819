//! Error types for the synthvault engine.
//!
//! Every failure is surfaced as a distinct variant so automated callers
//! (liquidation bots, keepers) can branch on the cause.

use thiserror::Error;

use crate::utils::math::FixedPoint;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a price could not be obtained for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleFailure {
    /// No price feed is registered for the asset
    NoPriceFeed,
    /// The feed has never reported a value
    NoAnswer,
    /// The feed reported zero or a negative value
    NonPositive,
    /// The last answer is older than the configured bound
    Stale {
        /// Seconds since the last update
        age: u64,
        /// Maximum allowed age in seconds
        max_age: u64,
    },
    /// The feed reports more fractional digits than the engine supports
    UnsupportedDecimals(u8),
}

impl std::fmt::Display for OracleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPriceFeed => write!(f, "no price feed registered"),
            Self::NoAnswer => write!(f, "feed has no answer"),
            Self::NonPositive => write!(f, "feed answer is not positive"),
            Self::Stale { age, max_age } => {
                write!(f, "price is {}s old, max allowed {}s", age, max_age)
            }
            Self::UnsupportedDecimals(d) => write!(f, "unsupported feed decimals {}", d),
        }
    }
}

/// Main error type for the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Invalid input or configuration parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A ledger balance would go negative
    #[error("Insufficient {what}: required {required}, available {available}")]
    InsufficientBalance {
        /// Which balance was short
        what: String,
        /// Amount requested (raw 18-decimal units)
        required: u128,
        /// Amount held (raw 18-decimal units)
        available: u128,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Asset Registry Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Asset is not in the supported set
    #[error("Unsupported collateral asset: {0}")]
    UnsupportedAsset(String),

    /// Asset was registered twice at initialization
    #[error("Collateral asset registered twice: {0}")]
    DuplicateAsset(String),

    /// Token list and price feed list differ in length
    #[error("Length mismatch: {assets} collateral assets, {price_feeds} price feeds")]
    LengthMismatch {
        /// Number of collateral assets
        assets: usize,
        /// Number of price feeds
        price_feeds: usize,
    },

    // ═══════════════════════════════════════════════════════════════════
    // External Collaborator Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Collateral or stable token movement failed
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Stable token mint failed
    #[error("Mint failed: {0}")]
    MintFailed(String),

    /// A compensating call failed while unwinding a failed operation
    #[error("Settlement unwind failed: {0}")]
    SettlementUnwind(String),

    // ═══════════════════════════════════════════════════════════════════
    // Solvency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Health factor below the minimum after a mutation
    #[error("Health factor {health_factor} below minimum {minimum}")]
    HealthFactorBroken {
        /// Resulting health factor
        health_factor: FixedPoint,
        /// Minimum health factor
        minimum: FixedPoint,
    },

    /// Target is not under-collateralized
    #[error("Account is healthy (health factor {health_factor}) and cannot be liquidated")]
    NotLiquidatable {
        /// Current health factor of the target
        health_factor: FixedPoint,
    },

    /// Liquidation did not raise the target's health factor
    #[error("Health factor not improved: before {before}, after {after}")]
    HealthFactorNotImproved {
        /// Health factor before liquidation
        before: FixedPoint,
        /// Health factor after liquidation
        after: FixedPoint,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// No usable price for the asset
    #[error("Oracle unavailable for {asset}: {reason}")]
    OracleUnavailable {
        /// Asset whose price was requested
        asset: String,
        /// Why no price is available
        reason: OracleFailure,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Engine Errors
    // ═══════════════════════════════════════════════════════════════════

    /// An operation is already in progress on this engine
    #[error("Re-entrant call rejected: an operation is already in progress")]
    ReentrantCall,

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the caller may retry once conditions change
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::HealthFactorBroken { .. }
                | Error::NotLiquidatable { .. }
                | Error::HealthFactorNotImproved { .. }
                | Error::InsufficientBalance { .. }
                | Error::OracleUnavailable { .. }
                | Error::TransferFailed(_)
                | Error::MintFailed(_)
                | Error::ReentrantCall
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::SettlementUnwind(_)
                | Error::Overflow { .. }
                | Error::Lock
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Validation errors: 1xxx
            Error::InvalidAmount => 1001,
            Error::InvalidParameter { .. } => 1002,
            Error::InsufficientBalance { .. } => 1003,
            Error::Overflow { .. } => 1004,

            // Registry errors: 2xxx
            Error::UnsupportedAsset(_) => 2001,
            Error::DuplicateAsset(_) => 2002,
            Error::LengthMismatch { .. } => 2003,

            // Collaborator errors: 3xxx
            Error::TransferFailed(_) => 3001,
            Error::MintFailed(_) => 3002,
            Error::SettlementUnwind(_) => 3003,

            // Solvency errors: 4xxx
            Error::HealthFactorBroken { .. } => 4001,
            Error::NotLiquidatable { .. } => 4002,
            Error::HealthFactorNotImproved { .. } => 4003,

            // Oracle errors: 5xxx
            Error::OracleUnavailable { .. } => 5001,

            // Engine errors: 9xxx
            Error::ReentrantCall => 9001,
            Error::InvariantViolation(_) => 9002,
            Error::Lock => 9003,
            Error::Serialization(_) => 9004,
            Error::Config(_) => 9005,
        }
    }
}
