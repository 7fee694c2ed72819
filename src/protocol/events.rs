//! Engine events for state change notifications.
//!
//! Events are recorded when an operation commits, never for a failed one,
//! so the log mirrors committed ledger history. The host drains them with
//! `VaultEngine::take_events`.

use serde::{Deserialize, Serialize};

use crate::core::assets::AssetId;
use crate::core::health::HealthFactor;
use crate::core::token::TokenAmount;
use crate::core::vault::CollateralAmount;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All engine event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Collateral was credited to a position
    CollateralDeposited(CollateralDepositedEvent),
    /// Collateral left a position
    CollateralRedeemed(CollateralRedeemedEvent),
    /// Debt was minted
    DebtMinted(DebtMintedEvent),
    /// Debt was repaid and burned
    DebtBurned(DebtBurnedEvent),
    /// A position was liquidated
    Liquidated(LiquidatedEvent),
}

impl EngineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CollateralDeposited(_) => "CollateralDeposited",
            Self::CollateralRedeemed(_) => "CollateralRedeemed",
            Self::DebtMinted(_) => "DebtMinted",
            Self::DebtBurned(_) => "DebtBurned",
            Self::Liquidated(_) => "Liquidated",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::CollateralDeposited(e) => e.timestamp,
            Self::CollateralRedeemed(e) => e.timestamp,
            Self::DebtMinted(e) => e.timestamp,
            Self::DebtBurned(e) => e.timestamp,
            Self::Liquidated(e) => e.timestamp,
        }
    }
}

/// Event emitted when collateral is deposited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralDepositedEvent {
    /// Depositor
    pub user: Address,
    /// Asset deposited
    pub asset: AssetId,
    /// Amount deposited
    pub amount: CollateralAmount,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when collateral leaves a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRedeemedEvent {
    /// Position debited
    pub from: Address,
    /// Recipient of the asset
    pub to: Address,
    /// Asset redeemed
    pub asset: AssetId,
    /// Amount redeemed
    pub amount: CollateralAmount,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when debt is minted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtMintedEvent {
    /// Borrower
    pub user: Address,
    /// Amount minted
    pub amount: TokenAmount,
    /// New total debt of the user
    pub new_debt: TokenAmount,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when debt is repaid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtBurnedEvent {
    /// Whose debt was reduced
    pub on_behalf_of: Address,
    /// Who supplied the tokens
    pub payer: Address,
    /// Amount burned
    pub amount: TokenAmount,
    /// Remaining debt
    pub remaining_debt: TokenAmount,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a position is liquidated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidatedEvent {
    /// Liquidator
    pub liquidator: Address,
    /// Liquidated user
    pub user: Address,
    /// Collateral asset seized
    pub asset: AssetId,
    /// Debt covered by the liquidator
    pub debt_covered: TokenAmount,
    /// Total collateral seized, bonus included
    pub collateral_seized: CollateralAmount,
    /// Bonus part of the seizure
    pub bonus: CollateralAmount,
    /// Health factor before
    pub health_before: HealthFactor,
    /// Health factor after
    pub health_after: HealthFactor,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered collection of committed events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EngineEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    /// Remove and return every event
    pub fn take(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(timestamp: u64) -> EngineEvent {
        EngineEvent::CollateralDeposited(CollateralDepositedEvent {
            user: Address::from_label("alice"),
            asset: AssetId::from("WETH"),
            amount: CollateralAmount::from_units(1),
            timestamp,
        })
    }

    #[test]
    fn test_event_types() {
        let event = deposit(1_234_567_890);
        assert_eq!(event.event_type(), "CollateralDeposited");
        assert_eq!(event.timestamp(), 1_234_567_890);
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        assert!(log.take().is_empty());

        log.push(deposit(1));
        log.push(EngineEvent::DebtMinted(DebtMintedEvent {
            user: Address::from_label("alice"),
            amount: TokenAmount::from_units(100),
            new_debt: TokenAmount::from_units(100),
            timestamp: 2,
        }));

        let drained = log.take();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].event_type(), "DebtMinted");
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_event_json() {
        let json = serde_json::to_string(&deposit(5)).unwrap();
        assert!(json.contains("CollateralDeposited"));
        assert!(json.contains("WETH"));
    }
}
