//! Scenario configuration.
//!
//! A scenario describes a simulated market: the collateral assets with their
//! starting prices, funded accounts, and an ordered list of steps. Amounts and
//! prices are decimal strings (`"10"`, `"0.25"`, `"2000.50"`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::core::config::EngineParams;
use crate::error::{Error, Result};
use crate::utils::constants::DEFAULT_FEED_DECIMALS;
use crate::utils::math::parse_units;

/// Environment variable that may supply the scenario path
pub const SCENARIO_ENV: &str = "SYNTHVAULT_SCENARIO";

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete scenario description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Engine parameters (defaults when omitted)
    #[serde(default)]
    pub params: EngineParams,
    /// Unix time the simulation starts at
    #[serde(default)]
    pub start_time: u64,
    /// Collateral assets
    pub assets: Vec<AssetConfig>,
    /// Funded accounts
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Steps to run in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A collateral asset and its feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Token symbol, also the asset identifier
    pub symbol: String,
    /// Starting USD price per unit
    pub price: String,
    /// Fractional digits the feed reports
    #[serde(default = "default_feed_decimals")]
    pub decimals: u8,
}

/// An account and its starting wallet balances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Label the account address is derived from
    pub name: String,
    /// Wallet balance per collateral symbol
    #[serde(default)]
    pub balances: BTreeMap<String, String>,
}

/// One simulated action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Lock collateral
    Deposit {
        /// Acting account
        account: String,
        /// Collateral symbol
        asset: String,
        /// Amount to deposit
        amount: String,
    },
    /// Mint stable tokens
    Mint {
        /// Acting account
        account: String,
        /// Amount to mint
        amount: String,
    },
    /// Deposit and mint in one operation
    DepositAndMint {
        /// Acting account
        account: String,
        /// Collateral symbol
        asset: String,
        /// Collateral to deposit
        collateral: String,
        /// Stable tokens to mint
        debt: String,
    },
    /// Withdraw collateral
    Redeem {
        /// Acting account
        account: String,
        /// Collateral symbol
        asset: String,
        /// Amount to withdraw
        amount: String,
    },
    /// Repay debt
    Burn {
        /// Acting account
        account: String,
        /// Amount to repay
        amount: String,
    },
    /// Repay debt and withdraw collateral in one operation
    RedeemForBurn {
        /// Acting account
        account: String,
        /// Collateral symbol
        asset: String,
        /// Collateral to withdraw
        collateral: String,
        /// Debt to repay
        debt: String,
    },
    /// Report a new feed price
    SetPrice {
        /// Collateral symbol
        asset: String,
        /// New USD price per unit
        price: String,
    },
    /// Move the simulation clock forward
    AdvanceTime {
        /// Seconds to advance
        secs: u64,
    },
    /// Liquidate a position
    Liquidate {
        /// Account repaying the debt
        liquidator: String,
        /// Account being liquidated
        user: String,
        /// Collateral symbol to seize
        asset: String,
        /// Debt to cover
        debt: String,
    },
}

impl ScenarioConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&content)?;
        Ok(config)
    }

    /// Parse from a JSON string and validate
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every reference in the scenario resolves
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;

        let mut assets = BTreeSet::new();
        for asset in &self.assets {
            if !assets.insert(asset.symbol.as_str()) {
                return Err(Error::Config(format!("asset {} listed twice", asset.symbol)));
            }
            parse_units(&asset.price)?;
        }

        let mut accounts = BTreeSet::new();
        for account in &self.accounts {
            if !accounts.insert(account.name.as_str()) {
                return Err(Error::Config(format!("account {} listed twice", account.name)));
            }
            for (symbol, amount) in &account.balances {
                require(&assets, symbol, "asset")?;
                parse_units(amount)?;
            }
        }

        for step in &self.steps {
            for name in step.accounts() {
                require(&accounts, name, "account")?;
            }
            if let Some(symbol) = step.asset() {
                require(&assets, symbol, "asset")?;
            }
        }
        Ok(())
    }
}

impl Step {
    /// Accounts the step refers to
    pub fn accounts(&self) -> Vec<&str> {
        match self {
            Step::Deposit { account, .. }
            | Step::Mint { account, .. }
            | Step::DepositAndMint { account, .. }
            | Step::Redeem { account, .. }
            | Step::Burn { account, .. }
            | Step::RedeemForBurn { account, .. } => vec![account.as_str()],
            Step::Liquidate { liquidator, user, .. } => vec![liquidator.as_str(), user.as_str()],
            Step::SetPrice { .. } | Step::AdvanceTime { .. } => Vec::new(),
        }
    }

    /// Asset the step refers to, if any
    pub fn asset(&self) -> Option<&str> {
        match self {
            Step::Deposit { asset, .. }
            | Step::DepositAndMint { asset, .. }
            | Step::Redeem { asset, .. }
            | Step::RedeemForBurn { asset, .. }
            | Step::SetPrice { asset, .. }
            | Step::Liquidate { asset, .. } => Some(asset.as_str()),
            Step::Mint { .. } | Step::Burn { .. } | Step::AdvanceTime { .. } => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Deposit { account, asset, amount } => {
                write!(f, "{} deposits {} {}", account, amount, asset)
            }
            Step::Mint { account, amount } => write!(f, "{} mints {}", account, amount),
            Step::DepositAndMint { account, asset, collateral, debt } => {
                write!(f, "{} deposits {} {} and mints {}", account, collateral, asset, debt)
            }
            Step::Redeem { account, asset, amount } => {
                write!(f, "{} redeems {} {}", account, amount, asset)
            }
            Step::Burn { account, amount } => write!(f, "{} burns {}", account, amount),
            Step::RedeemForBurn { account, asset, collateral, debt } => {
                write!(f, "{} burns {} and redeems {} {}", account, debt, collateral, asset)
            }
            Step::SetPrice { asset, price } => write!(f, "{} price set to ${}", asset, price),
            Step::AdvanceTime { secs } => write!(f, "clock advances {}s", secs),
            Step::Liquidate { liquidator, user, asset, debt } => {
                write!(f, "{} liquidates {} for {} against {}", liquidator, user, debt, asset)
            }
        }
    }
}

fn require(known: &BTreeSet<&str>, name: &str, kind: &str) -> Result<()> {
    if known.contains(name) {
        Ok(())
    } else {
        Err(Error::Config(format!("unknown {} {}", kind, name)))
    }
}

fn default_feed_decimals() -> u8 {
    DEFAULT_FEED_DECIMALS
}
