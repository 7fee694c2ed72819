//! Scenario runner.
//!
//! Wires a [`VaultEngine`] to in-memory tokens, static price feeds and a
//! manual clock, then replays a [`ScenarioConfig`] step by step. A failing
//! step is reported and the run continues with the next one.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::config::{ScenarioConfig, Step};
use crate::core::assets::AssetId;
use crate::core::token::{InMemoryToken, TokenAmount};
use crate::core::vault::{CollateralAmount, CollateralAsset};
use crate::error::{Error, Result};
use crate::oracle::adapter::{Clock, FixedClock};
use crate::oracle::price_feed::{PriceFeed, StaticPriceFeed};
use crate::protocol::VaultEngine;
use crate::utils::constants::WAD_DECIMALS;
use crate::utils::crypto::Address;
use crate::utils::math::{format_units, parse_units, pow10};

/// Label the engine's custody address is derived from
pub const CUSTODY_LABEL: &str = "synthvault-custody";

/// Symbol of the simulated stable token
pub const STABLE_SYMBOL: &str = "sUSD";

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Position in the scenario (1-based)
    pub index: usize,
    /// Human-readable step
    pub action: String,
    /// Whether the step succeeded
    pub ok: bool,
    /// Outcome or error message
    pub detail: String,
    /// Error code on failure
    pub error_code: Option<u32>,
}

/// Final state of one account
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    /// Account label
    pub name: String,
    /// Derived address
    pub address: String,
    /// Deposited collateral per asset
    pub collateral: BTreeMap<String, String>,
    /// Outstanding debt
    pub debt: String,
    /// Stable tokens in the wallet
    pub stable_balance: String,
    /// USD value of deposits, absent when a price is unavailable
    pub collateral_value_usd: Option<String>,
    /// Health factor, absent when a price is unavailable
    pub health_factor: Option<String>,
}

/// Everything a scenario run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Per-step results
    pub steps: Vec<StepReport>,
    /// Per-account final state
    pub accounts: Vec<AccountSummary>,
    /// Total outstanding debt
    pub total_debt: String,
    /// Stable token supply
    pub stable_supply: String,
    /// Whether ledger totals match their entries
    pub invariants_hold: bool,
}

impl ScenarioReport {
    /// Number of failed steps
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO RUNNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Simulated market around one engine
pub struct ScenarioRunner {
    engine: VaultEngine,
    stable: Arc<InMemoryToken>,
    tokens: BTreeMap<String, Arc<InMemoryToken>>,
    feeds: BTreeMap<String, Arc<StaticPriceFeed>>,
    clock: Arc<FixedClock>,
    accounts: BTreeMap<String, Address>,
}

impl ScenarioRunner {
    /// Build the engine and fund the accounts described by `config`
    pub fn new(config: &ScenarioConfig) -> Result<Self> {
        config.validate()?;

        let custody = Address::from_label(CUSTODY_LABEL);
        let clock = Arc::new(FixedClock::new(config.start_time));
        let stable = Arc::new(InMemoryToken::new(STABLE_SYMBOL));
        stable.set_minter(custody);

        let mut tokens = BTreeMap::new();
        let mut feeds = BTreeMap::new();
        let mut collateral: Vec<Arc<dyn CollateralAsset>> = Vec::new();
        let mut price_feeds: Vec<Arc<dyn PriceFeed>> = Vec::new();

        for asset in &config.assets {
            let token = Arc::new(InMemoryToken::new(asset.symbol.clone()));
            let answer = feed_answer(&asset.price, asset.decimals)?;
            let feed = Arc::new(StaticPriceFeed::new(asset.decimals, answer, config.start_time));

            collateral.push(token.clone());
            price_feeds.push(feed.clone());
            tokens.insert(asset.symbol.clone(), token);
            feeds.insert(asset.symbol.clone(), feed);
        }

        let engine = VaultEngine::with_clock(
            collateral,
            price_feeds,
            stable.clone(),
            custody,
            config.params.clone(),
            clock.clone(),
        )?;

        let mut accounts = BTreeMap::new();
        for account in &config.accounts {
            let address = Address::from_label(&account.name);
            for token in tokens.values() {
                token.approve(&address, &custody, u128::MAX);
            }
            stable.approve(&address, &custody, u128::MAX);

            for (symbol, amount) in &account.balances {
                if let Some(token) = tokens.get(symbol) {
                    token.credit(&address, parse_units(amount)?);
                }
            }
            accounts.insert(account.name.clone(), address);
        }

        info!(
            assets = tokens.len(),
            accounts = accounts.len(),
            start_time = config.start_time,
            "Scenario initialized"
        );

        Ok(Self {
            engine,
            stable,
            tokens,
            feeds,
            clock,
            accounts,
        })
    }

    /// Engine under simulation
    pub fn engine(&self) -> &VaultEngine {
        &self.engine
    }

    /// Address of a named account
    pub fn address_of(&self, name: &str) -> Result<Address> {
        self.accounts
            .get(name)
            .copied()
            .ok_or_else(|| Error::Config(format!("unknown account {}", name)))
    }

    /// Wallet balance of `asset` held by a named account
    pub fn wallet_balance(&self, name: &str, asset: &str) -> Result<u128> {
        let address = self.address_of(name)?;
        if asset == STABLE_SYMBOL {
            return Ok(self.stable.balance_of(&address));
        }
        Ok(self.token(asset)?.balance_of(&address))
    }

    /// Run every step of `config` and summarize the final state
    pub fn run(&self, config: &ScenarioConfig) -> Result<ScenarioReport> {
        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| self.run_step(i + 1, step))
            .collect();

        let accounts = config
            .accounts
            .iter()
            .map(|account| self.account_summary(&account.name))
            .collect::<Result<Vec<_>>>()?;

        Ok(ScenarioReport {
            steps,
            accounts,
            total_debt: self.engine.total_debt()?.to_string(),
            stable_supply: format_units(self.stable.total_supply()),
            invariants_hold: self.engine.verify_invariants()?,
        })
    }

    /// Run a single step and report the outcome
    pub fn run_step(&self, index: usize, step: &Step) -> StepReport {
        let action = step.to_string();
        match self.execute(step) {
            Ok(detail) => StepReport {
                index,
                action,
                ok: true,
                detail,
                error_code: None,
            },
            Err(e) => {
                warn!(step = index, error = %e, "Scenario step failed");
                StepReport {
                    index,
                    action,
                    ok: false,
                    detail: e.to_string(),
                    error_code: Some(e.code()),
                }
            }
        }
    }

    /// Final state of a named account
    pub fn account_summary(&self, name: &str) -> Result<AccountSummary> {
        let address = self.address_of(name)?;

        let mut collateral = BTreeMap::new();
        for asset in self.engine.collateral_assets() {
            let balance = self.engine.collateral_balance(&address, &asset)?;
            if !balance.is_zero() {
                collateral.insert(asset.to_string(), balance.to_string());
            }
        }

        let collateral_value_usd = match self.engine.account_collateral_value_usd(&address) {
            Ok(value) => Some(value.to_string()),
            Err(e) => {
                warn!(account = name, error = %e, "Collateral value unavailable");
                None
            }
        };
        let health_factor = match self.engine.health_factor(&address) {
            Ok(hf) => Some(hf.to_string()),
            Err(e) => {
                warn!(account = name, error = %e, "Health factor unavailable");
                None
            }
        };

        Ok(AccountSummary {
            name: name.to_string(),
            address: address.to_hex(),
            collateral,
            debt: self.engine.debt_of(&address)?.to_string(),
            stable_balance: format_units(self.stable.balance_of(&address)),
            collateral_value_usd,
            health_factor,
        })
    }

    fn execute(&self, step: &Step) -> Result<String> {
        match step {
            Step::Deposit { account, asset, amount } => {
                let amount = collateral(amount)?;
                self.engine
                    .deposit_collateral(&self.address_of(account)?, &AssetId::new(asset.as_str()), amount)?;
                Ok(format!("deposited {} {}", amount, asset))
            }
            Step::Mint { account, amount } => {
                let user = self.address_of(account)?;
                self.engine.mint_debt(&user, stable(amount)?)?;
                self.health_detail(&user)
            }
            Step::DepositAndMint { account, asset, collateral: deposit, debt } => {
                let user = self.address_of(account)?;
                self.engine.deposit_and_mint(
                    &user,
                    &AssetId::new(asset.as_str()),
                    collateral(deposit)?,
                    stable(debt)?,
                )?;
                self.health_detail(&user)
            }
            Step::Redeem { account, asset, amount } => {
                let user = self.address_of(account)?;
                self.engine
                    .redeem_collateral(&user, &AssetId::new(asset.as_str()), collateral(amount)?)?;
                self.health_detail(&user)
            }
            Step::Burn { account, amount } => {
                let user = self.address_of(account)?;
                self.engine.burn_debt(&user, stable(amount)?)?;
                Ok(format!("debt now {}", self.engine.debt_of(&user)?))
            }
            Step::RedeemForBurn { account, asset, collateral: redeem, debt } => {
                let user = self.address_of(account)?;
                self.engine.redeem_for_burn(
                    &user,
                    &AssetId::new(asset.as_str()),
                    collateral(redeem)?,
                    stable(debt)?,
                )?;
                self.health_detail(&user)
            }
            Step::SetPrice { asset, price } => {
                let feed = self
                    .feeds
                    .get(asset)
                    .ok_or_else(|| Error::UnsupportedAsset(asset.clone()))?;
                feed.set_price(feed_answer(price, feed.decimals())?, self.clock.now());
                Ok(format!("{} = ${}", asset, price))
            }
            Step::AdvanceTime { secs } => {
                self.clock.advance(*secs);
                Ok(format!("now {}", self.clock.now()))
            }
            Step::Liquidate { liquidator, user, asset, debt } => {
                let outcome = self.engine.liquidate(
                    &self.address_of(liquidator)?,
                    &self.address_of(user)?,
                    &AssetId::new(asset.as_str()),
                    stable(debt)?,
                )?;
                Ok(format!(
                    "seized {} {} (bonus {}), health {} -> {}",
                    outcome.quote.total_seized,
                    asset,
                    outcome.quote.bonus,
                    outcome.health_before,
                    outcome.health_after
                ))
            }
        }
    }

    fn health_detail(&self, user: &Address) -> Result<String> {
        Ok(format!(
            "debt {}, health factor {}",
            self.engine.debt_of(user)?,
            self.engine.health_factor(user)?
        ))
    }

    fn token(&self, symbol: &str) -> Result<&Arc<InMemoryToken>> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| Error::UnsupportedAsset(symbol.to_string()))
    }
}

fn collateral(amount: &str) -> Result<CollateralAmount> {
    Ok(CollateralAmount::from_raw(parse_units(amount)?))
}

fn stable(amount: &str) -> Result<TokenAmount> {
    Ok(TokenAmount::from_raw(parse_units(amount)?))
}

/// Convert a decimal USD price into a raw answer with `decimals` fractional digits.
///
/// Prices the feed cannot represent exactly are rejected.
pub fn feed_answer(price: &str, decimals: u8) -> Result<i128> {
    let shift = WAD_DECIMALS.checked_sub(decimals).ok_or(Error::InvalidParameter {
        name: "decimals".into(),
        reason: format!("{} exceeds {}", decimals, WAD_DECIMALS),
    })?;
    let raw = parse_units(price)?;
    let scale = pow10(shift)?;
    if raw % scale != 0 {
        return Err(Error::Config(format!(
            "price {} has more than {} fractional digits",
            price, decimals
        )));
    }
    i128::try_from(raw / scale).map_err(|_| Error::Overflow {
        operation: format!("price {}", price),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::PRECISION;

    fn scenario(steps: &str) -> ScenarioConfig {
        let json = format!(
            r#"{{
                "start_time": 1000,
                "assets": [{{ "symbol": "WETH", "price": "2000" }}],
                "accounts": [
                    {{ "name": "alice", "balances": {{ "WETH": "10" }} }},
                    {{ "name": "bob", "balances": {{ "WETH": "1" }} }}
                ],
                "steps": {}
            }}"#,
            steps
        );
        ScenarioConfig::from_json(&json).unwrap()
    }

    #[test]
    fn test_feed_answer() {
        assert_eq!(feed_answer("2000", 8).unwrap(), 200_000_000_000);
        assert_eq!(feed_answer("1.5", 18).unwrap(), 1_500_000_000_000_000_000);
        assert!(feed_answer("1", 19).is_err());
    }

    #[test]
    fn test_feed_answer_rejects_extra_digits() {
        assert_eq!(feed_answer("0.00000001", 8).unwrap(), 1);
        assert!(matches!(feed_answer("0.000000001", 8), Err(Error::Config(_))));
        assert!(matches!(feed_answer("2000.123", 2), Err(Error::Config(_))));
    }

    #[test]
    fn test_unrepresentable_price_fails_step() {
        let config = scenario(
            r#"[{ "action": "set_price", "asset": "WETH", "price": "1999.999999999" }]"#,
        );
        let runner = ScenarioRunner::new(&config).unwrap();
        let report = runner.run(&config).unwrap();

        assert!(!report.steps[0].ok);
        assert_eq!(report.steps[0].error_code, Some(9005));
        assert_eq!(
            runner.engine().usd_value(&AssetId::from("WETH"), CollateralAmount::from_units(1)).unwrap(),
            TokenAmount::from_units(2_000)
        );
    }

    #[test]
    fn test_run_deposit_and_mint() {
        let config = scenario(
            r#"[{ "action": "deposit_and_mint", "account": "alice", "asset": "WETH", "collateral": "10", "debt": "8000" }]"#,
        );
        let runner = ScenarioRunner::new(&config).unwrap();
        let report = runner.run(&config).unwrap();

        assert_eq!(report.failures(), 0);
        assert!(report.invariants_hold);
        assert_eq!(report.total_debt, "8000");
        assert_eq!(report.accounts[0].health_factor.as_deref(), Some("1.25"));
        assert_eq!(runner.wallet_balance("alice", STABLE_SYMBOL).unwrap(), 8_000 * PRECISION);
        assert_eq!(runner.wallet_balance("alice", "WETH").unwrap(), 0);
    }

    #[test]
    fn test_failed_step_does_not_stop_run() {
        let config = scenario(
            r#"[
                { "action": "deposit_and_mint", "account": "alice", "asset": "WETH", "collateral": "1", "debt": "1001" },
                { "action": "deposit", "account": "alice", "asset": "WETH", "amount": "1" }
            ]"#,
        );
        let runner = ScenarioRunner::new(&config).unwrap();
        let report = runner.run(&config).unwrap();

        assert!(!report.steps[0].ok);
        assert_eq!(report.steps[0].error_code, Some(4001));
        assert!(report.steps[1].ok);
        assert_eq!(report.total_debt, "0");
    }

    #[test]
    fn test_liquidation_scenario() {
        let config = scenario(
            r#"[
                { "action": "deposit_and_mint", "account": "alice", "asset": "WETH", "collateral": "1", "debt": "900" },
                { "action": "deposit_and_mint", "account": "bob", "asset": "WETH", "collateral": "1", "debt": "100" },
                { "action": "set_price", "asset": "WETH", "price": "1000" },
                { "action": "liquidate", "liquidator": "bob", "user": "alice", "asset": "WETH", "debt": "100" }
            ]"#,
        );
        let runner = ScenarioRunner::new(&config).unwrap();
        let report = runner.run(&config).unwrap();

        assert_eq!(report.failures(), 0, "{:?}", report.steps);
        assert_eq!(report.accounts[0].debt, "800");
        assert_eq!(report.accounts[0].collateral.get("WETH").map(String::as_str), Some("0.89"));
        assert_eq!(runner.wallet_balance("bob", "WETH").unwrap(), 110 * PRECISION / 1000);
    }

    #[test]
    fn test_stale_price_leaves_summary_partial() {
        let config = scenario(
            r#"[
                { "action": "deposit_and_mint", "account": "alice", "asset": "WETH", "collateral": "1", "debt": "100" },
                { "action": "advance_time", "secs": 20000 },
                { "action": "mint", "account": "alice", "amount": "1" }
            ]"#,
        );
        let runner = ScenarioRunner::new(&config).unwrap();
        let report = runner.run(&config).unwrap();

        assert_eq!(report.steps[2].error_code, Some(5001));
        assert!(report.accounts[0].health_factor.is_none());
        assert_eq!(report.accounts[0].debt, "100");
    }
}
