//! CLI output formatting.
//!
//! Renders scenario reports and parameter sets as styled text or JSON.

use console::style;
use serde::Serialize;

use crate::cli::scenario::{AccountSummary, ScenarioReport, StepReport};
use crate::core::config::EngineParams;
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Compact JSON
    Json,
    /// Indented JSON
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Serialize `value` in this format; `None` for text
    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<Option<String>> {
        let json = match self {
            OutputFormat::Text => return Ok(None),
            OutputFormat::Json => serde_json::to_string(value),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(value),
        };
        json.map(Some).map_err(|e| Error::Serialization(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Lines describing a scenario report
pub fn render_report(report: &ScenarioReport) -> Vec<String> {
    let mut lines = vec![style("Steps").bold().to_string()];
    lines.extend(report.steps.iter().map(render_step));

    lines.push(String::new());
    lines.push(style("Accounts").bold().to_string());
    for account in &report.accounts {
        lines.extend(render_account(account));
    }

    lines.push(String::new());
    lines.push(format!("  Total debt:     {}", report.total_debt));
    lines.push(format!("  Stable supply:  {}", report.stable_supply));
    let invariants = if report.invariants_hold {
        style("hold").green()
    } else {
        style("VIOLATED").red().bold()
    };
    lines.push(format!("  Ledger totals:  {}", invariants));
    lines
}

fn render_step(step: &StepReport) -> String {
    if step.ok {
        format!(
            "{} [{}] {} {}",
            style("✓").green(),
            step.index,
            step.action,
            style(format!("({})", step.detail)).dim()
        )
    } else {
        format!(
            "{} [{}] {} {}",
            style("✗").red(),
            step.index,
            step.action,
            style(format!("({}: {})", step.error_code.unwrap_or_default(), step.detail)).red()
        )
    }
}

fn render_account(account: &AccountSummary) -> Vec<String> {
    let unavailable = || style("unavailable").yellow().to_string();
    let mut lines = vec![format!(
        "  {} {}",
        style(&account.name).cyan(),
        style(&account.address).dim()
    )];
    for (asset, amount) in &account.collateral {
        lines.push(format!("    Collateral {}: {}", asset, amount));
    }
    lines.push(format!("    Debt:          {}", account.debt));
    lines.push(format!("    Wallet stable: {}", account.stable_balance));
    lines.push(format!(
        "    Value (USD):   {}",
        account.collateral_value_usd.clone().unwrap_or_else(unavailable)
    ));
    lines.push(format!(
        "    Health factor: {}",
        account.health_factor.clone().unwrap_or_else(unavailable)
    ));
    lines
}

/// Lines describing engine parameters
pub fn render_params(params: &EngineParams) -> Vec<String> {
    vec![
        format!(
            "  Liquidation threshold: {}/{}",
            params.liquidation_threshold, params.liquidation_precision
        ),
        format!(
            "  Liquidation bonus:     {}/{}",
            params.liquidation_bonus, params.bonus_precision
        ),
        format!("  Min health factor:     {}", params.min_health_factor),
        format!("  Max price staleness:   {}s", params.max_price_staleness_secs),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_text_format_yields_no_json() {
        let params = EngineParams::default();
        assert!(OutputFormat::Text.to_json(&params).unwrap().is_none());
        let json = OutputFormat::Json.to_json(&params).unwrap().unwrap();
        assert!(json.contains("liquidation_threshold"));
    }

    #[test]
    fn test_render_params() {
        let lines = render_params(&EngineParams::default());
        assert!(lines[0].contains("50/100"));
        assert!(lines[2].contains('1'));
    }
}
