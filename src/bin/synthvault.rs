//! synthvault CLI
//!
//! Command-line interface for exploring the vault engine: inspect risk
//! parameters, compute health factors and replay scenario files.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::{style, Term};

use synthvault::cli::{render_params, render_report, OutputFormat, ScenarioConfig, ScenarioRunner};
use synthvault::core::config::EngineParams;
use synthvault::core::health::calculate_health_factor;
use synthvault::core::token::TokenAmount;
use synthvault::utils::math::parse_units;

/// synthvault - over-collateralized synthetic asset engine
#[derive(Parser)]
#[command(name = "synthvault")]
#[command(version = synthvault::VERSION)]
#[command(about = "Command-line interface for the synthvault engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format (text, json, json-pretty)
    #[arg(short, long, env = "SYNTHVAULT_FORMAT", default_value = "text")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show risk parameters
    Params {
        /// Read parameters from a scenario file instead of the defaults
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },

    /// Compute a health factor for a hypothetical position
    Health {
        /// Outstanding debt
        #[arg(short, long)]
        debt: String,

        /// USD value of deposited collateral
        #[arg(short, long)]
        collateral_usd: String,
    },

    /// Check a scenario file without running it
    Validate {
        /// Scenario file
        #[arg(env = "SYNTHVAULT_SCENARIO")]
        path: PathBuf,
    },

    /// Replay a scenario file
    Simulate {
        /// Scenario file
        #[arg(env = "SYNTHVAULT_SCENARIO")]
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Params { scenario } => cmd_params(cli, scenario.as_deref(), term),
        Commands::Health {
            debt,
            collateral_usd,
        } => cmd_health(cli, debt, collateral_usd, term),
        Commands::Validate { path } => cmd_validate(path, term),
        Commands::Simulate { path } => cmd_simulate(cli, path, term),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_params(cli: &Cli, scenario: Option<&Path>, term: &Term) -> anyhow::Result<()> {
    let params = match scenario {
        Some(path) => ScenarioConfig::load(path)?.params,
        None => EngineParams::default(),
    };

    if let Some(json) = cli.format.to_json(&params)? {
        term.write_line(&json)?;
        return Ok(());
    }

    term.write_line(&format!("{}", style("Risk Parameters").bold()))?;
    for line in render_params(&params) {
        term.write_line(&line)?;
    }
    Ok(())
}

fn cmd_health(cli: &Cli, debt: &str, collateral_usd: &str, term: &Term) -> anyhow::Result<()> {
    let params = EngineParams::default();
    let debt = TokenAmount::from_raw(parse_units(debt)?);
    let collateral = TokenAmount::from_raw(parse_units(collateral_usd)?);
    let health_factor = calculate_health_factor(debt, collateral, &params)?;
    let liquidatable = health_factor < params.min_health_factor;

    let summary = serde_json::json!({
        "debt": debt.to_string(),
        "collateral_value_usd": collateral.to_string(),
        "health_factor": health_factor.to_string(),
        "liquidatable": liquidatable,
    });
    if let Some(json) = cli.format.to_json(&summary)? {
        term.write_line(&json)?;
        return Ok(());
    }

    term.write_line(&format!(
        "{} Health factor: {}",
        style("ℹ").blue(),
        style(health_factor).cyan()
    ))?;
    if liquidatable {
        term.write_line(&format!(
            "{} Position is below the minimum of {} and can be liquidated",
            style("⚠").yellow(),
            params.min_health_factor
        ))?;
    } else {
        term.write_line(&format!("{} Position is solvent", style("✓").green()))?;
    }
    Ok(())
}

fn cmd_validate(path: &Path, term: &Term) -> anyhow::Result<()> {
    term.write_line(&format!(
        "{} Checking {}...",
        style("→").cyan(),
        path.display()
    ))?;
    let config = ScenarioConfig::load(path)?;
    term.write_line(&format!(
        "{} {} assets, {} accounts, {} steps",
        style("✓").green(),
        config.assets.len(),
        config.accounts.len(),
        config.steps.len()
    ))?;
    Ok(())
}

fn cmd_simulate(cli: &Cli, path: &Path, term: &Term) -> anyhow::Result<()> {
    let config = ScenarioConfig::load(path)?;
    let runner = ScenarioRunner::new(&config)?;
    let report = runner.run(&config)?;

    if let Some(json) = cli.format.to_json(&report)? {
        term.write_line(&json)?;
    } else {
        term.write_line(&format!(
            "{} Running {} steps from {}",
            style("→").cyan(),
            config.steps.len(),
            path.display()
        ))?;
        term.write_line("")?;
        for line in render_report(&report) {
            term.write_line(&line)?;
        }
    }

    if !report.invariants_hold {
        anyhow::bail!("ledger totals diverged from their entries");
    }
    if report.failures() > 0 && cli.format == OutputFormat::Text {
        term.write_line("")?;
        term.write_line(&format!(
            "{} {} of {} steps failed",
            style("⚠").yellow(),
            report.failures(),
            report.steps.len()
        ))?;
    }
    Ok(())
}
