// =============================================================================
// Discovery Engine — Main Entry Point
// =============================================================================
//
// One invocation performs one batch run: scan the universe, score macro risk,
// analyse substance for the candidates, fuse everything into ranked picks and
// write the report.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod detectors;
mod fusion;
mod indicators;
mod macro_risk;
mod pipeline;
mod providers;
mod report;
mod runtime_config;
mod substance;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::pipeline::{Pipeline, Providers, RunMode};
use crate::providers::universe::parse_ticker_list;
use crate::providers::{FixtureStore, OllamaClient, StaticUniverse, SubstanceProvider};
use crate::runtime_config::EngineConfig;
use crate::substance::TextAnalyzer;

#[derive(Parser, Debug)]
#[command(name = "discovery-engine", version, about = "Equity discovery: trend scans, macro risk and substance fusion")]
struct Cli {
    /// Engine configuration file (JSON).
    #[arg(long, default_value = "engine_config.json")]
    config: PathBuf,

    /// Root of the fixture data directory.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = RunMode::Full)]
    mode: RunMode,

    /// Comma-separated tickers overriding the configured universe.
    #[arg(long, value_delimiter = ',')]
    tickers: Vec<String>,

    /// Overrides `report_dir` from the config.
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Do not write the report file.
    #[arg(long)]
    no_save: bool,

    /// Analyse raw disclosure text with the configured language model
    /// instead of reading pre-computed analyses.
    #[arg(long)]
    llm: bool,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Discovery Engine — Starting Run                   ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = EngineConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    // Override ticker lists from env if available.
    if let Ok(raw) = std::env::var("ENGINE_TICKERS") {
        config.universe = parse_ticker_list(&raw);
    }
    if let Ok(raw) = std::env::var("ENGINE_WATCHLIST") {
        config.watchlist = parse_ticker_list(&raw);
    }
    if let Some(dir) = cli.report_dir.clone() {
        config.report_dir = dir;
    }
    if cli.llm {
        config.llm.enabled = true;
    }

    config.validate().context("invalid engine config")?;

    if cli.write_config {
        config.save(&cli.config)?;
        return Ok(());
    }

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let store = Arc::new(FixtureStore::new(&cli.data_dir));
    let substance: Arc<dyn SubstanceProvider> = if config.llm.enabled {
        let client = OllamaClient::new(config.llm.clone())?;
        info!(model = %config.llm.model, url = %config.llm.base_url, "LLM analysis enabled");
        Arc::new(TextAnalyzer::new(store.clone(), Arc::new(client)))
    } else {
        store.clone()
    };

    let providers = Providers {
        prices: store.clone(),
        macro_data: store.clone(),
        market_caps: store.clone(),
        substance,
        universe: Arc::new(StaticUniverse::from_config(&config)),
    };
    let pipeline = Pipeline::new(&config, providers);

    let tickers = if cli.tickers.is_empty() {
        pipeline.default_tickers()
    } else {
        parse_ticker_list(&cli.tickers.join(","))
    };
    if tickers.is_empty() {
        anyhow::bail!("no tickers to scan: set `universe` in the config, ENGINE_TICKERS or --tickers");
    }

    info!(
        mode = ?cli.mode,
        tickers = tickers.len(),
        data_dir = %cli.data_dir.display(),
        "Configured run"
    );

    // ── 3. Run ───────────────────────────────────────────────────────────
    let report = match cli.mode {
        RunMode::Full => pipeline.run_full(&tickers).await,
        RunMode::Quant => pipeline.run_quant(&tickers).await,
    };

    // ── 4. Persist & summarise ───────────────────────────────────────────
    if !cli.no_save {
        report.save(&config.report_dir)?;
    }
    for line in report.digest().lines() {
        info!("{line}");
    }

    Ok(())
}
