// =============================================================================
// Engine Configuration — every tunable threshold, with atomic save
// =============================================================================
//
// Central configuration hub for the discovery engine.  No algorithmic module
// hard-codes a threshold; each one receives its parameter block from here.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry serde defaults so that adding new fields never
// breaks loading an older config file.
//
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::macro_risk::DefenseSector;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_avg_period_days() -> usize {
    252
}

fn default_surge_multiplier() -> f64 {
    3.0
}

fn default_min_market_cap_b() -> f64 {
    5.0
}

fn default_recent_window_days() -> usize {
    5
}

fn default_lookback_days() -> usize {
    252
}

fn default_high_threshold() -> f64 {
    0.95
}

fn default_ma_short() -> usize {
    20
}

fn default_ma_long() -> usize {
    60
}

fn default_high_risk_ratio() -> f64 {
    0.7
}

fn default_slope_window_days() -> usize {
    60
}

fn default_slope_threshold() -> f64 {
    -0.02
}

fn default_rebalance_ratio() -> f64 {
    0.3
}

fn default_momentum_lookback_days() -> usize {
    63
}

fn default_volatility_window_days() -> usize {
    20
}

fn default_defense_tickers() -> BTreeMap<DefenseSector, Vec<String>> {
    let list = |tickers: &[&str]| tickers.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        (DefenseSector::Agricultural, list(&["ADM", "BG", "CTVA", "DE"])),
        (DefenseSector::Utilities, list(&["NEE", "DUK", "SO", "AEP"])),
        (DefenseSector::ConsumerStaples, list(&["PG", "KO", "PEP", "CL"])),
        (DefenseSector::Gold, list(&["GLD", "NEM", "GOLD"])),
    ])
}

fn default_ratio_5d() -> f64 {
    1.0
}

fn default_substance() -> f64 {
    5.0
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_fallback_candidate_count() -> usize {
    10
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_llm_temperature() -> f64 {
    0.1
}

fn default_llm_max_tokens() -> u32 {
    2048
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("data/reports")
}

// =============================================================================
// Trend detector parameters
// =============================================================================

/// Trade-value surge scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeParams {
    /// Trailing window for the baseline average trade value.
    #[serde(default = "default_avg_period_days")]
    pub avg_period_days: usize,

    /// `ratio_1d` at or above this multiple flags a surge.
    #[serde(default = "default_surge_multiplier")]
    pub surge_multiplier: f64,

    /// Minimum market capitalisation in billions USD.
    #[serde(default = "default_min_market_cap_b")]
    pub min_market_cap_b: f64,

    /// Window for the smoothed `ratio_5d`.
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: usize,
}

impl Default for SurgeParams {
    fn default() -> Self {
        Self {
            avg_period_days: default_avg_period_days(),
            surge_multiplier: default_surge_multiplier(),
            min_market_cap_b: default_min_market_cap_b(),
            recent_window_days: default_recent_window_days(),
        }
    }
}

/// Near-high trade-value dead-cross scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakParams {
    /// Window for the 52-week closing high.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: usize,

    /// Fraction of the high the current close must reach.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_ma_short")]
    pub ma_short: usize,

    #[serde(default = "default_ma_long")]
    pub ma_long: usize,

    /// `tv_ratio` below this is HIGH_RISK, otherwise CAUTION.
    #[serde(default = "default_high_risk_ratio")]
    pub high_risk_ratio: f64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            high_threshold: default_high_threshold(),
            ma_short: default_ma_short(),
            ma_long: default_ma_long(),
            high_risk_ratio: default_high_risk_ratio(),
        }
    }
}

/// Declining trade-value regression scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeglectParams {
    #[serde(default = "default_slope_window_days")]
    pub slope_window_days: usize,

    /// Normalised slope below this flags neglect; below twice this is deep.
    #[serde(default = "default_slope_threshold")]
    pub slope_threshold: f64,
}

impl Default for NeglectParams {
    fn default() -> Self {
        Self {
            slope_window_days: default_slope_window_days(),
            slope_threshold: default_slope_threshold(),
        }
    }
}

// =============================================================================
// Macro risk parameters
// =============================================================================

/// Factor weights for the composite risk score. Must sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    #[serde(default = "RiskWeights::default_cpi")]
    pub cpi: f64,
    #[serde(default = "RiskWeights::default_unemployment")]
    pub unemployment: f64,
    #[serde(default = "RiskWeights::default_vix")]
    pub vix: f64,
    #[serde(default = "RiskWeights::default_yield_curve")]
    pub yield_curve: f64,
}

impl RiskWeights {
    fn default_cpi() -> f64 {
        0.2
    }
    fn default_unemployment() -> f64 {
        0.3
    }
    fn default_vix() -> f64 {
        0.3
    }
    fn default_yield_curve() -> f64 {
        0.2
    }

    pub fn sum(&self) -> f64 {
        self.cpi + self.unemployment + self.vix + self.yield_curve
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            cpi: Self::default_cpi(),
            unemployment: Self::default_unemployment(),
            vix: Self::default_vix(),
            yield_curve: Self::default_yield_curve(),
        }
    }
}

/// Independent defense-mode triggers. Any one firing turns defense mode on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskTriggers {
    #[serde(default = "RiskTriggers::default_vix_above")]
    pub vix_above: f64,
    /// Month-over-month unemployment rise in percentage points.
    #[serde(default = "RiskTriggers::default_unemployment_spike_pct")]
    pub unemployment_spike_pct: f64,
    /// Index drawdown from its 52-week high, in percent (negative).
    #[serde(default = "RiskTriggers::default_sp500_drawdown_pct")]
    pub sp500_drawdown_pct: f64,
    #[serde(default = "RiskTriggers::default_risk_score_above")]
    pub risk_score_above: f64,
}

impl RiskTriggers {
    fn default_vix_above() -> f64 {
        25.0
    }
    fn default_unemployment_spike_pct() -> f64 {
        0.3
    }
    fn default_sp500_drawdown_pct() -> f64 {
        -5.0
    }
    fn default_risk_score_above() -> f64 {
        0.7
    }
}

impl Default for RiskTriggers {
    fn default() -> Self {
        Self {
            vix_above: Self::default_vix_above(),
            unemployment_spike_pct: Self::default_unemployment_spike_pct(),
            sp500_drawdown_pct: Self::default_sp500_drawdown_pct(),
            risk_score_above: Self::default_risk_score_above(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskParams {
    #[serde(default)]
    pub weights: RiskWeights,
    #[serde(default)]
    pub triggers: RiskTriggers,
}

/// Defensive reallocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeParams {
    /// Floor of the defensive share of the portfolio when defense mode is on.
    #[serde(default = "default_rebalance_ratio")]
    pub defense_rebalance_ratio: f64,

    /// Candidate tickers per defensive sector.
    #[serde(default = "default_defense_tickers")]
    pub defense_tickers: BTreeMap<DefenseSector, Vec<String>>,

    /// Closes used for the ~3-month return.
    #[serde(default = "default_momentum_lookback_days")]
    pub momentum_lookback_days: usize,

    /// Daily returns used for the volatility denominator; also the minimum
    /// history a candidate needs to be scored.
    #[serde(default = "default_volatility_window_days")]
    pub volatility_window_days: usize,
}

impl Default for HedgeParams {
    fn default() -> Self {
        Self {
            defense_rebalance_ratio: default_rebalance_ratio(),
            defense_tickers: default_defense_tickers(),
            momentum_lookback_days: default_momentum_lookback_days(),
            volatility_window_days: default_volatility_window_days(),
        }
    }
}

// =============================================================================
// Fusion parameters
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(default = "FusionWeights::default_quant")]
    pub quant: f64,
    #[serde(rename = "macro", default = "FusionWeights::default_macro")]
    pub macro_risk: f64,
    #[serde(default = "FusionWeights::default_nlp")]
    pub nlp: f64,
}

impl FusionWeights {
    fn default_quant() -> f64 {
        0.4
    }
    fn default_macro() -> f64 {
        0.3
    }
    fn default_nlp() -> f64 {
        0.3
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            quant: Self::default_quant(),
            macro_risk: Self::default_macro(),
            nlp: Self::default_nlp(),
        }
    }
}

/// Lower bounds of each signal bucket, strictly descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalThresholds {
    #[serde(default = "SignalThresholds::default_strong_buy")]
    pub strong_buy: f64,
    #[serde(default = "SignalThresholds::default_buy")]
    pub buy: f64,
    #[serde(default = "SignalThresholds::default_hold")]
    pub hold: f64,
    #[serde(default = "SignalThresholds::default_sell")]
    pub sell: f64,
}

impl SignalThresholds {
    fn default_strong_buy() -> f64 {
        0.75
    }
    fn default_buy() -> f64 {
        0.6
    }
    fn default_hold() -> f64 {
        0.45
    }
    fn default_sell() -> f64 {
        0.3
    }
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_buy: Self::default_strong_buy(),
            buy: Self::default_buy(),
            hold: Self::default_hold(),
            sell: Self::default_sell(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionParams {
    #[serde(default)]
    pub weights: FusionWeights,

    #[serde(default)]
    pub signal_thresholds: SignalThresholds,

    /// `ratio_5d` assumed for candidates without a surge flag.
    #[serde(default = "default_ratio_5d")]
    pub default_ratio_5d: f64,

    /// Substance total (0-10) assumed for candidates without any analysis.
    #[serde(default = "default_substance")]
    pub default_substance: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            signal_thresholds: SignalThresholds::default(),
            default_ratio_5d: default_ratio_5d(),
            default_substance: default_substance(),
        }
    }
}

// =============================================================================
// Pipeline parameters
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Upper bound on in-flight provider calls.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Universe prefix analysed when nothing is flagged and the watchlist is
    /// empty. Zero disables the fallback.
    #[serde(default = "default_fallback_candidate_count")]
    pub fallback_candidate_count: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
            fallback_candidate_count: default_fallback_candidate_count(),
        }
    }
}

// =============================================================================
// Language model parameters
// =============================================================================

/// Local model used to analyse raw disclosure text.  When disabled, analyses
/// are read pre-computed from the fixture store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmParams {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the discovery engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Tickers -------------------------------------------------------------

    /// Tickers scanned by the trend detectors.
    #[serde(default)]
    pub universe: Vec<String>,

    /// Tickers always sent to substance analysis and fusion.
    #[serde(default)]
    pub watchlist: Vec<String>,

    /// Where run reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    // --- Stages -------------------------------------------------------------
    #[serde(default)]
    pub surge: SurgeParams,

    #[serde(default)]
    pub peak: PeakParams,

    #[serde(default)]
    pub neglect: NeglectParams,

    #[serde(default)]
    pub risk: RiskParams,

    #[serde(default)]
    pub hedge: HedgeParams,

    #[serde(default)]
    pub fusion: FusionParams,

    #[serde(default)]
    pub pipeline: PipelineParams,

    #[serde(default)]
    pub llm: LlmParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            universe: Vec::new(),
            watchlist: Vec::new(),
            report_dir: default_report_dir(),
            surge: SurgeParams::default(),
            peak: PeakParams::default(),
            neglect: NeglectParams::default(),
            risk: RiskParams::default(),
            hedge: HedgeParams::default(),
            fusion: FusionParams::default(),
            pipeline: PipelineParams::default(),
            llm: LlmParams::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            universe = config.universe.len(),
            watchlist = config.watchlist.len(),
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Reject configurations that would break a documented invariant.
    pub fn validate(&self) -> Result<()> {
        let w = &self.risk.weights;
        ensure!(
            (w.sum() - 1.0).abs() < 1e-6,
            "risk weights must sum to 1.0 (got {:.4})",
            w.sum()
        );
        ensure!(
            [w.cpi, w.unemployment, w.vix, w.yield_curve]
                .iter()
                .all(|x| *x >= 0.0),
            "risk weights must be non-negative"
        );

        let t = &self.fusion.signal_thresholds;
        ensure!(
            t.strong_buy > t.buy && t.buy > t.hold && t.hold > t.sell,
            "signal thresholds must be strictly descending (strong_buy > buy > hold > sell)"
        );

        ensure!(self.surge.avg_period_days > 0, "surge.avg_period_days must be > 0");
        ensure!(
            self.surge.recent_window_days > 0,
            "surge.recent_window_days must be > 0"
        );
        ensure!(
            self.peak.ma_short > 0 && self.peak.ma_short < self.peak.ma_long,
            "peak.ma_short must be > 0 and below peak.ma_long"
        );
        ensure!(
            self.neglect.slope_window_days >= 2,
            "neglect.slope_window_days must be at least 2"
        );
        ensure!(
            (0.0..=0.5).contains(&self.hedge.defense_rebalance_ratio),
            "hedge.defense_rebalance_ratio must lie in [0, 0.5]"
        );
        ensure!(
            self.pipeline.fetch_concurrency > 0,
            "pipeline.fetch_concurrency must be > 0"
        );
        Ok(())
    }
}
