// =============================================================================
// Discovery Pipeline — fork-join orchestration of every scoring stage
// =============================================================================
//
//   ┌─ trend scan (bounded fan-out over the universe) ─┐
//   │                                                  ├─> candidates ─> substance ─> fusion
//   └─ macro snapshot -> risk score -> hedge ──────────┘
//
// The trend scan and the macro stage run concurrently.  Substance analysis
// waits for both, fusion waits for substance.  Provider failures never abort
// a run: the ticker is recorded as skipped and the remaining stages work on
// the reduced set.
//
// Every provider call holds a permit from one shared semaphore, so the scan,
// the hedge-history fetch and the substance calls together never exceed
// `fetch_concurrency` in-flight requests.
// =============================================================================

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::detectors::{
    NeglectTrendDetector, PeakWarningDetector, ScanBatch, SurgeDetector, TrendFlag,
};
use crate::fusion::SignalFusionEngine;
use crate::macro_risk::{HedgeAllocation, HedgeAllocator, MacroSnapshot, RiskScore, RiskScorer};
use crate::providers::{
    MacroDataProvider, MarketCapProvider, PriceHistoryProvider, ProviderError, SubstanceProvider,
    UniverseProvider,
};
use crate::report::PipelineReport;
use crate::runtime_config::EngineConfig;
use crate::substance::{merge, AnalysisRecord, SourceKind, SubstanceScore};
use crate::types::PriceSeries;

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every stage, ending in ranked picks.
    Full,
    /// Trend detectors only.
    Quant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scan,
    Hedge,
    Substance,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::Hedge => write!(f, "hedge"),
            Self::Substance => write!(f, "substance"),
        }
    }
}

/// A ticker dropped from one stage because a provider failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTicker {
    pub ticker: String,
    pub stage: Stage,
    pub reason: String,
}

impl SkippedTicker {
    fn new(ticker: &str, stage: Stage, err: &ProviderError) -> Self {
        warn!(ticker, %stage, error = %err, "ticker skipped");
        Self {
            ticker: ticker.to_string(),
            stage,
            reason: err.to_string(),
        }
    }
}

/// Every external collaborator the pipeline talks to.
#[derive(Clone)]
pub struct Providers {
    pub prices: Arc<dyn PriceHistoryProvider>,
    pub macro_data: Arc<dyn MacroDataProvider>,
    pub market_caps: Arc<dyn MarketCapProvider>,
    pub substance: Arc<dyn SubstanceProvider>,
    pub universe: Arc<dyn UniverseProvider>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    providers: Providers,
    concurrency: usize,
    permits: Semaphore,
    fallback_candidates: usize,
    surge: SurgeDetector,
    peak: PeakWarningDetector,
    neglect: NeglectTrendDetector,
    scorer: RiskScorer,
    hedge: HedgeAllocator,
    fusion: SignalFusionEngine,
}

impl Pipeline {
    pub fn new(config: &EngineConfig, providers: Providers) -> Self {
        let concurrency = config.pipeline.fetch_concurrency.max(1);
        Self {
            providers,
            concurrency,
            permits: Semaphore::new(concurrency),
            fallback_candidates: config.pipeline.fallback_candidate_count,
            surge: SurgeDetector::new(config.surge.clone()),
            peak: PeakWarningDetector::new(config.peak.clone()),
            neglect: NeglectTrendDetector::new(config.neglect.clone()),
            scorer: RiskScorer::new(config.risk.clone()),
            hedge: HedgeAllocator::new(config.hedge.clone()),
            fusion: SignalFusionEngine::new(config.fusion.clone()),
        }
    }

    /// The provider's universe, used when no explicit ticker list is given.
    pub fn default_tickers(&self) -> Vec<String> {
        self.providers.universe.tickers()
    }

    /// Trend detectors only.
    pub async fn run_quant(&self, tickers: &[String]) -> PipelineReport {
        info!(universe = tickers.len(), "quant-only run started");
        let mut report = PipelineReport::new(RunMode::Quant, tickers.len());
        let (scans, skipped) = self.scan_universe(tickers).await;
        report.scans = scans;
        report.skipped = skipped;
        report
    }

    /// All stages: scan ‖ macro, then substance, then fusion.
    pub async fn run_full(&self, tickers: &[String]) -> PipelineReport {
        info!(universe = tickers.len(), "full run started");
        let mut report = PipelineReport::new(RunMode::Full, tickers.len());

        // ── Phase 1: trend scan and macro risk, concurrently ─────────────
        let ((scans, mut skipped), (risk, hedge, hedge_skipped)) =
            tokio::join!(self.scan_universe(tickers), self.assess_macro());
        skipped.extend(hedge_skipped);

        // ── Phase 2: substance over the candidate set ────────────────────
        let candidates = self.select_candidates(&scans, tickers);
        let (substance, substance_skipped) = self.analyze_substance(&candidates).await;
        skipped.extend(substance_skipped);

        // ── Phase 3: fusion ──────────────────────────────────────────────
        let picks = self.fusion.fuse(&candidates, &scans, &risk, &substance);

        let mut substance: Vec<SubstanceScore> = substance.into_values().collect();
        substance.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        info!(
            flagged = scans.len(),
            candidates = candidates.len(),
            picks = picks.len(),
            skipped = skipped.len(),
            defense_mode = risk.defense_mode,
            "full run complete"
        );

        report.scans = scans;
        report.risk = Some(risk);
        report.hedge = Some(hedge);
        report.candidates = candidates;
        report.substance = substance;
        report.final_picks = picks;
        report.skipped = skipped;
        report
    }

    // -----------------------------------------------------------------------
    // Provider calls (each holds one fetch permit)
    // -----------------------------------------------------------------------

    async fn permit(&self) -> Result<SemaphorePermit<'_>, ProviderError> {
        self.permits
            .acquire()
            .await
            .map_err(|e| ProviderError::Upstream(format!("fetch pool closed: {e}")))
    }

    async fn fetch_series(&self, ticker: &str) -> Result<PriceSeries, ProviderError> {
        let _permit = self.permit().await?;
        self.providers.prices.fetch(ticker).await
    }

    async fn market_cap(&self, ticker: &str) -> Result<Option<f64>, ProviderError> {
        let _permit = self.permit().await?;
        self.providers.market_caps.cap_of(ticker).await
    }

    async fn analysis(
        &self,
        ticker: &str,
        source: SourceKind,
    ) -> Result<AnalysisRecord, ProviderError> {
        let _permit = self.permit().await?;
        self.providers.substance.analyze(ticker, source).await
    }

    // -----------------------------------------------------------------------
    // Trend scan
    // -----------------------------------------------------------------------

    async fn scan_universe(&self, tickers: &[String]) -> (ScanBatch, Vec<SkippedTicker>) {
        let results: Vec<(String, Result<Vec<TrendFlag>, ProviderError>)> =
            stream::iter(tickers.iter().cloned())
                .map(|ticker| async move {
                    let flags = self.scan_ticker(&ticker).await;
                    (ticker, flags)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut batch = ScanBatch::default();
        let mut skipped = Vec::new();
        for (ticker, outcome) in results {
            match outcome {
                Ok(flags) => {
                    for flag in flags {
                        batch.push(ticker.clone(), flag);
                    }
                }
                Err(e) => skipped.push(SkippedTicker::new(&ticker, Stage::Scan, &e)),
            }
        }
        batch.sort();
        if batch.is_empty() {
            debug!("no ticker raised a trend flag");
        }

        info!(
            scanned = tickers.len(),
            surge = batch.surge.len(),
            peak_warnings = batch.peak_warnings.len(),
            neglected = batch.neglected.len(),
            skipped = skipped.len(),
            "trend scan complete"
        );
        (batch, skipped)
    }

    /// Run all three detectors on one ticker.  The market cap is only looked
    /// up once the surge ratio has passed; a failed lookup counts as unknown.
    async fn scan_ticker(&self, ticker: &str) -> Result<Vec<TrendFlag>, ProviderError> {
        let series = self.fetch_series(ticker).await?;

        let surge = match self.surge.measure(&series) {
            Some(m) if self.surge.ratio_passes(&m) => {
                let cap = match self.market_cap(ticker).await {
                    Ok(cap) => cap,
                    Err(e) => {
                        warn!(ticker, error = %e, "market cap lookup failed, treating as unknown");
                        None
                    }
                };
                self.surge.evaluate(&m, cap)
            }
            _ => TrendFlag::NoSignal,
        };

        Ok([surge, self.peak.detect(&series), self.neglect.detect(&series)]
            .into_iter()
            .filter(TrendFlag::is_signal)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Macro risk + hedge
    // -----------------------------------------------------------------------

    async fn assess_macro(&self) -> (RiskScore, HedgeAllocation, Vec<SkippedTicker>) {
        let snapshot = match self.providers.macro_data.fetch_snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "macro snapshot unavailable, scoring with fallbacks");
                MacroSnapshot::default()
            }
        };
        let risk = self.scorer.score(&snapshot);

        if !risk.defense_mode {
            let hedge = self.hedge.allocate(&risk, &HashMap::new());
            return (risk, hedge, Vec::new());
        }

        let (histories, skipped) = self.fetch_histories(&self.hedge.defense_tickers()).await;
        let hedge = self.hedge.allocate(&risk, &histories);
        (risk, hedge, skipped)
    }

    async fn fetch_histories(
        &self,
        tickers: &[String],
    ) -> (HashMap<String, PriceSeries>, Vec<SkippedTicker>) {
        let results: Vec<(String, Result<PriceSeries, ProviderError>)> =
            stream::iter(tickers.iter().cloned())
                .map(|ticker| async move {
                    let series = self.fetch_series(&ticker).await;
                    (ticker, series)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut histories = HashMap::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (ticker, outcome) in results {
            match outcome {
                Ok(series) => {
                    histories.insert(ticker, series);
                }
                Err(e) => skipped.push(SkippedTicker::new(&ticker, Stage::Hedge, &e)),
            }
        }
        (histories, skipped)
    }

    // -----------------------------------------------------------------------
    // Candidates + substance
    // -----------------------------------------------------------------------

    /// Union of every flagged ticker and the watchlist, sorted.  When that is
    /// empty, the first `fallback_candidate_count` scanned tickers.
    fn select_candidates(&self, scans: &ScanBatch, tickers: &[String]) -> Vec<String> {
        let mut set: BTreeSet<String> = scans.flagged_tickers().map(str::to_string).collect();
        set.extend(self.providers.universe.watchlist());

        if set.is_empty() {
            let fallback: Vec<String> = tickers
                .iter()
                .take(self.fallback_candidates)
                .cloned()
                .collect();
            info!(candidates = fallback.len(), "nothing flagged, using universe prefix");
            return fallback;
        }
        set.into_iter().collect()
    }

    async fn analyze_substance(
        &self,
        candidates: &[String],
    ) -> (HashMap<String, SubstanceScore>, Vec<SkippedTicker>) {
        let results: Vec<_> = stream::iter(candidates.iter().cloned())
            .map(|ticker| async move {
                let (earnings, filing) = tokio::join!(
                    self.analysis(&ticker, SourceKind::Earnings),
                    self.analysis(&ticker, SourceKind::Filing),
                );
                (ticker, earnings, filing)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut scores = HashMap::new();
        let mut skipped = Vec::new();
        for (ticker, earnings, filing) in results {
            let earnings = settle(&ticker, earnings, &mut skipped).and_then(AnalysisRecord::into_earnings);
            let filing = settle(&ticker, filing, &mut skipped).and_then(AnalysisRecord::into_filing);

            if earnings.is_none() && filing.is_none() {
                debug!(ticker = %ticker, "no substance analysis available");
                continue;
            }
            let score = merge(&ticker, earnings.as_ref(), filing.as_ref());
            scores.insert(ticker, score);
        }

        info!(
            candidates = candidates.len(),
            analysed = scores.len(),
            "substance stage complete"
        );
        (scores, skipped)
    }
}

/// `NotAvailable` is an ordinary absence; other errors are recorded.
fn settle(
    ticker: &str,
    outcome: Result<AnalysisRecord, ProviderError>,
    skipped: &mut Vec<SkippedTicker>,
) -> Option<AnalysisRecord> {
    match outcome {
        Ok(rec) => {
            debug!(ticker, kind = %rec.kind(), "analysis received");
            Some(rec)
        }
        Err(ProviderError::NotAvailable(what)) => {
            debug!(ticker, what = %what, "analysis not available");
            None
        }
        Err(e) => {
            skipped.push(SkippedTicker::new(ticker, Stage::Substance, &e));
            None
        }
    }
}
