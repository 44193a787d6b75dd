// =============================================================================
// Signal Fusion Engine — quant + macro + substance -> ranked picks
// =============================================================================
//
// Per candidate:
//   quant_raw = clamp(ratio_5d / 10, 0, 1)      ratio_5d defaults when no surge flag
//   macro_raw = 1 - risk_score                   shared by every candidate in a run
//   nlp_raw   = substance_total / 10             defaults when no analysis exists
//
//   total = quant_raw·w_quant + macro_raw·w_macro + nlp_raw·w_nlp
//
// Signal by descending threshold: strong_buy, buy, hold, sell, else AVOID.
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detectors::ScanBatch;
use crate::macro_risk::RiskScore;
use crate::runtime_config::FusionParams;
use crate::substance::SubstanceScore;
use crate::types::Signal;

const RATIO_SCALE: f64 = 10.0;
const SUBSTANCE_SCALE: f64 = 10.0;

/// One ranked output row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalPick {
    pub ticker: String,
    pub quant_score: f64,
    pub macro_score: f64,
    pub nlp_score: f64,
    pub total_score: f64,
    pub signal: Signal,
}

pub struct SignalFusionEngine {
    params: FusionParams,
}

impl SignalFusionEngine {
    pub fn new(params: FusionParams) -> Self {
        Self { params }
    }

    /// Weighted total and its signal bucket for already-normalized inputs.
    pub fn score(&self, quant_raw: f64, macro_raw: f64, nlp_raw: f64) -> (f64, Signal) {
        let w = &self.params.weights;
        let total = quant_raw * w.quant + macro_raw * w.macro_risk + nlp_raw * w.nlp;
        (total, self.signal_for(total))
    }

    pub fn signal_for(&self, total: f64) -> Signal {
        let t = &self.params.signal_thresholds;
        if total >= t.strong_buy {
            Signal::StrongBuy
        } else if total >= t.buy {
            Signal::Buy
        } else if total >= t.hold {
            Signal::Hold
        } else if total >= t.sell {
            Signal::Sell
        } else {
            Signal::Avoid
        }
    }

    /// Score every candidate and rank by total, descending.  Ties break on
    /// ticker.  Duplicate candidates are scored once.
    pub fn fuse(
        &self,
        candidates: &[String],
        scans: &ScanBatch,
        risk: &RiskScore,
        substance: &HashMap<String, SubstanceScore>,
    ) -> Vec<FinalPick> {
        let macro_raw = (1.0 - risk.risk_score).clamp(0.0, 1.0);

        let mut picks: Vec<FinalPick> = Vec::with_capacity(candidates.len());
        for ticker in candidates {
            if picks.iter().any(|p| &p.ticker == ticker) {
                continue;
            }
            let ratio_5d = scans
                .surge_ratio_5d(ticker)
                .unwrap_or(self.params.default_ratio_5d);
            let quant_raw = (ratio_5d / RATIO_SCALE).clamp(0.0, 1.0);

            let substance_total = substance
                .get(ticker)
                .map_or(self.params.default_substance, |s| s.total);
            let nlp_raw = (substance_total / SUBSTANCE_SCALE).clamp(0.0, 1.0);

            let (total, signal) = self.score(quant_raw, macro_raw, nlp_raw);
            debug!(
                ticker = %ticker,
                quant = format!("{:.3}", quant_raw),
                macro_raw = format!("{:.3}", macro_raw),
                nlp = format!("{:.3}", nlp_raw),
                total = format!("{:.3}", total),
                %signal,
                "candidate fused"
            );

            picks.push(FinalPick {
                ticker: ticker.clone(),
                quant_score: quant_raw,
                macro_score: macro_raw,
                nlp_score: nlp_raw,
                total_score: total,
                signal,
            });
        }

        picks.sort_by(|a, b| {
            b.total_score
                .total_cmp(&a.total_score)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        info!(
            picks = picks.len(),
            buys = picks.iter().filter(|p| p.signal.is_buy()).count(),
            "fusion complete"
        );
        picks
    }
}

impl Default for SignalFusionEngine {
    fn default() -> Self {
        Self::new(FusionParams::default())
    }
}
