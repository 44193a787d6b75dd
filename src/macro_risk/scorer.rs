// =============================================================================
// Macro Risk Scorer — composite score + four independent defense triggers
// =============================================================================
//
// Factor scores, each in [0, 1]:
//   CPI           min(|Δcpi| / 0.5, 1)
//   Unemployment  clamp(Δunemployment / 0.5, 0, 1)     (only rises count)
//   VIX           clamp((vix - 15) / 20, 0, 1)
//   Yield curve   spread = 10y - 2y
//                   spread < 0  => min(|spread| / 1.0, 1)
//                   otherwise   => max(0, 0.3 - 0.1 · spread)
// A missing input scores FALLBACK_FACTOR_SCORE.
//
// risk_score = Σ weight_f · score_f  (weights sum to 1).
//
// Defense triggers (any one trips defense mode):
//   1. VIX            vix_current > vix_above
//   2. Unemployment   Δunemployment > unemployment_spike_pct
//   3. Drawdown       index drawdown < sp500_drawdown_pct
//   4. Composite      risk_score > risk_score_above
//
// The triggers do not depend on the composite: a VIX spike
// alone turns defense mode on even when the weighted average is low.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::macro_risk::snapshot::{self, MacroSnapshot};
use crate::runtime_config::RiskParams;

/// Score assigned to a factor whose input is missing.
pub const FALLBACK_FACTOR_SCORE: f64 = 0.3;

const CPI_FULL_SCALE: f64 = 0.5;
const UNEMPLOYMENT_FULL_SCALE: f64 = 0.5;
const VIX_CALM_LEVEL: f64 = 15.0;
const VIX_SPAN: f64 = 20.0;
const INVERSION_FULL_SCALE: f64 = 1.0;
const NORMAL_CURVE_BASE: f64 = 0.3;
const NORMAL_CURVE_SLOPE: f64 = 0.1;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Per-factor scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub cpi: f64,
    pub unemployment: f64,
    pub vix: f64,
    pub yield_curve: f64,
}

/// Snapshot of a single defense trigger for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefenseTrigger {
    pub name: String,
    /// Observed value; `None` when the input was missing.
    pub current: Option<f64>,
    pub limit: f64,
    pub tripped: bool,
}

/// Output of one scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    pub risk_score: f64,
    pub component_scores: ComponentScores,
    pub defense_mode: bool,
    /// One entry per tripped trigger; empty iff `defense_mode` is false.
    pub reasons: Vec<String>,
    pub triggers: Vec<DefenseTrigger>,
    /// Carried for the hedge allocator's sector tilts.
    pub vix_current: Option<f64>,
    pub index_drawdown_pct: Option<f64>,
}

// ---------------------------------------------------------------------------
// Factor scores
// ---------------------------------------------------------------------------

pub fn cpi_score(cpi_change: Option<f64>) -> f64 {
    match cpi_change {
        Some(c) => (c.abs() / CPI_FULL_SCALE).min(1.0),
        None => FALLBACK_FACTOR_SCORE,
    }
}

pub fn unemployment_score(unemployment_change: Option<f64>) -> f64 {
    match unemployment_change {
        Some(c) => (c / UNEMPLOYMENT_FULL_SCALE).clamp(0.0, 1.0),
        None => FALLBACK_FACTOR_SCORE,
    }
}

pub fn vix_score(vix: Option<f64>) -> f64 {
    match vix {
        Some(v) => ((v - VIX_CALM_LEVEL) / VIX_SPAN).clamp(0.0, 1.0),
        None => FALLBACK_FACTOR_SCORE,
    }
}

pub fn yield_curve_score(yield_10y: Option<f64>, yield_2y: Option<f64>) -> f64 {
    let (Some(long), Some(short)) = (yield_10y, yield_2y) else {
        return FALLBACK_FACTOR_SCORE;
    };
    let spread = long - short;
    if spread < 0.0 {
        (spread.abs() / INVERSION_FULL_SCALE).min(1.0)
    } else {
        (NORMAL_CURVE_BASE - spread * NORMAL_CURVE_SLOPE).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Risk Scorer
// ---------------------------------------------------------------------------

pub struct RiskScorer {
    params: RiskParams,
}

impl RiskScorer {
    pub fn new(params: RiskParams) -> Self {
        Self { params }
    }

    /// Score one snapshot. Total over any input: missing values fall back.
    pub fn score(&self, snap: &MacroSnapshot) -> RiskScore {
        let w = &self.params.weights;
        let t = &self.params.triggers;

        let cpi_change = snap.indicator_change(snapshot::CPI);
        let unemployment_change = snap.indicator_change(snapshot::UNEMPLOYMENT);
        let vix_current = snap.vix_current();
        let drawdown = snap.drawdown_pct();

        let components = ComponentScores {
            cpi: cpi_score(cpi_change),
            unemployment: unemployment_score(unemployment_change),
            vix: vix_score(vix_current),
            yield_curve: yield_curve_score(
                snap.indicator_current(snapshot::YIELD_10Y),
                snap.indicator_current(snapshot::YIELD_2Y),
            ),
        };

        let risk_score = components.cpi * w.cpi
            + components.unemployment * w.unemployment
            + components.vix * w.vix
            + components.yield_curve * w.yield_curve;

        // --- Defense triggers ----------------------------------------------
        let mut triggers = Vec::with_capacity(4);
        let mut reasons = Vec::new();

        // 1. VIX level
        let vix_tripped = vix_current.is_some_and(|v| v > t.vix_above);
        if let Some(v) = vix_current.filter(|_| vix_tripped) {
            reasons.push(format!("VIX {:.2} > {}", v, t.vix_above));
        }
        triggers.push(DefenseTrigger {
            name: "VIX".to_string(),
            current: vix_current,
            limit: t.vix_above,
            tripped: vix_tripped,
        });

        // 2. Unemployment spike
        let unemp_tripped = unemployment_change.is_some_and(|c| c > t.unemployment_spike_pct);
        if let Some(c) = unemployment_change.filter(|_| unemp_tripped) {
            reasons.push(format!(
                "Unemployment spike +{:.2}pp > {}pp",
                c, t.unemployment_spike_pct
            ));
        }
        triggers.push(DefenseTrigger {
            name: "Unemployment Spike".to_string(),
            current: unemployment_change,
            limit: t.unemployment_spike_pct,
            tripped: unemp_tripped,
        });

        // 3. Index drawdown
        let drawdown_tripped = drawdown.is_some_and(|d| d < t.sp500_drawdown_pct);
        if let Some(d) = drawdown.filter(|_| drawdown_tripped) {
            reasons.push(format!(
                "Index drawdown {:.2}% < {}%",
                d, t.sp500_drawdown_pct
            ));
        }
        triggers.push(DefenseTrigger {
            name: "Index Drawdown".to_string(),
            current: drawdown,
            limit: t.sp500_drawdown_pct,
            tripped: drawdown_tripped,
        });

        // 4. Composite score
        let composite_tripped = risk_score > t.risk_score_above;
        if composite_tripped {
            reasons.push(format!(
                "Risk score {:.2} > {:.2}",
                risk_score, t.risk_score_above
            ));
        }
        triggers.push(DefenseTrigger {
            name: "Composite Risk".to_string(),
            current: Some(risk_score),
            limit: t.risk_score_above,
            tripped: composite_tripped,
        });

        let defense_mode = triggers.iter().any(|tr| tr.tripped);

        debug!(
            cpi = format!("{:.3}", components.cpi),
            unemployment = format!("{:.3}", components.unemployment),
            vix = format!("{:.3}", components.vix),
            yield_curve = format!("{:.3}", components.yield_curve),
            vix_rising = ?snap.vix.is_rising(),
            "macro factor scores"
        );
        if defense_mode {
            warn!(
                risk_score = format!("{:.3}", risk_score),
                reasons = ?reasons,
                "defense mode ON"
            );
        } else {
            info!(risk_score = format!("{:.3}", risk_score), "defense mode off");
        }

        RiskScore {
            risk_score,
            component_scores: components,
            defense_mode,
            reasons,
            triggers,
            vix_current,
            index_drawdown_pct: drawdown,
        }
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskParams::default())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_risk::snapshot::{IndexReading, IndicatorReading, VixReading};

    fn snapshot(vix: f64, drawdown: f64, cpi: f64, unemp: f64, y10: f64, y2: f64) -> MacroSnapshot {
        let change = |c: f64| IndicatorReading {
            change: Some(c),
            ..Default::default()
        };
        let level = |v: f64| IndicatorReading {
            current: Some(v),
            ..Default::default()
        };
        MacroSnapshot {
            as_of: None,
            vix: VixReading {
                current: Some(vix),
                ma20: None,
            },
            index: IndexReading {
                drawdown_pct: Some(drawdown),
                ..Default::default()
            },
            indicators: [
                (snapshot::CPI.to_string(), change(cpi)),
                (snapshot::UNEMPLOYMENT.to_string(), change(unemp)),
                (snapshot::YIELD_10Y.to_string(), level(y10)),
                (snapshot::YIELD_2Y.to_string(), level(y2)),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn stressed_market_enters_defense_mode() {
        let r = RiskScorer::default().score(&snapshot(35.0, -8.0, 0.5, 0.4, 3.5, 4.0));
        // cpi 1.0, unemployment 0.8, vix 1.0, curve 0.5
        assert!((r.risk_score - 0.84).abs() < 1e-9);
        assert!(r.defense_mode);
        assert!(r.reasons.len() >= 2);
        assert!(r.reasons.iter().any(|s| s.starts_with("VIX")));
        assert!(r.reasons.iter().any(|s| s.starts_with("Index drawdown")));
        assert_eq!(r.reasons.len(), r.triggers.iter().filter(|t| t.tripped).count());
    }

    #[test]
    fn calm_market_stays_out_of_defense() {
        let r = RiskScorer::default().score(&snapshot(14.0, -1.5, 0.1, -0.1, 4.5, 4.0));
        assert!(r.risk_score < 0.5);
        assert!(!r.defense_mode);
        assert!(r.reasons.is_empty());
    }

    #[test]
    fn inverted_curve_scores_above_fallback() {
        let r = RiskScorer::default().score(&snapshot(20.0, -2.0, 0.2, 0.0, 3.8, 4.5));
        assert!(r.component_scores.yield_curve > FALLBACK_FACTOR_SCORE);
        assert!((r.component_scores.yield_curve - 0.7).abs() < 1e-9);
    }

    #[test]
    fn missing_inputs_use_named_fallback() {
        let r = RiskScorer::default().score(&MacroSnapshot::default());
        let c = r.component_scores;
        for score in [c.cpi, c.unemployment, c.vix, c.yield_curve] {
            assert_eq!(score, FALLBACK_FACTOR_SCORE);
        }
        assert!((r.risk_score - FALLBACK_FACTOR_SCORE).abs() < 1e-12);
        assert!(!r.defense_mode);
        assert!(r.reasons.is_empty());
    }

    #[test]
    fn vix_alone_can_trigger_with_low_composite() {
        // Everything calm except a VIX print just over the trigger.
        let r = RiskScorer::default().score(&snapshot(26.0, 0.0, 0.0, -0.2, 4.5, 4.0));
        assert!(r.risk_score < 0.5, "composite {}", r.risk_score);
        assert!(r.defense_mode);
        assert_eq!(r.reasons.len(), 1);
    }

    #[test]
    fn vix_component_is_monotonic() {
        let mut prev = -1.0;
        for step in 0..120 {
            let v = 5.0 + step as f64 * 0.5;
            let s = vix_score(Some(v));
            assert!(s >= prev, "vix {v}: {s} < {prev}");
            assert!((0.0..=1.0).contains(&s));
            prev = s;
        }
    }

    #[test]
    fn unemployment_falls_do_not_score() {
        assert_eq!(unemployment_score(Some(-0.4)), 0.0);
        assert!((unemployment_score(Some(0.25)) - 0.5).abs() < 1e-12);
        assert_eq!(unemployment_score(Some(2.0)), 1.0);
    }

    #[test]
    fn yield_curve_piecewise() {
        assert!((yield_curve_score(Some(4.0), Some(4.0)) - 0.3).abs() < 1e-12);
        assert_eq!(yield_curve_score(Some(8.0), Some(4.0)), 0.0);
        assert_eq!(yield_curve_score(Some(2.0), Some(4.5)), 1.0);
        assert_eq!(yield_curve_score(None, Some(4.0)), FALLBACK_FACTOR_SCORE);
    }

    #[test]
    fn risk_score_is_convex_combination() {
        let r = RiskScorer::default().score(&snapshot(27.0, -3.0, 0.3, 0.1, 4.2, 4.4));
        let c = r.component_scores;
        let lo = [c.cpi, c.unemployment, c.vix, c.yield_curve]
            .into_iter()
            .fold(f64::INFINITY, f64::min);
        let hi = [c.cpi, c.unemployment, c.vix, c.yield_curve]
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(r.risk_score >= lo - 1e-12 && r.risk_score <= hi + 1e-12);
    }
}
