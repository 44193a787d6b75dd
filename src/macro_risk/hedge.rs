// =============================================================================
// Hedge Allocator — defensive sector split when defense mode is on
// =============================================================================
//
// defense_ratio = max(base, min(base + (risk - 0.7) · 0.5, 0.5))
//
// Sector weights start from a fixed split and tilt on stress:
//   VIX > 30          gold +0.10, agricultural -0.05, utilities -0.05
//   drawdown < -10%   staples +0.10, gold -0.05, agricultural -0.05
// then renormalize to sum 1.
//
// Within each sector, tickers rank by risk-adjusted momentum:
//   momentum = return over the lookback (%) / max(daily volatility (%), 0.1)
// Tickers without enough history get `None` and sort last.
// =============================================================================

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::indicators::{pct_returns, sample_std, tail, total_return_pct};
use crate::macro_risk::scorer::RiskScore;
use crate::runtime_config::HedgeParams;
use crate::types::PriceSeries;

const RATIO_RISK_PIVOT: f64 = 0.7;
const RATIO_SLOPE: f64 = 0.5;
const MAX_DEFENSE_RATIO: f64 = 0.5;

const VIX_TILT_ABOVE: f64 = 30.0;
const DRAWDOWN_TILT_BELOW: f64 = -10.0;
const TILT_GAIN: f64 = 0.10;
const TILT_GIVE: f64 = 0.05;

/// Used for the tilts only when the risk record has no reading.
const NEUTRAL_VIX: f64 = 20.0;
const NEUTRAL_DRAWDOWN: f64 = 0.0;

const MIN_VOLATILITY_PCT: f64 = 0.1;

// ---------------------------------------------------------------------------
// Sectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseSector {
    ConsumerStaples,
    Utilities,
    Gold,
    Agricultural,
}

impl DefenseSector {
    pub const ALL: [DefenseSector; 4] = [
        Self::ConsumerStaples,
        Self::Utilities,
        Self::Gold,
        Self::Agricultural,
    ];

    fn base_weight(self) -> f64 {
        match self {
            Self::ConsumerStaples => 0.30,
            Self::Utilities => 0.25,
            Self::Gold => 0.25,
            Self::Agricultural => 0.20,
        }
    }
}

impl std::fmt::Display for DefenseSector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsumerStaples => write!(f, "consumer_staples"),
            Self::Utilities => write!(f, "utilities"),
            Self::Gold => write!(f, "gold"),
            Self::Agricultural => write!(f, "agricultural"),
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefenseCandidate {
    pub ticker: String,
    pub returns_3m: Option<f64>,
    pub volatility_20d: Option<f64>,
    pub momentum: Option<f64>,
}

impl DefenseCandidate {
    fn unscored(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            returns_3m: None,
            volatility_20d: None,
            momentum: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorAllocation {
    pub weight: f64,
    /// Ranked best momentum first.
    pub tickers: Vec<DefenseCandidate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HedgeAllocation {
    pub defense_mode: bool,
    pub defense_ratio: f64,
    pub risk_score: f64,
    pub reasons: Vec<String>,
    pub sectors: BTreeMap<DefenseSector, SectorAllocation>,
}

impl HedgeAllocation {
    pub fn inactive(risk_score: f64) -> Self {
        Self {
            risk_score,
            ..Default::default()
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.sectors.values().map(|s| s.weight).sum()
    }
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

pub struct HedgeAllocator {
    params: HedgeParams,
}

impl HedgeAllocator {
    pub fn new(params: HedgeParams) -> Self {
        Self { params }
    }

    /// Every configured defensive ticker, in sector order.  The pipeline
    /// fetches these histories before calling [`allocate`](Self::allocate).
    pub fn defense_tickers(&self) -> Vec<String> {
        self.params
            .defense_tickers
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Build the allocation for one run.  Tickers missing from `histories`
    /// are listed with `momentum: None`.
    pub fn allocate(
        &self,
        risk: &RiskScore,
        histories: &HashMap<String, PriceSeries>,
    ) -> HedgeAllocation {
        if !risk.defense_mode {
            debug!("defense mode off, no hedge allocation");
            return HedgeAllocation::inactive(risk.risk_score);
        }

        let defense_ratio = self.defense_ratio(risk.risk_score);
        let weights = sector_weights(
            risk.vix_current.unwrap_or(NEUTRAL_VIX),
            risk.index_drawdown_pct.unwrap_or(NEUTRAL_DRAWDOWN),
        );

        let sectors = weights
            .into_iter()
            .map(|(sector, weight)| {
                let tickers = self
                    .params
                    .defense_tickers
                    .get(&sector)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let mut ranked: Vec<DefenseCandidate> = tickers
                    .iter()
                    .map(|t| match histories.get(t) {
                        Some(series) => self.score_candidate(t, series),
                        None => DefenseCandidate::unscored(t),
                    })
                    .collect();
                rank_by_momentum(&mut ranked);
                (sector, SectorAllocation { weight, tickers: ranked })
            })
            .collect();

        let allocation = HedgeAllocation {
            defense_mode: true,
            defense_ratio,
            risk_score: risk.risk_score,
            reasons: risk.reasons.clone(),
            sectors,
        };
        info!(
            defense_ratio = format!("{:.3}", defense_ratio),
            risk_score = format!("{:.3}", risk.risk_score),
            sector_weight = format!("{:.3}", allocation.total_weight()),
            "hedge allocation built"
        );
        allocation
    }

    /// Share of the portfolio moved into defensive names, in
    /// `[defense_rebalance_ratio, 0.5]`.
    pub fn defense_ratio(&self, risk_score: f64) -> f64 {
        let base = self.params.defense_rebalance_ratio;
        (base + (risk_score - RATIO_RISK_PIVOT) * RATIO_SLOPE)
            .min(MAX_DEFENSE_RATIO)
            .max(base)
    }

    /// Momentum stats over the last `momentum_lookback_days` closes.
    pub fn score_candidate(&self, ticker: &str, series: &PriceSeries) -> DefenseCandidate {
        let closes = series.closes();
        let window = tail(&closes, self.params.momentum_lookback_days).unwrap_or(closes.as_slice());
        if window.len() < self.params.volatility_window_days {
            return DefenseCandidate::unscored(ticker);
        }

        let Some(returns_3m) = total_return_pct(window) else {
            return DefenseCandidate::unscored(ticker);
        };
        let daily = pct_returns(window);
        let recent = tail(&daily, self.params.volatility_window_days).unwrap_or(daily.as_slice());
        let volatility = sample_std(recent).map(|s| s * 100.0);
        let momentum = volatility.map(|v| returns_3m / v.max(MIN_VOLATILITY_PCT));

        DefenseCandidate {
            ticker: ticker.to_string(),
            returns_3m: Some(returns_3m),
            volatility_20d: volatility,
            momentum,
        }
    }
}

impl Default for HedgeAllocator {
    fn default() -> Self {
        Self::new(HedgeParams::default())
    }
}

/// Base split tilted for VIX and drawdown stress, renormalized to sum 1.
pub fn sector_weights(vix: f64, drawdown_pct: f64) -> BTreeMap<DefenseSector, f64> {
    let mut w: BTreeMap<DefenseSector, f64> = DefenseSector::ALL
        .iter()
        .map(|&s| (s, s.base_weight()))
        .collect();

    let mut shift = |sector: DefenseSector, delta: f64| {
        if let Some(v) = w.get_mut(&sector) {
            *v += delta;
        }
    };

    if vix > VIX_TILT_ABOVE {
        shift(DefenseSector::Gold, TILT_GAIN);
        shift(DefenseSector::Agricultural, -TILT_GIVE);
        shift(DefenseSector::Utilities, -TILT_GIVE);
    }
    if drawdown_pct < DRAWDOWN_TILT_BELOW {
        shift(DefenseSector::ConsumerStaples, TILT_GAIN);
        shift(DefenseSector::Gold, -TILT_GIVE);
        shift(DefenseSector::Agricultural, -TILT_GIVE);
    }

    let total: f64 = w.values().sum();
    if total > 0.0 {
        w.values_mut().for_each(|v| *v /= total);
    }
    w
}

/// Descending momentum; `None` sorts last, ties keep input order.
fn rank_by_momentum(candidates: &mut [DefenseCandidate]) {
    candidates.sort_by(|a, b| match (a.momentum, b.momentum) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_risk::scorer::ComponentScores;
    use crate::types::test_support::series_from;

    fn risk(score: f64, defense: bool, vix: Option<f64>, dd: Option<f64>) -> RiskScore {
        RiskScore {
            risk_score: score,
            component_scores: ComponentScores {
                cpi: score,
                unemployment: score,
                vix: score,
                yield_curve: score,
            },
            defense_mode: defense,
            reasons: if defense { vec!["test".into()] } else { vec![] },
            triggers: vec![],
            vix_current: vix,
            index_drawdown_pct: dd,
        }
    }

    fn geometric(ticker: &str, n: usize, daily: f64) -> PriceSeries {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * (1.0 + daily).powi(i as i32)).collect();
        series_from(ticker, &closes, &vec![1_000.0; n])
    }

    #[test]
    fn inactive_when_defense_off() {
        let a = HedgeAllocator::default().allocate(&risk(0.4, false, Some(18.0), None), &HashMap::new());
        assert!(!a.defense_mode);
        assert_eq!(a.defense_ratio, 0.0);
        assert!(a.sectors.is_empty());
    }

    #[test]
    fn weights_sum_to_one_under_every_tilt() {
        let alloc = HedgeAllocator::default();
        for (vix, dd) in [(20.0, 0.0), (35.0, 0.0), (20.0, -15.0), (45.0, -25.0)] {
            let a = alloc.allocate(&risk(0.8, true, Some(vix), Some(dd)), &HashMap::new());
            assert_eq!(a.sectors.len(), 4);
            assert!((a.total_weight() - 1.0).abs() < 1e-2, "vix {vix} dd {dd}");
        }
    }

    #[test]
    fn vix_tilt_favours_gold() {
        let w = sector_weights(35.0, 0.0);
        assert!((w[&DefenseSector::Gold] - 0.35).abs() < 1e-9);
        assert!((w[&DefenseSector::Utilities] - 0.20).abs() < 1e-9);
        assert!((w[&DefenseSector::Agricultural] - 0.15).abs() < 1e-9);
    }

    #[test]
    fn drawdown_tilt_favours_staples() {
        let w = sector_weights(20.0, -12.0);
        assert!((w[&DefenseSector::ConsumerStaples] - 0.40).abs() < 1e-9);
        assert!((w[&DefenseSector::Gold] - 0.20).abs() < 1e-9);
        assert!((w[&DefenseSector::Agricultural] - 0.15).abs() < 1e-9);
    }

    #[test]
    fn defense_ratio_bounds() {
        let alloc = HedgeAllocator::default();
        assert!((alloc.defense_ratio(0.5) - 0.3).abs() < 1e-12);
        assert!((alloc.defense_ratio(0.8) - 0.35).abs() < 1e-12);
        assert!((alloc.defense_ratio(1.0) - 0.45).abs() < 1e-12);
        for step in 0..=20 {
            let r = alloc.defense_ratio(step as f64 / 20.0);
            assert!((0.3..=0.5).contains(&r));
        }
    }

    #[test]
    fn missing_tilt_inputs_use_neutral_split() {
        let a = HedgeAllocator::default().allocate(&risk(0.75, true, None, None), &HashMap::new());
        let w = &a.sectors[&DefenseSector::ConsumerStaples];
        assert!((w.weight - 0.30).abs() < 1e-9);
    }

    #[test]
    fn candidates_rank_by_momentum_with_unscored_last() {
        let mut params = HedgeParams::default();
        params.defense_tickers = BTreeMap::from([(
            DefenseSector::Gold,
            vec!["SHORT".into(), "FLAT".into(), "UP".into(), "DOWN".into(), "NONE".into()],
        )]);
        let alloc = HedgeAllocator::new(params);

        let histories: HashMap<String, PriceSeries> = [
            geometric("UP", 80, 0.01),
            geometric("FLAT", 80, 0.0),
            geometric("DOWN", 80, -0.01),
            geometric("SHORT", 10, 0.02),
        ]
        .into_iter()
        .map(|s| (s.ticker.clone(), s))
        .collect();

        let a = alloc.allocate(&risk(0.8, true, Some(22.0), Some(-3.0)), &histories);
        let ranked: Vec<&str> = a.sectors[&DefenseSector::Gold]
            .tickers
            .iter()
            .map(|c| c.ticker.as_str())
            .collect();
        assert_eq!(ranked, vec!["UP", "FLAT", "DOWN", "SHORT", "NONE"]);
        assert!(a.sectors[&DefenseSector::Gold].tickers[3].momentum.is_none());
    }

    #[test]
    fn momentum_uses_volatility_floor() {
        // Constant daily growth has zero volatility; the 0.1% floor applies.
        let c = HedgeAllocator::default().score_candidate("UP", &geometric("UP", 63, 0.01));
        let ret = c.returns_3m.unwrap();
        assert!(c.volatility_20d.unwrap() < 1e-6);
        assert!((c.momentum.unwrap() - ret / 0.1).abs() < 1e-6);
    }
}
