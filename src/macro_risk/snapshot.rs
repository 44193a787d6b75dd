// =============================================================================
// Macro Snapshot — a single atomic read of the macro environment
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indicator keys the risk scorer reads.
pub const CPI: &str = "cpi";
pub const UNEMPLOYMENT: &str = "unemployment";
pub const YIELD_10Y: &str = "yield_10y";
pub const YIELD_2Y: &str = "yield_2y";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VixReading {
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub ma20: Option<f64>,
}

impl VixReading {
    /// "rising" when the spot level sits above its 20-day mean.
    pub fn is_rising(&self) -> Option<bool> {
        Some(finite(self.current)? > finite(self.ma20)?)
    }
}

/// Broad equity index state (S&P 500 by convention).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReading {
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub high_52w: Option<f64>,
    /// Percent below the 52-week high (negative or zero).
    #[serde(default)]
    pub drawdown_pct: Option<f64>,
}

impl IndexReading {
    /// Reported drawdown, or one derived from `current` and `high_52w`.
    pub fn drawdown(&self) -> Option<f64> {
        if let Some(d) = finite(self.drawdown_pct) {
            return Some(d);
        }
        let current = finite(self.current)?;
        let high = finite(self.high_52w)?;
        (high > 0.0).then(|| (current / high - 1.0) * 100.0)
    }
}

/// Latest two observations of an economic series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorReading {
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub previous: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
}

impl IndicatorReading {
    /// Reported change, or `current - previous` when both legs exist.
    pub fn change(&self) -> Option<f64> {
        finite(self.change).or_else(|| Some(finite(self.current)? - finite(self.previous)?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroSnapshot {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vix: VixReading,
    #[serde(default, alias = "sp500")]
    pub index: IndexReading,
    #[serde(default, alias = "fred")]
    pub indicators: BTreeMap<String, IndicatorReading>,
}

impl MacroSnapshot {
    pub fn vix_current(&self) -> Option<f64> {
        finite(self.vix.current)
    }

    pub fn indicator_change(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).and_then(IndicatorReading::change)
    }

    pub fn indicator_current(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).and_then(|r| finite(r.current))
    }

    pub fn drawdown_pct(&self) -> Option<f64> {
        self.index.drawdown()
    }
}

/// NaN and infinities count as missing.
pub(crate) fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}
