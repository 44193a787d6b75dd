// =============================================================================
// Shared types used across the discovery engine
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily bar for a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    /// Close price times volume: dollar-denominated trading activity.
    pub fn trade_value(&self) -> f64 {
        self.close * self.volume
    }
}

/// Chronological daily history for one ticker (oldest first).
///
/// Gaps are not filled; detectors treat the bars as consecutive trading days.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    #[serde(default)]
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn trade_values(&self) -> Vec<f64> {
        self.bars.iter().map(PriceBar::trade_value).collect()
    }
}

/// Final categorical decision attached to every ranked pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    Avoid,
}

impl Signal {
    pub fn is_buy(self) -> bool {
        matches!(self, Self::StrongBuy | Self::Buy)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Self::Sell | Self::Avoid)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "STRONG_BUY"),
            Self::Buy => write!(f, "BUY"),
            Self::Hold => write!(f, "HOLD"),
            Self::Sell => write!(f, "SELL"),
            Self::Avoid => write!(f, "AVOID"),
        }
    }
}

/// Qualitative verdict derived from a fused substance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    StrongBuy,
    Buy,
    Hold,
    Caution,
    Avoid,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "STRONG_BUY"),
            Self::Buy => write!(f, "BUY"),
            Self::Hold => write!(f, "HOLD"),
            Self::Caution => write!(f, "CAUTION"),
            Self::Avoid => write!(f, "AVOID"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a series from parallel close/volume slices, one bar per day
    /// starting 2024-01-01.
    pub fn series_from(ticker: &str, closes: &[f64], volumes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                close,
                volume,
            })
            .collect();
        PriceSeries::new(ticker, bars)
    }

    /// Constant-price series whose trade values equal `trade_values` exactly.
    pub fn series_with_trade_values(ticker: &str, trade_values: &[f64]) -> PriceSeries {
        let closes = vec![1.0; trade_values.len()];
        series_from(ticker, &closes, trade_values)
    }
}
