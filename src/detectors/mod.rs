// =============================================================================
// Trend Detectors Module
// =============================================================================
//
// Three independent scans over a single ticker's daily history:
// - Surge:        trade value spiking far above its one-year baseline
// - PeakWarning:  price near the 52-week high while trade value dead-crosses
// - Neglect:      trade value in a persistent regression-measured decline
//
// Each detector is a pure function of (series, params) and returns an explicit
// `TrendFlag`, with `NoSignal` standing for "computed, nothing to report".

pub mod neglect;
pub mod peak;
pub mod surge;

use serde::{Deserialize, Serialize};

pub use neglect::NeglectTrendDetector;
pub use peak::PeakWarningDetector;
pub use surge::SurgeDetector;

// =============================================================================
// Flags
// =============================================================================

/// Severity of a peak warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeakSeverity {
    HighRisk,
    Caution,
}

/// Severity of a neglect flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeglectSeverity {
    DeepNeglect,
    Neglected,
}

impl std::fmt::Display for PeakSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighRisk => write!(f, "HIGH_RISK"),
            Self::Caution => write!(f, "CAUTION"),
        }
    }
}

impl std::fmt::Display for NeglectSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeepNeglect => write!(f, "DEEP_NEGLECT"),
            Self::Neglected => write!(f, "NEGLECTED"),
        }
    }
}

/// Output of a single detector for a single ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendFlag {
    NoSignal,
    Surge {
        ratio_1d: f64,
        ratio_5d: f64,
        latest_trade_value: f64,
        avg_trade_value: f64,
        /// Billions USD; `None` when the cap provider had no figure.
        market_cap_b: Option<f64>,
    },
    PeakWarning {
        current_price: f64,
        high_52w: f64,
        /// Current close as a percentage of the 52-week high.
        pct_of_high: f64,
        tv_ma_short: f64,
        tv_ma_long: f64,
        tv_ratio: f64,
        severity: PeakSeverity,
    },
    Neglected {
        slope: f64,
        r_squared: f64,
        tv_change_pct: f64,
        current_tv: f64,
        severity: NeglectSeverity,
    },
}

impl TrendFlag {
    pub fn is_signal(&self) -> bool {
        !matches!(self, Self::NoSignal)
    }

    pub fn scan_type(&self) -> Option<ScanType> {
        match self {
            Self::NoSignal => None,
            Self::Surge { .. } => Some(ScanType::Surge),
            Self::PeakWarning { .. } => Some(ScanType::PeakWarning),
            Self::Neglected { .. } => Some(ScanType::Neglected),
        }
    }

    /// The key each scan list is ordered by.
    fn sort_key(&self) -> f64 {
        match self {
            Self::NoSignal => 0.0,
            Self::Surge { ratio_5d, .. } => *ratio_5d,
            Self::PeakWarning { tv_ratio, .. } => *tv_ratio,
            Self::Neglected { slope, .. } => *slope,
        }
    }
}

// =============================================================================
// Scan records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Surge,
    PeakWarning,
    Neglected,
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Surge => write!(f, "surge"),
            Self::PeakWarning => write!(f, "peak_warning"),
            Self::Neglected => write!(f, "neglected"),
        }
    }
}

/// A fired flag tagged with its ticker and scan type, ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub ticker: String,
    pub scan_type: ScanType,
    pub flag: TrendFlag,
}

/// Per-scan-type result lists for one universe scan, each in its documented
/// order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanBatch {
    /// Descending by `ratio_5d`.
    pub surge: Vec<ScanRecord>,
    /// Ascending by `tv_ratio` (worst first).
    pub peak_warnings: Vec<ScanRecord>,
    /// Ascending by slope (most negative first).
    pub neglected: Vec<ScanRecord>,
}

impl ScanBatch {
    /// File a flag under its scan type. `NoSignal` is dropped.
    pub fn push(&mut self, ticker: impl Into<String>, flag: TrendFlag) {
        let Some(scan_type) = flag.scan_type() else {
            return;
        };
        let record = ScanRecord {
            ticker: ticker.into(),
            scan_type,
            flag,
        };
        match scan_type {
            ScanType::Surge => self.surge.push(record),
            ScanType::PeakWarning => self.peak_warnings.push(record),
            ScanType::Neglected => self.neglected.push(record),
        }
    }

    /// Apply the batch ordering of every list. Ties break on ticker so runs
    /// are reproducible regardless of fetch completion order.
    pub fn sort(&mut self) {
        let by_key = |a: &ScanRecord, b: &ScanRecord| {
            a.flag
                .sort_key()
                .total_cmp(&b.flag.sort_key())
                .then_with(|| a.ticker.cmp(&b.ticker))
        };
        self.surge.sort_by(|a, b| {
            b.flag
                .sort_key()
                .total_cmp(&a.flag.sort_key())
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        self.peak_warnings.sort_by(by_key);
        self.neglected.sort_by(by_key);
    }

    pub fn len(&self) -> usize {
        self.surge.len() + self.peak_warnings.len() + self.neglected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `ratio_5d` of a ticker's surge flag, if it has one.
    pub fn surge_ratio_5d(&self, ticker: &str) -> Option<f64> {
        self.surge.iter().find(|r| r.ticker == ticker).and_then(|r| match r.flag {
            TrendFlag::Surge { ratio_5d, .. } => Some(ratio_5d),
            _ => None,
        })
    }

    /// Every ticker carrying at least one flag.
    pub fn flagged_tickers(&self) -> impl Iterator<Item = &str> {
        self.surge
            .iter()
            .chain(&self.peak_warnings)
            .chain(&self.neglected)
            .map(|r| r.ticker.as_str())
    }
}
