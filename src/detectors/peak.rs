// =============================================================================
// Peak Warning Detector — near-high price with a trade-value dead cross
// =============================================================================
//
// Fires when both hold:
//   1. current_close >= high_52w * high_threshold
//   2. tv_ma_short < tv_ma_long   (participation fading into the high)
//
// Severity: HIGH_RISK when tv_ma_short / tv_ma_long < high_risk_ratio,
// otherwise CAUTION.

use tracing::trace;

use crate::detectors::{PeakSeverity, TrendFlag};
use crate::indicators::{tail_max, tail_mean};
use crate::runtime_config::PeakParams;
use crate::types::PriceSeries;

pub struct PeakWarningDetector {
    params: PeakParams,
}

impl PeakWarningDetector {
    pub fn new(params: PeakParams) -> Self {
        Self { params }
    }

    /// Evaluate one ticker. Any missing-data condition yields `NoSignal`.
    pub fn detect(&self, series: &PriceSeries) -> TrendFlag {
        self.evaluate(series).unwrap_or(TrendFlag::NoSignal)
    }

    fn evaluate(&self, series: &PriceSeries) -> Option<TrendFlag> {
        let p = &self.params;
        if series.len() < p.lookback_days {
            trace!(
                ticker = %series.ticker,
                len = series.len(),
                min = p.lookback_days,
                "peak: insufficient history"
            );
            return None;
        }

        let closes = series.closes();
        let current_price = *closes.last()?;
        let high_52w = tail_max(&closes, p.lookback_days)?;
        if !current_price.is_finite() || high_52w <= 0.0 {
            return None;
        }
        if current_price < high_52w * p.high_threshold {
            return None;
        }

        let tv = series.trade_values();
        let tv_ma_short = tail_mean(&tv, p.ma_short)?;
        let tv_ma_long = tail_mean(&tv, p.ma_long)?;
        if tv_ma_long == 0.0 || tv_ma_short >= tv_ma_long {
            return None;
        }

        let tv_ratio = tv_ma_short / tv_ma_long;
        let severity = if tv_ratio < p.high_risk_ratio {
            PeakSeverity::HighRisk
        } else {
            PeakSeverity::Caution
        };

        trace!(
            ticker = %series.ticker,
            tv_ratio = format!("{:.3}", tv_ratio),
            severity = %severity,
            "peak warning"
        );

        Some(TrendFlag::PeakWarning {
            current_price,
            high_52w,
            pct_of_high: current_price / high_52w * 100.0,
            tv_ma_short,
            tv_ma_long,
            tv_ratio,
            severity,
        })
    }
}

impl Default for PeakWarningDetector {
    fn default() -> Self {
        Self::new(PeakParams::default())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::series_from;

    /// 260 bars with a steady climb (last close is the 52-week high) and the
    /// final 20 volumes scaled by `tail_volume_factor`.
    fn climbing(tail_volume_factor: f64) -> PriceSeries {
        let closes: Vec<f64> = (0..260).map(|i| 100.0 + 0.1 * i as f64).collect();
        let mut volumes = vec![1_000_000.0; 260];
        for v in volumes.iter_mut().skip(240) {
            *v *= tail_volume_factor;
        }
        series_from("PEAK", &closes, &volumes)
    }

    #[test]
    fn fading_volume_at_high_is_high_risk() {
        let d = PeakWarningDetector::default();
        match d.detect(&climbing(0.5)) {
            TrendFlag::PeakWarning {
                tv_ratio,
                severity,
                pct_of_high,
                ..
            } => {
                assert!(tv_ratio < 0.7);
                assert_eq!(severity, PeakSeverity::HighRisk);
                assert!((pct_of_high - 100.0).abs() < 1e-9);
            }
            other => panic!("expected peak warning, got {other:?}"),
        }
    }

    #[test]
    fn mild_fade_is_caution() {
        let d = PeakWarningDetector::default();
        match d.detect(&climbing(0.9)) {
            TrendFlag::PeakWarning { tv_ratio, severity, .. } => {
                assert!((0.7..1.0).contains(&tv_ratio));
                assert_eq!(severity, PeakSeverity::Caution);
            }
            other => panic!("expected peak warning, got {other:?}"),
        }
    }

    #[test]
    fn rising_participation_is_no_signal_even_at_high() {
        let d = PeakWarningDetector::default();
        assert_eq!(d.detect(&climbing(1.2)), TrendFlag::NoSignal);
        // Equal averages are not a dead cross either.
        let flat = series_from("FLAT", &[50.0; 260], &[1000.0; 260]);
        assert_eq!(d.detect(&flat), TrendFlag::NoSignal);
    }

    #[test]
    fn price_far_below_high_is_no_signal() {
        let d = PeakWarningDetector::default();
        let mut series = climbing(0.5);
        if let Some(last) = series.bars.last_mut() {
            last.close = 50.0;
        }
        assert_eq!(d.detect(&series), TrendFlag::NoSignal);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let d = PeakWarningDetector::default();
        let mut closes = vec![100.0; 260];
        closes[100] = 200.0;
        closes[259] = 190.0; // exactly 95 % of the high
        let mut volumes = vec![1000.0; 260];
        for v in volumes.iter_mut().skip(240) {
            *v = 100.0;
        }
        let series = series_from("EDGE", &closes, &volumes);
        assert!(d.detect(&series).is_signal());
    }

    #[test]
    fn short_series_is_no_signal() {
        let d = PeakWarningDetector::default();
        let series = series_from("SHORT", &vec![10.0; 100], &vec![1.0; 100]);
        assert_eq!(d.detect(&series), TrendFlag::NoSignal);
    }
}
