// =============================================================================
// Surge Detector — trade value spiking above its one-year baseline
// =============================================================================
//
//   avg_tv   = mean(trade_value over the trailing avg_period_days)
//   ratio_1d = latest trade_value / avg_tv
//   ratio_5d = mean(trade_value over the trailing recent_window_days) / avg_tv
//
// A surge fires when ratio_1d >= surge_multiplier AND the ticker clears the
// market-cap floor.  The cap is supplied by the caller; an unknown cap does
// not filter the ticker out.

use tracing::trace;

use crate::detectors::TrendFlag;
use crate::indicators::tail_mean;
use crate::runtime_config::SurgeParams;
use crate::types::PriceSeries;

/// Raw surge ratios before the multiplier and market-cap gates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurgeMeasurement {
    pub ratio_1d: f64,
    pub ratio_5d: f64,
    pub latest_trade_value: f64,
    pub avg_trade_value: f64,
}

pub struct SurgeDetector {
    params: SurgeParams,
}

impl SurgeDetector {
    pub fn new(params: SurgeParams) -> Self {
        Self { params }
    }

    /// Compute the surge ratios.
    ///
    /// Returns `None` when the series is shorter than `avg_period_days`, or
    /// the baseline average is zero or not finite.
    pub fn measure(&self, series: &PriceSeries) -> Option<SurgeMeasurement> {
        if series.len() < self.params.avg_period_days {
            trace!(
                ticker = %series.ticker,
                len = series.len(),
                min = self.params.avg_period_days,
                "surge: insufficient history"
            );
            return None;
        }

        let tv = series.trade_values();
        let avg_trade_value = tail_mean(&tv, self.params.avg_period_days)?;
        if avg_trade_value == 0.0 {
            return None;
        }

        let latest_trade_value = *tv.last()?;
        let recent_mean = tail_mean(&tv, self.params.recent_window_days)?;

        let ratio_1d = latest_trade_value / avg_trade_value;
        let ratio_5d = recent_mean / avg_trade_value;
        if !ratio_1d.is_finite() || !ratio_5d.is_finite() {
            return None;
        }

        Some(SurgeMeasurement {
            ratio_1d,
            ratio_5d,
            latest_trade_value,
            avg_trade_value,
        })
    }

    /// Whether the ratio gate passes, i.e. whether a market-cap lookup is
    /// worth making.
    pub fn ratio_passes(&self, m: &SurgeMeasurement) -> bool {
        m.ratio_1d >= self.params.surge_multiplier
    }

    /// Apply the multiplier and market-cap gates to a measurement.
    pub fn evaluate(&self, m: &SurgeMeasurement, market_cap_b: Option<f64>) -> TrendFlag {
        if !self.ratio_passes(m) {
            return TrendFlag::NoSignal;
        }
        if let Some(cap) = market_cap_b {
            if cap < self.params.min_market_cap_b {
                trace!(cap, min = self.params.min_market_cap_b, "surge: below market-cap floor");
                return TrendFlag::NoSignal;
            }
        }

        TrendFlag::Surge {
            ratio_1d: m.ratio_1d,
            ratio_5d: m.ratio_5d,
            latest_trade_value: m.latest_trade_value,
            avg_trade_value: m.avg_trade_value,
            market_cap_b,
        }
    }
}

impl Default for SurgeDetector {
    fn default() -> Self {
        Self::new(SurgeParams::default())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::series_with_trade_values;

    fn detect(d: &SurgeDetector, series: &PriceSeries, market_cap_b: Option<f64>) -> TrendFlag {
        d.measure(series)
            .map_or(TrendFlag::NoSignal, |m| d.evaluate(&m, market_cap_b))
    }

    /// 252 bars: 247 at 1.0, then five at `x` chosen so that
    /// mean(last 5) == k · mean(all 252).
    fn series_with_ratio(k: f64) -> PriceSeries {
        let x = 247.0 * k / (252.0 - 5.0 * k);
        let mut tv = vec![1.0e6; 247];
        tv.extend(std::iter::repeat(x * 1.0e6).take(5));
        series_with_trade_values("SURGE", &tv)
    }

    #[test]
    fn ratio_5d_matches_constructed_multiple() {
        let d = SurgeDetector::default();
        let m = d.measure(&series_with_ratio(4.0)).unwrap();
        assert!((m.ratio_5d - 4.0).abs() < 1e-9, "ratio_5d = {}", m.ratio_5d);
        // Flat tail: the latest bar carries the same ratio.
        assert!((m.ratio_1d - 4.0).abs() < 1e-9);
    }

    #[test]
    fn surge_iff_ratio_1d_clears_multiplier() {
        let d = SurgeDetector::default();
        for k in [1.0, 2.5, 2.99, 3.0, 4.0, 8.0] {
            let series = series_with_ratio(k);
            let m = d.measure(&series).unwrap();
            let flag = detect(&d, &series, Some(50.0));
            assert_eq!(flag.is_signal(), m.ratio_1d >= 3.0, "k = {k}");
        }
    }

    #[test]
    fn market_cap_floor_filters_small_caps() {
        let d = SurgeDetector::default();
        let series = series_with_ratio(5.0);
        assert_eq!(detect(&d, &series, Some(2.0)), TrendFlag::NoSignal);
        assert!(detect(&d, &series, Some(5.0)).is_signal());
        // Unknown cap is not a reason to drop the ticker.
        match detect(&d, &series, None) {
            TrendFlag::Surge { market_cap_b, .. } => assert!(market_cap_b.is_none()),
            other => panic!("expected surge, got {other:?}"),
        }
    }

    #[test]
    fn short_series_is_no_signal() {
        let d = SurgeDetector::default();
        let series = series_with_trade_values("SHORT", &vec![1.0; 251]);
        assert!(d.measure(&series).is_none());
        assert_eq!(detect(&d, &series, Some(100.0)), TrendFlag::NoSignal);
    }

    #[test]
    fn zero_or_nan_baseline_is_no_signal() {
        let d = SurgeDetector::default();
        let zeros = series_with_trade_values("ZERO", &vec![0.0; 300]);
        assert_eq!(detect(&d, &zeros, None), TrendFlag::NoSignal);

        let mut tv = vec![1.0; 300];
        tv[200] = f64::NAN;
        let nan = series_with_trade_values("NAN", &tv);
        assert_eq!(detect(&d, &nan, None), TrendFlag::NoSignal);
    }

    #[test]
    fn flat_history_has_unit_ratios() {
        let d = SurgeDetector::default();
        let m = d.measure(&series_with_trade_values("FLAT", &vec![7.0; 400])).unwrap();
        assert!((m.ratio_1d - 1.0).abs() < 1e-12);
        assert!((m.ratio_5d - 1.0).abs() < 1e-12);
        assert!(!d.ratio_passes(&m));
    }
}
