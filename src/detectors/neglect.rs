// =============================================================================
// Neglect Trend Detector — persistent decline in trade value
// =============================================================================
//
// Takes the trailing `slope_window_days` trade values, normalises them by the
// first value of the window (so the window starts at 1.0), and fits an OLS
// line against the day index.  A slope below `slope_threshold` flags the
// ticker; below twice the threshold it is DEEP_NEGLECT.

use tracing::trace;

use crate::detectors::{NeglectSeverity, TrendFlag};
use crate::indicators::{linear_fit, tail};
use crate::runtime_config::NeglectParams;
use crate::types::PriceSeries;

pub struct NeglectTrendDetector {
    params: NeglectParams,
}

impl NeglectTrendDetector {
    pub fn new(params: NeglectParams) -> Self {
        Self { params }
    }

    pub fn detect(&self, series: &PriceSeries) -> TrendFlag {
        self.evaluate(series).unwrap_or(TrendFlag::NoSignal)
    }

    fn evaluate(&self, series: &PriceSeries) -> Option<TrendFlag> {
        let p = &self.params;
        let tv = series.trade_values();
        let window = tail(&tv, p.slope_window_days)?;

        let first = window[0];
        if first == 0.0 || !first.is_finite() {
            return None;
        }
        let normalized: Vec<f64> = window.iter().map(|v| v / first).collect();

        let fit = linear_fit(&normalized)?;
        if fit.slope >= p.slope_threshold {
            return None;
        }

        let current_tv = *window.last()?;
        let tv_change_pct = (current_tv / first - 1.0) * 100.0;
        let severity = if fit.slope < p.slope_threshold * 2.0 {
            NeglectSeverity::DeepNeglect
        } else {
            NeglectSeverity::Neglected
        };

        trace!(
            ticker = %series.ticker,
            slope = format!("{:.5}", fit.slope),
            severity = %severity,
            "neglect flagged"
        );

        Some(TrendFlag::Neglected {
            slope: fit.slope,
            r_squared: fit.r_squared,
            tv_change_pct,
            current_tv,
            severity,
        })
    }
}

impl Default for NeglectTrendDetector {
    fn default() -> Self {
        Self::new(NeglectParams::default())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::series_with_trade_values;

    fn detector(window: usize) -> NeglectTrendDetector {
        NeglectTrendDetector::new(NeglectParams {
            slope_window_days: window,
            slope_threshold: -0.02,
        })
    }

    /// History padded with noise-free bars, ending in a linear window
    /// `base · (1 - step·i)`.
    fn declining(window: usize, step: f64) -> PriceSeries {
        let mut tv = vec![9.9e6; 100];
        tv.extend((0..window).map(|i| 5.0e6 * (1.0 - step * i as f64)));
        series_with_trade_values("DECL", &tv)
    }

    #[test]
    fn steady_decline_is_neglected() {
        match detector(20).detect(&declining(20, 0.03)) {
            TrendFlag::Neglected {
                slope,
                r_squared,
                tv_change_pct,
                severity,
                ..
            } => {
                assert!((slope + 0.03).abs() < 1e-9);
                assert!((r_squared - 1.0).abs() < 1e-9);
                assert!((tv_change_pct + 57.0).abs() < 1e-6);
                assert_eq!(severity, NeglectSeverity::Neglected);
            }
            other => panic!("expected neglect, got {other:?}"),
        }
    }

    #[test]
    fn steep_decline_is_deep_neglect() {
        match detector(20).detect(&declining(20, 0.045)) {
            TrendFlag::Neglected { severity, .. } => {
                assert_eq!(severity, NeglectSeverity::DeepNeglect)
            }
            other => panic!("expected deep neglect, got {other:?}"),
        }
    }

    #[test]
    fn gentle_decline_is_no_signal() {
        // -0.015 per day over the default 60-day window stays above -0.02.
        let d = NeglectTrendDetector::default();
        assert_eq!(d.detect(&declining(60, 0.015)), TrendFlag::NoSignal);
    }

    #[test]
    fn zero_first_value_is_no_signal() {
        let mut tv = vec![0.0];
        tv.extend((1..20).map(|i| 10.0 - i as f64 * 0.4));
        let series = series_with_trade_values("ZERO", &tv);
        assert_eq!(detector(20).detect(&series), TrendFlag::NoSignal);
    }

    #[test]
    fn short_series_is_no_signal() {
        let series = series_with_trade_values("SHORT", &[5.0, 4.0, 3.0]);
        assert_eq!(NeglectTrendDetector::default().detect(&series), TrendFlag::NoSignal);
    }
}
