// =============================================================================
// Returns & Volatility
// =============================================================================
//
// Simple percentage returns and sample standard deviation, used to rank
// defensive tickers by risk-adjusted momentum.

/// Day-over-day fractional returns `close_t / close_{t-1} - 1`.
///
/// Pairs whose previous close is zero or non-finite are skipped, so the output
/// may be shorter than `closes.len() - 1`.
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter_map(|w| {
            let (prev, cur) = (w[0], w[1]);
            if prev == 0.0 || !prev.is_finite() || !cur.is_finite() {
                None
            } else {
                Some(cur / prev - 1.0)
            }
        })
        .collect()
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns `None` for fewer than two observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    std.is_finite().then_some(std)
}

/// Percentage change from the first to the last close: `(last/first - 1)·100`.
pub fn total_return_pct(closes: &[f64]) -> Option<f64> {
    let first = *closes.first()?;
    let last = *closes.last()?;
    if first == 0.0 {
        return None;
    }
    let pct = (last / first - 1.0) * 100.0;
    pct.is_finite().then_some(pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_basic() {
        let r = pct_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn zero_close_is_skipped() {
        assert_eq!(pct_returns(&[0.0, 1.0, 2.0]).len(), 1);
    }

    #[test]
    fn sample_std_matches_hand_calc() {
        // mean 5, squared deviations sum 32, n-1 = 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = sample_std(&v).unwrap();
        assert!((s - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn total_return() {
        assert!((total_return_pct(&[50.0, 60.0, 75.0]).unwrap() - 50.0).abs() < 1e-12);
        assert!(total_return_pct(&[0.0, 1.0]).is_none());
        assert!(total_return_pct(&[]).is_none());
    }
}
