// =============================================================================
// Ordinary Least Squares — y against day index 0..N-1
// =============================================================================
//
//   slope     = Σ((x-x̄)(y-ȳ)) / Σ((x-x̄)²)
//   intercept = ȳ - slope·x̄
//   r²        = (Σ((x-x̄)(y-ȳ)))² / (Σ((x-x̄)²) · Σ((y-ȳ)²))
//
// Computed on centred values, which keeps the sums well-conditioned for the
// 60-point normalised series the neglect scanner feeds in.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Result of a simple linear regression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination in [0, 1]. A perfectly flat `y` has no
    /// variance to explain and reports 0.
    pub r_squared: f64,
}

/// Fit `y = intercept + slope·x` with `x = 0, 1, …, len-1`.
///
/// Returns `None` for fewer than two points or any non-finite input.
pub fn linear_fit(y: &[f64]) -> Option<LinearFit> {
    let n = y.len();
    if n < 2 || y.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = y.iter().sum::<f64>() / nf;

    let mut sxy = 0.0_f64;
    let mut sxx = 0.0_f64;
    let mut syy = 0.0_f64;
    for (i, &yi) in y.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = yi - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    // sxx > 0 whenever n >= 2.
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r_squared = if syy < f64::EPSILON {
        0.0
    } else {
        ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0)
    };

    trace!(
        points = n,
        slope = format!("{:.5}", slope),
        r_squared = format!("{:.3}", r_squared),
        "linear fit"
    );

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}
