// =============================================================================
// Trailing-window means
// =============================================================================
//
// The detectors only ever need the *latest* value of a rolling statistic, so
// these helpers evaluate the final window directly instead of materialising
// the full rolling series.
//
// NaN semantics follow a strict rolling mean: a single NaN anywhere inside the
// window poisons the result and the helper returns `None`.

/// The trailing `window` values of `values`, or `None` when the slice is
/// shorter than the window or the window is zero.
pub fn tail(values: &[f64], window: usize) -> Option<&[f64]> {
    if window == 0 || values.len() < window {
        return None;
    }
    Some(&values[values.len() - window..])
}

/// Mean of the trailing `window` values.
///
/// Returns `None` when the window cannot be filled or the mean is not finite.
pub fn tail_mean(values: &[f64], window: usize) -> Option<f64> {
    let slice = tail(values, window)?;
    let mean = slice.iter().sum::<f64>() / window as f64;
    mean.is_finite().then_some(mean)
}

/// Maximum of the trailing `window` values; any non-finite value yields
/// `None`.
pub fn tail_max(values: &[f64], window: usize) -> Option<f64> {
    let slice = tail(values, window)?;
    if slice.iter().any(|v| !v.is_finite()) {
        return None;
    }
    slice.iter().copied().reduce(f64::max)
}
