// =============================================================================
// Trend-Series Utilities
// =============================================================================
//
// Pure, side-effect-free helpers shared by the trend detectors and the hedge
// allocator.  Every public function returns `Option<T>` so callers are forced
// to handle insufficient-data and numerical-edge-case scenarios.

pub mod moving_average;
pub mod regression;
pub mod returns;

pub use moving_average::{tail, tail_max, tail_mean};
pub use regression::linear_fit;
pub use returns::{pct_returns, sample_std, total_return_pct};
