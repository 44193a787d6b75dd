// =============================================================================
// Macro Risk Module
// =============================================================================
//
// - Snapshot:  one atomic read of VIX, index drawdown and economic indicators
// - Scorer:    four-factor composite risk score plus OR-of-triggers defense mode
// - Hedge:     risk-proportional defensive allocation across sectors

pub mod hedge;
pub mod scorer;
pub mod snapshot;

pub use hedge::{DefenseSector, HedgeAllocation, HedgeAllocator};
pub use scorer::{RiskScore, RiskScorer};
pub use snapshot::MacroSnapshot;
