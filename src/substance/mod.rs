// =============================================================================
// Substance — qualitative evidence from earnings calls and filings
// =============================================================================
//
// Analyses are produced elsewhere (fixture files or a language model behind
// `TextAnalyzer`); this module only parses them leniently and fuses the two
// per-ticker records into one substance score with a verdict.

pub mod analysis;
pub mod analyzer;
pub mod fuser;

pub use analysis::{AnalysisRecord, SourceKind};
pub use analyzer::TextAnalyzer;
pub use fuser::{merge, SubstanceScore};
