// =============================================================================
// Collaborator contracts — everything the engine reads from the outside world
// =============================================================================
//
// The scoring core never performs I/O.  Prices, macro readings, market caps,
// qualitative analyses and the ticker universe all arrive through these
// traits so the pipeline can be driven by fixture files, a live backend, or
// in-memory fakes in tests.

pub mod fixture;
pub mod ollama;
pub mod universe;

use async_trait::async_trait;
use thiserror::Error;

use crate::macro_risk::MacroSnapshot;
use crate::substance::{AnalysisRecord, SourceKind};
use crate::types::PriceSeries;

pub use fixture::FixtureStore;
pub use ollama::OllamaClient;
pub use universe::StaticUniverse;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider has nothing for this key.  Not a failure.
    #[error("not available: {0}")]
    NotAvailable(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<PriceSeries, ProviderError>;
}

#[async_trait]
pub trait MacroDataProvider: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<MacroSnapshot, ProviderError>;
}

/// Market capitalization in billions of USD; `Ok(None)` when unknown.
#[async_trait]
pub trait MarketCapProvider: Send + Sync {
    async fn cap_of(&self, ticker: &str) -> Result<Option<f64>, ProviderError>;
}

/// Qualitative analysis of one disclosure.  `NotAvailable` means the ticker
/// has no such disclosure on record.
#[async_trait]
pub trait SubstanceProvider: Send + Sync {
    async fn analyze(&self, ticker: &str, source: SourceKind)
        -> Result<AnalysisRecord, ProviderError>;
}

/// Raw disclosure text (earnings transcript, filing excerpt).
#[async_trait]
pub trait SourceTextProvider: Send + Sync {
    async fn source_text(&self, ticker: &str, source: SourceKind)
        -> Result<String, ProviderError>;
}

/// A chat-style language model endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Which tickers a run scans and which ones are always considered.
pub trait UniverseProvider: Send + Sync {
    fn tickers(&self) -> Vec<String>;
    fn watchlist(&self) -> Vec<String>;
}
