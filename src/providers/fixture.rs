// =============================================================================
// Fixture Store — JSON snapshots on disk behind every provider trait
// =============================================================================
//
// Layout under the data directory:
//
//   prices/<TICKER>.json       {"ticker": "...", "bars": [...]} or a bare bar array
//   macro.json                 MacroSnapshot
//   market_caps.json           {"TICKER": 18.2, ...}   (billions USD, null = unknown)
//   substance/<TICKER>.json    {"earnings": {...} | "<raw model output>",
//                               "filing":   {...} | "<raw model output>"}
//   sources/<TICKER>.<kind>.txt  raw earnings / filing text
//
// A missing file maps to `NotAvailable`, unreadable files to `Upstream`, and
// unparsable content to `Malformed`.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::macro_risk::MacroSnapshot;
use crate::providers::{
    MacroDataProvider, MarketCapProvider, PriceHistoryProvider, ProviderError,
    SourceTextProvider, SubstanceProvider,
};
use crate::substance::{AnalysisRecord, SourceKind};
use crate::types::{PriceBar, PriceSeries};

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceFile {
    Series(PriceSeries),
    Bars(Vec<PriceBar>),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SubstanceFile {
    earnings: Option<serde_json::Value>,
    filing: Option<serde_json::Value>,
}

pub struct FixtureStore {
    root: PathBuf,
    market_caps: OnceCell<HashMap<String, Option<f64>>>,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            market_caps: OnceCell::new(),
        }
    }

    fn ticker_path(&self, dir: &str, ticker: &str, ext: &str) -> Result<PathBuf, ProviderError> {
        let safe = !ticker.is_empty()
            && !ticker.starts_with('.')
            && ticker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '_'));
        if !safe {
            return Err(ProviderError::NotAvailable(format!("invalid ticker {ticker:?}")));
        }
        Ok(self.root.join(dir).join(format!("{ticker}.{ext}")))
    }

    async fn read_text(&self, path: &Path) -> Result<String, ProviderError> {
        trace!(path = %path.display(), "reading fixture");
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ProviderError::NotAvailable(path.display().to_string()))
            }
            Err(e) => Err(ProviderError::Upstream(format!("{}: {e}", path.display()))),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ProviderError> {
        let text = self.read_text(path).await?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl PriceHistoryProvider for FixtureStore {
    async fn fetch(&self, ticker: &str) -> Result<PriceSeries, ProviderError> {
        let path = self.ticker_path("prices", ticker, "json")?;
        let mut bars = match self.read_json::<PriceFile>(&path).await? {
            PriceFile::Series(s) => s.bars,
            PriceFile::Bars(b) => b,
        };
        bars.sort_by_key(|b| b.date);
        let series = PriceSeries::new(ticker, bars);
        if series.is_empty() {
            return Err(ProviderError::NotAvailable(format!("{ticker}: empty price history")));
        }
        debug!(ticker, bars = series.len(), "price history loaded");
        Ok(series)
    }
}

#[async_trait]
impl MacroDataProvider for FixtureStore {
    async fn fetch_snapshot(&self) -> Result<MacroSnapshot, ProviderError> {
        self.read_json(&self.root.join("macro.json")).await
    }
}

#[async_trait]
impl MarketCapProvider for FixtureStore {
    async fn cap_of(&self, ticker: &str) -> Result<Option<f64>, ProviderError> {
        let caps = self
            .market_caps
            .get_or_try_init(|| async {
                match self.read_json(&self.root.join("market_caps.json")).await {
                    Err(ProviderError::NotAvailable(_)) => Ok(HashMap::new()),
                    other => other,
                }
            })
            .await?;
        Ok(caps.get(ticker).copied().flatten())
    }
}

#[async_trait]
impl SubstanceProvider for FixtureStore {
    async fn analyze(
        &self,
        ticker: &str,
        source: SourceKind,
    ) -> Result<AnalysisRecord, ProviderError> {
        let path = self.ticker_path("substance", ticker, "json")?;
        let file: SubstanceFile = self.read_json(&path).await?;
        let entry = match source {
            SourceKind::Earnings => file.earnings,
            SourceKind::Filing => file.filing,
        };
        match entry {
            None | Some(serde_json::Value::Null) => Err(ProviderError::NotAvailable(format!(
                "{ticker}: no {source} analysis"
            ))),
            Some(serde_json::Value::String(raw)) => AnalysisRecord::parse(source, &raw),
            Some(value) => AnalysisRecord::from_value(source, value),
        }
    }
}

#[async_trait]
impl SourceTextProvider for FixtureStore {
    async fn source_text(&self, ticker: &str, source: SourceKind) -> Result<String, ProviderError> {
        let path = self.ticker_path("sources", ticker, &format!("{source}.txt"))?;
        let text = self.read_text(&path).await?;
        if text.trim().is_empty() {
            return Err(ProviderError::NotAvailable(format!("{ticker}: empty {source} text")));
        }
        Ok(text)
    }
}
