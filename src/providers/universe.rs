use crate::providers::UniverseProvider;
use crate::runtime_config::EngineConfig;

/// Fixed ticker lists, normally taken from the engine config.
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse {
    tickers: Vec<String>,
    watchlist: Vec<String>,
}

impl StaticUniverse {
    /// Tickers are upper-cased, trimmed and de-duplicated in first-seen order.
    pub fn new(tickers: Vec<String>, watchlist: Vec<String>) -> Self {
        Self {
            tickers: normalize(tickers),
            watchlist: normalize(watchlist),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.universe.clone(), config.watchlist.clone())
    }
}

impl UniverseProvider for StaticUniverse {
    fn tickers(&self) -> Vec<String> {
        self.tickers.clone()
    }

    fn watchlist(&self) -> Vec<String> {
        self.watchlist.clone()
    }
}

fn normalize(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for t in raw {
        let t = t.trim().to_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

/// Split a comma-separated ticker list such as `"TER, nvda,,AMD"`.
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    normalize(raw.split(',').map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_dedupes() {
        let u = StaticUniverse::new(
            vec![" ter".into(), "NVDA".into(), "ter".into(), "".into()],
            vec!["amd".into()],
        );
        assert_eq!(u.tickers(), vec!["TER", "NVDA"]);
        assert_eq!(u.watchlist(), vec!["AMD"]);
    }

    #[test]
    fn parses_comma_lists() {
        assert_eq!(parse_ticker_list("TER, nvda,,AMD"), vec!["TER", "NVDA", "AMD"]);
        assert!(parse_ticker_list("  ").is_empty());
    }
}
