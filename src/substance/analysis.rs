// =============================================================================
// Analysis records — earnings-call and filing analyses, parsed leniently
// =============================================================================
//
// Model output is rarely clean JSON.  `extract_json` strips markdown code
// fences and, when the remainder still does not parse, retries on the
// outermost `{ ... }` span.  Every record field defaults so a partial object
// still yields a usable record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderError;

const TRUNCATION_MARKER: &str = "\n\n... [truncated] ...\n\n";

/// Which disclosure an analysis was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Earnings,
    Filing,
}

impl SourceKind {
    /// Character budget for source text handed to an analyzer.
    pub fn char_budget(self) -> usize {
        match self {
            Self::Earnings => 12_000,
            Self::Filing => 15_000,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Earnings => write!(f, "earnings"),
            Self::Filing => write!(f, "filing"),
        }
    }
}

/// Earnings-call analysis.  `buzz_score` in [-10, 0], `substance_score` in
/// [0, 10]; out-of-range values are clamped at fusion time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EarningsAnalysis {
    pub ticker: Option<String>,
    pub quarter: Option<String>,
    pub buzz_score: Option<f64>,
    pub substance_score: Option<f64>,
    pub capex_growing: Option<bool>,
    pub capex_detail: Option<String>,
    pub hardware_revenue_pct: Option<f64>,
    pub key_positive_keywords: Vec<String>,
    pub key_negative_keywords: Vec<String>,
    /// raised / maintained / lowered / not_mentioned
    pub revenue_guidance: Option<String>,
    pub summary: Option<String>,
}

/// 10-K / 10-Q analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilingAnalysis {
    pub ticker: Option<String>,
    pub filing_type: Option<String>,
    pub revenue_segments: BTreeMap<String, serde_json::Value>,
    pub hardware_revenue_pct: Option<f64>,
    pub capex_yoy_change_pct: Option<f64>,
    pub rd_yoy_change_pct: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub key_findings: Vec<String>,
    pub risk_flags: Vec<String>,
    pub substance_score: Option<f64>,
    pub summary: Option<String>,
}

/// One analysis as returned by a `SubstanceProvider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AnalysisRecord {
    Earnings(EarningsAnalysis),
    Filing(FilingAnalysis),
}

impl AnalysisRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Earnings(_) => SourceKind::Earnings,
            Self::Filing(_) => SourceKind::Filing,
        }
    }

    /// Parse raw model output for `kind`.
    pub fn parse(kind: SourceKind, text: &str) -> Result<Self, ProviderError> {
        let value = extract_json(text).ok_or_else(|| {
            ProviderError::Malformed(format!("no JSON object in {kind} analysis"))
        })?;
        Self::from_value(kind, value)
    }

    pub fn from_value(kind: SourceKind, value: serde_json::Value) -> Result<Self, ProviderError> {
        let parsed = match kind {
            SourceKind::Earnings => serde_json::from_value(value).map(Self::Earnings),
            SourceKind::Filing => serde_json::from_value(value).map(Self::Filing),
        };
        parsed.map_err(|e| ProviderError::Malformed(format!("{kind} analysis: {e}")))
    }

    pub fn into_earnings(self) -> Option<EarningsAnalysis> {
        match self {
            Self::Earnings(e) => Some(e),
            Self::Filing(_) => None,
        }
    }

    pub fn into_filing(self) -> Option<FilingAnalysis> {
        match self {
            Self::Filing(f) => Some(f),
            Self::Earnings(_) => None,
        }
    }
}

/// Pull a JSON value out of model output.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let cleaned = strip_code_fences(text);
    if let Ok(v) = serde_json::from_str(&cleaned) {
        return Some(v);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Keep the head and tail of `text` within `max_chars` characters, joined by
/// a truncation marker.  Shorter text is returned unchanged.
pub fn truncate_source(text: &str, max_chars: usize) -> String {
    let len = text.chars().count();
    if len <= max_chars {
        return text.to_string();
    }
    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = text.chars().skip(len - half).collect();
    format!("{head}{TRUNCATION_MARKER}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_output() {
        let raw = "```json\n{\"buzz_score\": -2, \"substance_score\": 7}\n```";
        let rec = AnalysisRecord::parse(SourceKind::Earnings, raw).unwrap();
        let e = rec.into_earnings().unwrap();
        assert_eq!(e.buzz_score, Some(-2.0));
        assert_eq!(e.substance_score, Some(7.0));
    }

    #[test]
    fn falls_back_to_outer_braces() {
        let raw = "Here is the analysis:\n{\"substance_score\": 6, \"risk_flags\": [\"debt\"]}\nHope this helps.";
        let f = AnalysisRecord::parse(SourceKind::Filing, raw)
            .unwrap()
            .into_filing()
            .unwrap();
        assert_eq!(f.substance_score, Some(6.0));
        assert_eq!(f.risk_flags, vec!["debt".to_string()]);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = AnalysisRecord::parse(SourceKind::Earnings, "no json here").unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
        assert!(extract_json("} backwards {").is_none());
    }

    #[test]
    fn null_scores_are_missing_not_errors() {
        let e = AnalysisRecord::parse(SourceKind::Earnings, "{\"substance_score\": null}")
            .unwrap()
            .into_earnings()
            .unwrap();
        assert!(e.substance_score.is_none());
        assert!(e.key_positive_keywords.is_empty());
    }

    #[test]
    fn truncation_keeps_head_and_tail() {
        let text: String = "a".repeat(50) + &"b".repeat(50);
        let out = truncate_source(&text, 20);
        assert!(out.starts_with(&"a".repeat(10)));
        assert!(out.ends_with(&"b".repeat(10)));
        assert!(out.contains("[truncated]"));
        assert_eq!(truncate_source("short", 20), "short");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let out = truncate_source(&text, 10);
        assert_eq!(out.chars().filter(|&c| c == 'é').count(), 10);
    }
}
