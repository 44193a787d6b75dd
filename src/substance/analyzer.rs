// =============================================================================
// Text Analyzer — disclosure text -> model prompt -> analysis record
// =============================================================================
//
// Implements `SubstanceProvider` on top of two collaborators: a source of raw
// disclosure text and a completion client.  Text is truncated head + tail to
// the per-kind character budget before it is embedded in the prompt.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::providers::{CompletionClient, ProviderError, SourceTextProvider, SubstanceProvider};
use crate::substance::analysis::{truncate_source, AnalysisRecord, SourceKind};

const SYSTEM_PROMPT: &str =
    "You are a financial analyst. Respond with one valid JSON object only, without markdown or commentary.";

const EARNINGS_RUBRIC: &str = r#"Score the earnings call transcript below.

buzz_score (-10 to 0), deduct for:
  - "AI", "innovation", "disruption", "transformation" used without figures: -2 each
  - lowered revenue or earnings guidance: -3
  - one-time charges, restructuring or impairments: -2
  - open-ended promises with no timeline: -1

substance_score (0 to 10), add for:
  - capital expenditure growth with stated amounts: +3
  - order backlog or test-equipment orders growing, with numbers: +3
  - automation or labour-cost savings with metrics: +2
  - rising hardware, robotics or semiconductor revenue share: +4
  - recurring or subscription revenue growth with a percentage: +2
  - named customers or contract values: +1

Return keys: ticker, quarter, buzz_score, substance_score, capex_growing,
capex_detail, hardware_revenue_pct, key_positive_keywords,
key_negative_keywords, revenue_guidance (raised/maintained/lowered/not_mentioned),
summary."#;

const FILING_RUBRIC: &str = r#"Score the 10-K / 10-Q excerpt below.

Look at: segment revenue mix (is hardware/product revenue growing), capital
expenditure trend, R&D spending trend, leverage, and risk factors tied to
automation adoption.

Return keys: ticker, filing_type, revenue_segments, hardware_revenue_pct,
capex_yoy_change_pct, rd_yoy_change_pct, debt_to_equity, key_findings,
risk_flags, substance_score (0 to 10), summary."#;

pub struct TextAnalyzer {
    sources: Arc<dyn SourceTextProvider>,
    llm: Arc<dyn CompletionClient>,
}

impl TextAnalyzer {
    pub fn new(sources: Arc<dyn SourceTextProvider>, llm: Arc<dyn CompletionClient>) -> Self {
        Self { sources, llm }
    }

    fn build_prompt(ticker: &str, kind: SourceKind, text: &str) -> String {
        let rubric = match kind {
            SourceKind::Earnings => EARNINGS_RUBRIC,
            SourceKind::Filing => FILING_RUBRIC,
        };
        format!(
            "Company: {ticker}\n\n{rubric}\n\n--- {} TEXT ---\n{}",
            kind.to_string().to_uppercase(),
            truncate_source(text, kind.char_budget())
        )
    }
}

#[async_trait]
impl SubstanceProvider for TextAnalyzer {
    async fn analyze(
        &self,
        ticker: &str,
        source: SourceKind,
    ) -> Result<AnalysisRecord, ProviderError> {
        let text = self.sources.source_text(ticker, source).await?;
        let prompt = Self::build_prompt(ticker, source, &text);
        debug!(ticker, %source, prompt_chars = prompt.len(), "analysing disclosure");

        let raw = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;
        AnalysisRecord::parse(source, &raw).inspect_err(|e| {
            let preview: String = raw.chars().take(200).collect();
            warn!(ticker, %source, error = %e, preview = %preview, "unparsable model output");
        })
    }
}
