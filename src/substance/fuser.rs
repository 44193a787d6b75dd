// =============================================================================
// Substance Fuser — earnings (60%) + filing (40%) + buzz penalty
// =============================================================================
//
//   total = clamp(0.6 · earnings_substance + 0.4 · filing_substance + buzz, 0, 10)
//
// A missing analysis contributes 0 to its term.  Verdict cutoffs on `total`:
//   >= 8 STRONG_BUY, >= 6 BUY, >= 4 HOLD, >= 2 CAUTION, else AVOID

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::substance::analysis::{EarningsAnalysis, FilingAnalysis};
use crate::types::Verdict;

const EARNINGS_WEIGHT: f64 = 0.6;
const FILING_WEIGHT: f64 = 0.4;

const SUBSTANCE_MAX: f64 = 10.0;
const BUZZ_MIN: f64 = -10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstanceScore {
    pub ticker: String,
    pub buzz_score: f64,
    pub earnings_substance: f64,
    pub filing_substance: f64,
    pub total: f64,
    pub verdict: Verdict,
    pub capex_growing: bool,
    pub hardware_revenue_pct: Option<f64>,
    pub key_positive_keywords: Vec<String>,
    pub key_negative_keywords: Vec<String>,
    pub earnings_summary: Option<String>,
    pub filing_summary: Option<String>,
}

pub fn verdict_for(total: f64) -> Verdict {
    if total >= 8.0 {
        Verdict::StrongBuy
    } else if total >= 6.0 {
        Verdict::Buy
    } else if total >= 4.0 {
        Verdict::Hold
    } else if total >= 2.0 {
        Verdict::Caution
    } else {
        Verdict::Avoid
    }
}

fn clamp_score(v: Option<f64>, lo: f64, hi: f64) -> f64 {
    v.filter(|x| x.is_finite()).map_or(0.0, |x| x.clamp(lo, hi))
}

/// Fuse the two optional analyses for one ticker.  Both absent yields
/// `total = 0`, `AVOID`.
pub fn merge(
    ticker: &str,
    earnings: Option<&EarningsAnalysis>,
    filing: Option<&FilingAnalysis>,
) -> SubstanceScore {
    let buzz_score = clamp_score(earnings.and_then(|e| e.buzz_score), BUZZ_MIN, 0.0);
    let earnings_substance =
        clamp_score(earnings.and_then(|e| e.substance_score), 0.0, SUBSTANCE_MAX);
    let filing_substance = clamp_score(filing.and_then(|f| f.substance_score), 0.0, SUBSTANCE_MAX);

    let total = (earnings_substance * EARNINGS_WEIGHT + filing_substance * FILING_WEIGHT + buzz_score)
        .clamp(0.0, SUBSTANCE_MAX);
    let verdict = verdict_for(total);

    let capex_growing = earnings
        .and_then(|e| e.capex_growing)
        .or_else(|| filing.and_then(|f| f.capex_yoy_change_pct).map(|c| c > 0.0))
        .unwrap_or(false);

    debug!(
        ticker,
        total = format!("{:.2}", total),
        verdict = %verdict,
        "substance fused"
    );

    SubstanceScore {
        ticker: ticker.to_string(),
        buzz_score,
        earnings_substance,
        filing_substance,
        total,
        verdict,
        capex_growing,
        hardware_revenue_pct: earnings
            .and_then(|e| e.hardware_revenue_pct)
            .or_else(|| filing.and_then(|f| f.hardware_revenue_pct)),
        key_positive_keywords: earnings
            .map(|e| e.key_positive_keywords.clone())
            .unwrap_or_default(),
        key_negative_keywords: earnings
            .map(|e| e.key_negative_keywords.clone())
            .unwrap_or_default(),
        earnings_summary: earnings.and_then(|e| e.summary.clone()),
        filing_summary: filing.and_then(|f| f.summary.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earnings(substance: f64, buzz: f64) -> EarningsAnalysis {
        EarningsAnalysis {
            substance_score: Some(substance),
            buzz_score: Some(buzz),
            ..Default::default()
        }
    }

    fn filing(substance: f64) -> FilingAnalysis {
        FilingAnalysis {
            substance_score: Some(substance),
            ..Default::default()
        }
    }

    #[test]
    fn both_absent_is_avoid() {
        let s = merge("X", None, None);
        assert_eq!(s.total, 0.0);
        assert_eq!(s.verdict, Verdict::Avoid);
        assert!(!s.capex_growing);
    }

    #[test]
    fn weighted_blend_with_buzz_penalty() {
        let s = merge("TER", Some(&earnings(8.0, -3.0)), Some(&filing(7.0)));
        assert!((s.total - 4.6).abs() < 1e-9);
        assert_eq!(s.verdict, Verdict::Hold);
    }

    #[test]
    fn missing_filing_contributes_zero() {
        let s = merge("A", Some(&earnings(10.0, 0.0)), None);
        assert!((s.total - 6.0).abs() < 1e-9);
        assert_eq!(s.verdict, Verdict::Buy);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let s = merge("A", Some(&earnings(25.0, 4.0)), Some(&filing(-3.0)));
        assert_eq!(s.earnings_substance, 10.0);
        assert_eq!(s.buzz_score, 0.0);
        assert_eq!(s.filing_substance, 0.0);
        let heavy = merge("B", Some(&earnings(1.0, -10.0)), None);
        assert_eq!(heavy.total, 0.0);
    }

    #[test]
    fn verdict_cutoffs_are_inclusive() {
        assert_eq!(verdict_for(8.0), Verdict::StrongBuy);
        assert_eq!(verdict_for(6.0), Verdict::Buy);
        assert_eq!(verdict_for(4.0), Verdict::Hold);
        assert_eq!(verdict_for(2.0), Verdict::Caution);
        assert_eq!(verdict_for(1.99), Verdict::Avoid);
    }

    #[test]
    fn capex_falls_back_to_filing_growth() {
        let f = FilingAnalysis {
            capex_yoy_change_pct: Some(12.5),
            hardware_revenue_pct: Some(40.0),
            ..Default::default()
        };
        let s = merge("A", None, Some(&f));
        assert!(s.capex_growing);
        assert_eq!(s.hardware_revenue_pct, Some(40.0));
    }
}
