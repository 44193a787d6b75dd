// =============================================================================
// Pipeline Report — auditable record of one discovery run
// =============================================================================
//
// Every run produces exactly one report carrying the output of each stage so
// results can be reviewed after the fact.  Reports are written with the same
// atomic tmp + rename pattern as the engine config.
// =============================================================================

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detectors::{ScanBatch, TrendFlag};
use crate::fusion::FinalPick;
use crate::macro_risk::{HedgeAllocation, RiskScore};
use crate::pipeline::{RunMode, SkippedTicker};
use crate::substance::SubstanceScore;
use crate::types::Signal;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique identifier for this run (UUID v4).
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub universe_size: usize,
    pub scans: ScanBatch,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskScore>,

    /// Present on full runs; only meaningful when defense mode is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hedge: Option<HedgeAllocation>,

    #[serde(default)]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub substance: Vec<SubstanceScore>,
    #[serde(default)]
    pub final_picks: Vec<FinalPick>,
    #[serde(default)]
    pub skipped: Vec<SkippedTicker>,
}

impl PipelineReport {
    pub fn new(mode: RunMode, universe_size: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            mode,
            universe_size,
            scans: ScanBatch::default(),
            risk: None,
            hedge: None,
            candidates: Vec::new(),
            substance: Vec::new(),
            final_picks: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// `report_<stamp>_<run id prefix>.json`; the prefix keeps runs started
    /// within the same second apart.
    pub fn file_name(&self) -> String {
        let short_id: String = self.run_id.chars().take(8).collect();
        format!(
            "report_{}_{}.json",
            self.generated_at.format("%Y%m%d_%H%M%S"),
            short_id
        )
    }

    /// Write the report as pretty JSON into `dir` (created if missing) and
    /// return the final path.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create report dir {}", dir.display()))?;

        let path = dir.join(self.file_name());
        let content =
            serde_json::to_string_pretty(self).context("failed to serialise pipeline report")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp report to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename tmp report to {}", path.display()))?;

        info!(path = %path.display(), run_id = %self.run_id, "report saved (atomic)");
        Ok(path)
    }

    /// Plain-text summary for logs and notifications.
    pub fn digest(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Discovery report {} ({:?}, {} tickers)",
            self.generated_at.format("%Y-%m-%d %H:%M"),
            self.mode,
            self.universe_size
        );

        let _ = writeln!(
            out,
            "Flags: {} surge, {} peak warning, {} neglected",
            self.scans.surge.len(),
            self.scans.peak_warnings.len(),
            self.scans.neglected.len()
        );
        for rec in &self.scans.surge {
            if let TrendFlag::Surge { ratio_5d, market_cap_b, .. } = &rec.flag {
                let cap = market_cap_b.map_or_else(|| "?".to_string(), |c| format!("{c:.1}"));
                let _ = writeln!(out, "  surge  {:6} {:.2}x (5d) cap ${}B", rec.ticker, ratio_5d, cap);
            }
        }
        for rec in &self.scans.peak_warnings {
            if let TrendFlag::PeakWarning { pct_of_high, severity, .. } = &rec.flag {
                let _ = writeln!(
                    out,
                    "  peak   {:6} {} at {:.1}% of 52w high",
                    rec.ticker, severity, pct_of_high
                );
            }
        }
        for rec in &self.scans.neglected {
            if let TrendFlag::Neglected { slope, severity, tv_change_pct, .. } = &rec.flag {
                let _ = writeln!(
                    out,
                    "  neglected {:6} {} slope {:.4} ({:+.1}% trade value)",
                    rec.ticker, severity, slope, tv_change_pct
                );
            }
        }

        if self.mode == RunMode::Full {
            if self.final_picks.is_empty() {
                let _ = writeln!(out, "No picks.");
            }

            let buys: Vec<&FinalPick> = self.final_picks.iter().filter(|p| p.signal.is_buy()).collect();
            if !buys.is_empty() {
                let _ = writeln!(out, "Buy signals:");
                for p in buys {
                    let _ = writeln!(
                        out,
                        "  {:10} {:6} score {:.2} (Q:{:.2} M:{:.2} N:{:.2})",
                        p.signal, p.ticker, p.total_score, p.quant_score, p.macro_score, p.nlp_score
                    );
                }
            }

            let exits: Vec<&FinalPick> = self.final_picks.iter().filter(|p| p.signal.is_exit()).collect();
            if !exits.is_empty() {
                let _ = writeln!(out, "Sell/Avoid:");
                for p in exits {
                    let _ = writeln!(out, "  {:10} {:6} ({:.2})", p.signal, p.ticker, p.total_score);
                }
            }

            let holds = self
                .final_picks
                .iter()
                .filter(|p| p.signal == Signal::Hold)
                .count();
            if holds > 0 {
                let _ = writeln!(out, "Hold: {holds}");
            }
        }

        if let Some(risk) = self.risk.as_ref().filter(|r| r.defense_mode) {
            let _ = writeln!(out, "DEFENSE MODE (risk {:.2})", risk.risk_score);
            for reason in &risk.reasons {
                let _ = writeln!(out, "  - {reason}");
            }
            if let Some(hedge) = &self.hedge {
                let _ = writeln!(out, "  defense ratio {:.0}%", hedge.defense_ratio * 100.0);
                for (sector, alloc) in &hedge.sectors {
                    let top: Vec<&str> = alloc.tickers.iter().take(3).map(|c| c.ticker.as_str()).collect();
                    let _ = writeln!(
                        out,
                        "  {:17} {:5.1}%  {}",
                        sector.to_string(),
                        alloc.weight * 100.0,
                        top.join(", ")
                    );
                }
            }
        } else if let Some(risk) = &self.risk {
            let _ = writeln!(out, "Defense mode off (risk {:.2})", risk.risk_score);
        }

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "Skipped: {}", self.skipped.len());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_risk::hedge::SectorAllocation;
    use crate::macro_risk::scorer::ComponentScores;
    use crate::macro_risk::DefenseSector;
    use crate::detectors::NeglectSeverity;
    use crate::pipeline::Stage;
    use std::collections::BTreeMap;

    fn pick(ticker: &str, total: f64, signal: Signal) -> FinalPick {
        FinalPick {
            ticker: ticker.into(),
            quant_score: 0.5,
            macro_score: 0.5,
            nlp_score: 0.5,
            total_score: total,
            signal,
        }
    }

    fn full_report() -> PipelineReport {
        let mut r = PipelineReport::new(RunMode::Full, 3);
        r.scans.push(
            "TER",
            TrendFlag::Surge {
                ratio_1d: 4.0,
                ratio_5d: 3.5,
                latest_trade_value: 4.0,
                avg_trade_value: 1.0,
                market_cap_b: Some(18.0),
            },
        );
        r.scans.push(
            "OLD",
            TrendFlag::Neglected {
                slope: -0.045,
                r_squared: 0.8,
                tv_change_pct: -62.0,
                current_tv: 1.0,
                severity: NeglectSeverity::DeepNeglect,
            },
        );
        r.final_picks = vec![
            pick("TER", 0.8, Signal::StrongBuy),
            pick("XYZ", 0.5, Signal::Hold),
            pick("BAD", 0.1, Signal::Avoid),
        ];
        r.risk = Some(RiskScore {
            risk_score: 0.76,
            component_scores: ComponentScores {
                cpi: 0.5,
                unemployment: 0.5,
                vix: 1.0,
                yield_curve: 0.5,
            },
            defense_mode: true,
            reasons: vec!["VIX 31.00 > 25".into()],
            triggers: vec![],
            vix_current: Some(31.0),
            index_drawdown_pct: None,
        });
        r.hedge = Some(HedgeAllocation {
            defense_mode: true,
            defense_ratio: 0.33,
            risk_score: 0.76,
            reasons: vec![],
            sectors: BTreeMap::from([(
                DefenseSector::Gold,
                SectorAllocation {
                    weight: 1.0,
                    tickers: vec![],
                },
            )]),
        });
        r.skipped.push(SkippedTicker {
            ticker: "ERR".into(),
            stage: Stage::Scan,
            reason: "upstream error".into(),
        });
        r
    }

    #[test]
    fn digest_lists_signals_and_defense() {
        let d = full_report().digest();
        assert!(d.contains("Buy signals:"));
        assert!(d.contains("STRONG_BUY TER"));
        assert!(d.contains("Sell/Avoid:"));
        assert!(d.contains("Hold: 1"));
        assert!(d.contains("DEFENSE MODE"));
        assert!(d.contains("VIX 31.00 > 25"));
        assert!(d.contains("gold"));
        assert!(d.contains("Skipped: 1"));
    }

    #[test]
    fn quant_digest_has_no_pick_sections() {
        let mut r = full_report();
        r.mode = RunMode::Quant;
        r.risk = None;
        let d = r.digest();
        assert!(d.contains("surge  TER"));
        assert!(d.contains("neglected OLD"));
        assert!(d.contains("DEEP_NEGLECT slope -0.0450"));
        assert!(!d.contains("Buy signals:"));
        assert!(!d.contains("DEFENSE"));
    }

    #[test]
    fn reports_from_the_same_second_get_distinct_files() {
        let a = full_report();
        let mut b = full_report();
        b.generated_at = a.generated_at;
        assert_ne!(a.file_name(), b.file_name());
    }

    #[test]
    fn save_writes_named_json_atomically() {
        let dir = std::env::temp_dir().join(format!("reports-{}", uuid::Uuid::new_v4()));
        let report = full_report();
        let path = report.save(&dir).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(&format!("_{}.json", &report.run_id[..8])));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded: PipelineReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.final_picks.len(), 3);
        assert_eq!(loaded.scans.surge.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
