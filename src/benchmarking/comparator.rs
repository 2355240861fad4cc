//! Engine comparison report: winner, per-engine scores and the pairwise
//! significance indicator.
//!
//! Significance is a binary indicator: two engines differ significantly
//! iff their F1 scores differ by more than 0.05. A per-document paired
//! test would be stronger; the report labels the indicator honestly as a
//! threshold check.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;

use super::runner::BenchmarkResult;
use super::selector::{ScoreBreakdown, WinnerSelector};

const SIGNIFICANCE_F1_GAP: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub engines: Vec<String>,
    pub winner: String,
    pub scores: HashMap<String, ScoreBreakdown>,
    /// Keyed `"<a>_vs_<b>"`; true when |F1_a - F1_b| > 0.05.
    pub significance: HashMap<String, bool>,
    pub recommendation: String,
}

pub struct EngineComparator {
    selector: WinnerSelector,
}

impl EngineComparator {
    pub fn new(selector: WinnerSelector) -> Self {
        Self { selector }
    }

    pub fn with_defaults() -> Self {
        Self::new(WinnerSelector::with_defaults())
    }

    pub fn compare(&self, results: &[BenchmarkResult]) -> Result<ComparisonReport> {
        let winner = self.selector.select_winner(results)?;
        let scores = self.selector.compare_engines(results);
        let significance = pairwise_significance(results);
        let recommendation = self.recommendation(results, &winner, &significance);

        Ok(ComparisonReport {
            engines: results.iter().map(|r| r.engine.clone()).collect(),
            winner,
            scores,
            significance,
            recommendation,
        })
    }

    fn recommendation(
        &self,
        results: &[BenchmarkResult],
        winner: &str,
        significance: &HashMap<String, bool>,
    ) -> String {
        let mut lines = Vec::new();
        lines.push(format!("## Recommended engine: {}", winner));
        lines.push(String::new());
        lines.push("### Metrics".to_string());

        let mut ranked: Vec<&BenchmarkResult> = results.iter().collect();
        ranked.sort_by(|a, b| {
            self.selector
                .score(b)
                .partial_cmp(&self.selector.score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for result in &ranked {
            let marker = if result.engine == winner { " (winner)" } else { "" };
            lines.push(format!(
                "- {}{}: F1 {:.3}, precision {:.3}, recall {:.3}, p95 {:.1} ms",
                result.engine,
                marker,
                result.f1_score,
                result.precision,
                result.recall,
                result.latency.p95_ms(),
            ));
        }

        if !significance.is_empty() {
            lines.push(String::new());
            lines.push("### F1 gap check".to_string());
            for (pair, significant) in significance {
                let verdict = if *significant {
                    "above the 0.05 threshold"
                } else {
                    "within the 0.05 threshold"
                };
                lines.push(format!("- {}: {}", pair, verdict));
            }
        }

        if let Some(winner_result) = results.iter().find(|r| r.engine == winner) {
            lines.push(String::new());
            let quality = match winner_result.f1_score {
                f1 if f1 >= 0.90 => "excellent",
                f1 if f1 >= 0.85 => "good",
                f1 if f1 >= 0.80 => "acceptable",
                _ => "below target",
            };
            lines.push(format!(
                "Accuracy is {} (F1 {:.3}) on {} documents of dataset {}.",
                quality, winner_result.f1_score, winner_result.dataset_size, winner_result.dataset_id,
            ));
        }

        lines.join("\n")
    }
}

fn pairwise_significance(results: &[BenchmarkResult]) -> HashMap<String, bool> {
    let mut significance = HashMap::new();
    for (i, a) in results.iter().enumerate() {
        for b in results.iter().skip(i + 1) {
            let key = format!("{}_vs_{}", a.engine, b.engine);
            significance.insert(key, (a.f1_score - b.f1_score).abs() > SIGNIFICANCE_F1_GAP);
        }
    }
    significance
}
