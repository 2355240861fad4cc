//! Weighted-score winner selection over benchmark results.
//!
//! `S = w_f1 * F1 + w_lat * lat_norm + w_p * precision + w_r * recall`,
//! where latency normalizes to 1.0 at or under the target and decays
//! exponentially above it. Ties break on F1, then lower p95 latency, then
//! the lexicographically smaller engine id.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::runner::BenchmarkResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub f1: f64,
    pub latency: f64,
    pub precision: f64,
    pub recall: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            f1: 0.5,
            latency: 0.3,
            precision: 0.1,
            recall: 0.1,
        }
    }
}

impl ScoreWeights {
    fn total(&self) -> f64 {
        self.f1 + self.latency + self.precision + self.recall
    }
}

/// Component breakdown for one engine, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub engine: String,
    pub total_score: f64,
    pub f1_component: f64,
    pub latency_component: f64,
    pub latency_normalized: f64,
    pub precision_component: f64,
    pub recall_component: f64,
}

pub struct WinnerSelector {
    weights: ScoreWeights,
    latency_target_ms: f64,
}

impl WinnerSelector {
    pub const DEFAULT_LATENCY_TARGET_MS: f64 = 500.0;

    pub fn new(weights: ScoreWeights, latency_target_ms: f64) -> Result<Self> {
        let total = weights.total();
        if (total - 1.0).abs() > 0.01 {
            bail!("score weights must sum to 1.0, got {total}");
        }
        if latency_target_ms <= 0.0 {
            bail!("latency target must be positive");
        }
        Ok(Self {
            weights,
            latency_target_ms,
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(ScoreWeights::default(), Self::DEFAULT_LATENCY_TARGET_MS)
            .expect("default weights sum to 1.0")
    }

    /// Normalize p95 latency to [0, 1]: 1.0 at or under the target,
    /// `exp(-(p95 - target) / target)` above it.
    pub fn normalize_latency(&self, p95_ms: f64) -> f64 {
        if p95_ms <= self.latency_target_ms {
            return 1.0;
        }
        let excess = (p95_ms - self.latency_target_ms) / self.latency_target_ms;
        (-excess).exp().clamp(0.0, 1.0)
    }

    pub fn score(&self, result: &BenchmarkResult) -> f64 {
        self.breakdown(result).total_score
    }

    pub fn breakdown(&self, result: &BenchmarkResult) -> ScoreBreakdown {
        let latency_normalized = self.normalize_latency(result.latency.p95_ms());
        let f1_component = result.f1_score * self.weights.f1;
        let latency_component = latency_normalized * self.weights.latency;
        let precision_component = result.precision * self.weights.precision;
        let recall_component = result.recall * self.weights.recall;

        ScoreBreakdown {
            engine: result.engine.clone(),
            total_score: f1_component + latency_component + precision_component + recall_component,
            f1_component,
            latency_component,
            latency_normalized,
            precision_component,
            recall_component,
        }
    }

    /// Pick the engine with the highest weighted score.
    pub fn select_winner(&self, results: &[BenchmarkResult]) -> Result<String> {
        if results.is_empty() {
            bail!("cannot select a winner from zero results");
        }

        let mut ranked: Vec<(&BenchmarkResult, f64)> =
            results.iter().map(|r| (r, self.score(r))).collect();
        ranked.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.f1_score
                        .partial_cmp(&a.f1_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    a.latency
                        .p95_us
                        .partial_cmp(&b.latency.p95_us)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.engine.cmp(&b.engine))
        });

        let winner = ranked[0].0.engine.clone();
        tracing::info!(
            winner = %winner,
            score = ranked[0].1,
            candidates = results.len(),
            "winner selected"
        );
        Ok(winner)
    }

    pub fn compare_engines(&self, results: &[BenchmarkResult]) -> HashMap<String, ScoreBreakdown> {
        results
            .iter()
            .map(|r| (r.engine.clone(), self.breakdown(r)))
            .collect()
    }
}
