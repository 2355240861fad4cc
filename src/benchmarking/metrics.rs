//! Precision / recall / F1 and latency statistics.
//!
//! Matching is exact on the `(kind_tag, start, end)` triple. Confusion
//! counts are accumulated as integers and only converted to `f64` in the
//! final division, so corpus-level metrics carry no float accumulation
//! error.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::DetectedSpan;

use super::datasets::GroundTruthSpan;

pub type Triple = (String, usize, usize);

/// Integer confusion counts for one slice of the evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    pub fn add(&mut self, other: &ConfusionCounts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }

    pub fn precision(&self) -> f64 {
        safe_div(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    pub fn recall(&self) -> f64 {
        safe_div(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn safe_div(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-document evaluation: overall counts plus a per-kind breakdown.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetrics {
    pub overall: ConfusionCounts,
    pub by_kind: HashMap<String, ConfusionCounts>,
}

/// Latency statistics over per-document measurements, in microseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean_us: f64,
    pub median_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub std_dev_us: f64,
    pub min_us: f64,
    pub max_us: f64,
}

impl LatencyStats {
    pub fn p95_ms(&self) -> f64 {
        self.p95_us / 1_000.0
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean_us / 1_000.0
    }
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Exact-match TP/FP/FN between predictions and ground truth.
    pub fn document_metrics(
        predicted: &[DetectedSpan],
        ground_truth: &[GroundTruthSpan],
    ) -> DocumentMetrics {
        let pred_set: HashSet<Triple> = predicted
            .iter()
            .map(|s| (s.kind.as_tag().to_string(), s.start, s.end))
            .collect();
        let truth_set: HashSet<Triple> = ground_truth
            .iter()
            .map(|s| (s.kind_tag.clone(), s.start, s.end))
            .collect();

        let mut metrics = DocumentMetrics::default();
        metrics.overall = Self::counts(&pred_set, &truth_set);

        let kinds: HashSet<&String> = pred_set
            .iter()
            .map(|(kind, _, _)| kind)
            .chain(truth_set.iter().map(|(kind, _, _)| kind))
            .collect();

        for kind in kinds {
            let pred_filtered: HashSet<Triple> = pred_set
                .iter()
                .filter(|(k, _, _)| k == kind)
                .cloned()
                .collect();
            let truth_filtered: HashSet<Triple> = truth_set
                .iter()
                .filter(|(k, _, _)| k == kind)
                .cloned()
                .collect();
            metrics
                .by_kind
                .insert(kind.clone(), Self::counts(&pred_filtered, &truth_filtered));
        }

        metrics
    }

    fn counts(predicted: &HashSet<Triple>, truth: &HashSet<Triple>) -> ConfusionCounts {
        ConfusionCounts {
            true_positives: predicted.intersection(truth).count() as u64,
            false_positives: predicted.difference(truth).count() as u64,
            false_negatives: truth.difference(predicted).count() as u64,
        }
    }

    /// Statistics over per-document latencies (µs). Percentiles use linear
    /// interpolation between closest ranks.
    pub fn latency_stats(latencies_us: &[u64]) -> LatencyStats {
        if latencies_us.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<f64> = latencies_us.iter().map(|&v| v as f64).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        LatencyStats {
            mean_us: mean,
            median_us: percentile(&sorted, 50.0),
            p50_us: percentile(&sorted, 50.0),
            p95_us: percentile(&sorted, 95.0),
            p99_us: percentile(&sorted, 99.0),
            std_dev_us: variance.sqrt(),
            min_us: sorted[0],
            max_us: sorted[n - 1],
        }
    }
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let weight = rank - low as f64;
        sorted[low] * (1.0 - weight) + sorted[high] * weight
    }
}
