//! Benchmark execution: run each engine over an annotated corpus,
//! detection only, accumulating integer confusion counts and per-document
//! latencies in microseconds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::language::Language;
use crate::recognizers::Recognizer;

use super::datasets::BenchmarkDataset;
use super::metrics::{ConfusionCounts, LatencyStats, MetricsCalculator};

/// Aggregated result of benchmarking one engine on one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub dataset_id: String,
    pub dataset_size: usize,
    #[serde(default)]
    pub dataset_kind: Option<String>,
    pub engine: String,
    pub engine_version: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub latency: LatencyStats,
    pub total_entities_detected: u64,
    pub confusion: ConfusionCounts,
    pub by_kind: HashMap<String, ConfusionCounts>,
    pub run_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Progress callback payload, invoked after every processed document.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkProgress<'a> {
    pub engine: &'a str,
    pub processed: usize,
    pub total: usize,
}

impl BenchmarkProgress<'_> {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

pub struct BenchmarkRunner {
    engines: Vec<(String, Arc<dyn Recognizer>)>,
    dataset: BenchmarkDataset,
    language: Language,
    progress: Option<Box<dyn Fn(BenchmarkProgress<'_>) + Send + Sync>>,
}

impl BenchmarkRunner {
    pub fn new(engines: Vec<(String, Arc<dyn Recognizer>)>, dataset: BenchmarkDataset) -> Self {
        Self {
            engines,
            dataset,
            language: Language::It,
            progress: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_progress(
        mut self,
        callback: impl Fn(BenchmarkProgress<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Run every engine sequentially over the full corpus.
    pub async fn run_all(&self) -> anyhow::Result<HashMap<String, BenchmarkResult>> {
        let mut results = HashMap::new();
        for (name, engine) in &self.engines {
            tracing::info!(engine = %name, documents = self.dataset.len(), "benchmark started");
            let result = self.run_one(name, engine.as_ref()).await?;
            tracing::info!(
                engine = %name,
                f1 = result.f1_score,
                p95_us = result.latency.p95_us,
                "benchmark completed"
            );
            results.insert(name.clone(), result);
        }
        Ok(results)
    }

    async fn run_one(
        &self,
        name: &str,
        engine: &dyn Recognizer,
    ) -> anyhow::Result<BenchmarkResult> {
        let mut overall = ConfusionCounts::default();
        let mut by_kind: HashMap<String, ConfusionCounts> = HashMap::new();
        let mut latencies_us: Vec<u64> = Vec::with_capacity(self.dataset.len());
        let mut total_detected: u64 = 0;

        for (i, document) in self.dataset.documents.iter().enumerate() {
            let started = Instant::now();
            let predicted = engine.detect(&document.text, self.language).await?;
            latencies_us.push(started.elapsed().as_micros() as u64);

            total_detected += predicted.len() as u64;
            let metrics = MetricsCalculator::document_metrics(&predicted, &document.entities);
            overall.add(&metrics.overall);
            for (kind, counts) in metrics.by_kind {
                by_kind.entry(kind).or_default().add(&counts);
            }

            if let Some(callback) = &self.progress {
                callback(BenchmarkProgress {
                    engine: name,
                    processed: i + 1,
                    total: self.dataset.len(),
                });
            }
        }

        let latency = MetricsCalculator::latency_stats(&latencies_us);
        let run_id = format!("run_{}", uuid::Uuid::new_v4().simple());

        Ok(BenchmarkResult {
            dataset_id: self.dataset.id.clone(),
            dataset_size: self.dataset.len(),
            dataset_kind: self.dataset.kind.clone(),
            engine: name.to_string(),
            engine_version: engine.version().to_string(),
            precision: overall.precision(),
            recall: overall.recall(),
            f1_score: overall.f1(),
            latency,
            total_entities_detected: total_detected,
            confusion: overall,
            by_kind,
            run_id,
            metadata: Map::new(),
        })
    }
}
