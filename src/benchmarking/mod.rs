//! Benchmarking: per-document metrics against annotated corpora, latency
//! percentiles, engine scoring and winner selection.

pub mod comparator;
pub mod datasets;
pub mod metrics;
pub mod runner;
pub mod selector;

pub use comparator::{ComparisonReport, EngineComparator};
pub use datasets::{AnnotatedDocument, BenchmarkDataset, GroundTruthSpan};
pub use metrics::{ConfusionCounts, LatencyStats, MetricsCalculator};
pub use runner::{BenchmarkProgress, BenchmarkResult, BenchmarkRunner};
pub use selector::{ScoreBreakdown, ScoreWeights, WinnerSelector};
