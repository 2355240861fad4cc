//! PII detection and anonymization core for legal documents.
//!
//! The pipeline normalizes a document, detects personally identifiable
//! information with NER plus checksum-validated pattern recognizers,
//! filters legal formulae, scores confidence, and rewrites every surviving
//! span with a replacement strategy. A two-tier fingerprint cache and an
//! audit-record seam sit around the pipeline; the benchmarking module
//! compares recognizer engines on annotated corpora.

pub mod audit;
pub mod batching;
pub mod benchmarking;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod language;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod profiler;
pub mod recognizers;
pub mod rewriter;
pub mod scoring;
pub mod strategies;
pub mod validators;

pub use audit::{AuditRecord, AuditSink, TracingAuditSink};
pub use cache::{cache_key, config_hash, CacheManager, CacheStats};
pub use config::PrivacyConfig;
pub use error::{ErrorKind, PipelineError};
pub use language::Language;
pub use models::{
    BatchResult, DetectedSpan, DocumentContext, EntityKind, PipelineResult, SensitivityLevel,
    SpanSet,
};
pub use orchestrator::{
    AnonymizeOptions, DetectOptions, DocumentRequest, PipelineOrchestrator, PipelineStage,
};
pub use recognizers::{Recognizer, RecognizerEngine};
pub use strategies::{ReplacementStrategy, StrategyKind};
