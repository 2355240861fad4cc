//! Pipeline orchestrator.
//!
//! Sequences normalization, context classification, detection, filtering,
//! scoring and rewriting for one document; integrates the two-tier cache;
//! emits audit records; schedules batches under bounded concurrency.
//!
//! `process_document` never raises: every failure mode folds into a
//! `PipelineResult` with `success=false` and the original text returned
//! unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::batching::{restore_order, BatchItem, BatchOptimizer};
use crate::cache::{cache_key, config_hash, CacheEntry, CacheManager, CacheStats};
use crate::config::PrivacyConfig;
use crate::context;
use crate::error::{ErrorKind, PipelineError};
use crate::filters::{FilterChain, FilterConfig};
use crate::language::{detect_language, Language};
use crate::models::{BatchResult, DetectedSpan, DocumentContext, PipelineResult};
use crate::normalizer::{normalize, NormalizeOptions};
use crate::profiler::PipelineProfiler;
use crate::recognizers::{EngineConfig, Recognizer, RecognizerEngine};
use crate::scoring;
use crate::strategies::{create_strategy, StrategyKind};

/// Per-document state machine. Stages are logged and profiled under these
/// names; any stage can transition to `Failed` with an error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Normalized,
    CacheLookup,
    Detecting,
    Filtering,
    Scoring,
    Rewriting,
    Cached,
    Done,
    Failed(ErrorKind),
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Normalized => "normalized",
            PipelineStage::CacheLookup => "cache_lookup",
            PipelineStage::Detecting => "detecting",
            PipelineStage::Filtering => "filtering",
            PipelineStage::Scoring => "scoring",
            PipelineStage::Rewriting => "rewriting",
            PipelineStage::Cached => "cached",
            PipelineStage::Done => "done",
            PipelineStage::Failed(_) => "failed",
        }
    }
}

/// One document to process in a batch.
#[derive(Debug, Clone)]
pub struct DocumentRequest {
    pub id: String,
    pub text: String,
    pub metadata: Option<Map<String, Value>>,
}

impl DocumentRequest {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    pub language: Option<Language>,
    pub confidence_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AnonymizeOptions {
    pub language: Option<Language>,
    pub strategy: Option<StrategyKind>,
    pub document_id: Option<String>,
    pub user_id: Option<String>,
}

/// Detection-only output: spans plus advisory metadata, no anonymization.
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    pub spans: Vec<DetectedSpan>,
    pub language: Language,
    pub context: DocumentContext,
    pub metadata: Map<String, Value>,
    pub processing_time_ms: u64,
}

struct PipelineOutcome {
    result: PipelineResult,
    replacements: Vec<String>,
    engine_id: String,
    engine_version: String,
    /// Cache hits return immediately and emit no audit record.
    from_cache: bool,
}

fn trace_stage(document_id: &str, stage: PipelineStage) {
    tracing::trace!(
        document_id = document_id,
        stage = stage.as_str(),
        "stage transition"
    );
}

pub struct PipelineOrchestrator {
    config: PrivacyConfig,
    primary: Arc<dyn Recognizer>,
    fallback: Option<Arc<dyn Recognizer>>,
    cache: Arc<CacheManager>,
    audit: Arc<dyn AuditSink>,
    filter_chain: FilterChain,
    semaphore: Arc<Semaphore>,
    normalize_options: NormalizeOptions,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PrivacyConfig,
        primary: Arc<dyn Recognizer>,
        fallback: Option<Arc<dyn Recognizer>>,
        cache: Arc<CacheManager>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max_concurrent.max(1)));
        Self {
            filter_chain: FilterChain::new(FilterConfig::default()),
            semaphore,
            normalize_options: NormalizeOptions::default(),
            config,
            primary,
            fallback,
            cache,
            audit,
        }
    }

    /// Wire up the default engine pair, cache and audit sink from config.
    pub fn with_default_engines(config: PrivacyConfig) -> Arc<Self> {
        let engine_config = EngineConfig {
            confidence_threshold: config.detection.confidence_threshold,
            context_window_chars: config.detection.context_window_chars,
            piva_require_context: config.detection.piva_require_context,
        };

        let primary: Arc<dyn Recognizer> = match config.default_recognizer.as_str() {
            "spacy" => Arc::new(RecognizerEngine::spacy(engine_config.clone())),
            _ => Arc::new(RecognizerEngine::presidio(engine_config.clone())),
        };
        let fallback: Option<Arc<dyn Recognizer>> =
            match config.fallback_recognizer.as_deref() {
                Some("presidio") => Some(Arc::new(RecognizerEngine::presidio(engine_config))),
                Some("spacy") => Some(Arc::new(RecognizerEngine::spacy(engine_config))),
                _ => None,
            };

        let cache = Arc::new(CacheManager::new(&config.cache));
        Arc::new(Self::new(
            config,
            primary,
            fallback,
            cache,
            Arc::new(TracingAuditSink),
        ))
    }

    pub fn config(&self) -> &PrivacyConfig {
        &self.config
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Detect entities without anonymizing. Used by the boundary layer and
    /// the benchmarking runner.
    pub async fn detect(
        &self,
        text: &str,
        options: DetectOptions,
    ) -> Result<DetectionOutput, PipelineError> {
        let started = Instant::now();
        let normalized = normalize(text, &self.normalize_options);

        let (language, language_fallback) = self.resolve_language(options.language, &normalized);
        let doc_context =
            context::classify(&normalized, self.config.detection.classifier_window_chars);

        let mut profiler = PipelineProfiler::new(false);
        let (mut spans, engine, fallback_triggered) = self
            .detect_with_fallback(&normalized, language, &mut profiler)
            .await?;
        spans = self.filter_chain.apply(spans, &normalized);
        scoring::score_all(
            &mut spans,
            &normalized,
            self.config.detection.context_window_chars,
        );
        if let Some(threshold) = options.confidence_threshold {
            spans.retain(|s| s.confidence >= threshold);
        }

        let mut metadata = Map::new();
        metadata.insert("primary_recognizer".into(), json!(self.primary.id()));
        metadata.insert("engine_used".into(), json!(engine.id()));
        metadata.insert("fallback_triggered".into(), json!(fallback_triggered));
        metadata.insert("language".into(), json!(language.code()));
        metadata.insert("language_fallback".into(), json!(language_fallback));
        metadata.insert("document_context".into(), json!(doc_context));

        Ok(DetectionOutput {
            spans,
            language,
            context: doc_context,
            metadata,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Anonymize one text. Never fails: see the error-folding contract.
    pub async fn anonymize(&self, text: &str, options: AnonymizeOptions) -> PipelineResult {
        let document_id = options
            .document_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let user_id = options.user_id.clone().unwrap_or_else(|| "anonymous".into());
        self.run_document(&document_id, &user_id, text, options.language, options.strategy)
            .await
    }

    /// Full pipeline for one document of a batch.
    pub async fn process_document(&self, request: &DocumentRequest, user_id: &str) -> PipelineResult {
        let mut result = self
            .run_document(&request.id, user_id, &request.text, None, None)
            .await;
        if let Some(extra) = &request.metadata {
            for (key, value) in extra {
                result.metadata.entry(key.clone()).or_insert(value.clone());
            }
        }
        result
    }

    /// Process documents concurrently under the semaphore; the result
    /// vector matches the input order one-to-one, including failures.
    pub async fn process_batch(
        self: &Arc<Self>,
        documents: Vec<DocumentRequest>,
        user_id: &str,
        max_concurrent: Option<usize>,
    ) -> BatchResult {
        let started = Instant::now();
        let total = documents.len();
        let semaphore = match max_concurrent {
            Some(n) => Arc::new(Semaphore::new(n.max(1))),
            None => Arc::clone(&self.semaphore),
        };

        tracing::info!(
            user_id = user_id,
            document_count = total,
            "batch processing started"
        );

        let handles: Vec<JoinHandle<PipelineResult>> = documents
            .iter()
            .map(|request| {
                let this = Arc::clone(self);
                let semaphore = Arc::clone(&semaphore);
                let request = request.clone();
                let user_id = user_id.to_string();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire().await;
                    this.process_document(&request, &user_id).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        for (i, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(document_index = i, error = %e, "document task panicked");
                    results.push(PipelineResult::failed(
                        documents[i].text.clone(),
                        ErrorKind::InternalError,
                        format!("document task failed: {e}"),
                        0,
                    ));
                }
            }
        }

        self.finish_batch(results, total, user_id, started)
    }

    /// Smart batching: group by (language, length bucket) with adaptive
    /// sizing, process groups under the semaphore, then restore original
    /// input order.
    pub async fn process_batch_optimized(
        self: &Arc<Self>,
        documents: Vec<DocumentRequest>,
        user_id: &str,
    ) -> BatchResult {
        let started = Instant::now();
        let total = documents.len();

        let items: Vec<BatchItem> = documents
            .iter()
            .enumerate()
            .map(|(index, request)| BatchItem {
                index,
                id: request.id.clone(),
                language: detect_language(&request.text).language,
                text: request.text.clone(),
            })
            .collect();

        let optimizer = BatchOptimizer::new(self.config.batching.clone());
        let batches = optimizer.create_batches(items);
        tracing::debug!(
            documents = total,
            batches = batches.len(),
            "smart batching plan"
        );

        let mut indexed: Vec<(usize, PipelineResult)> = Vec::with_capacity(total);
        for batch in batches {
            let handles: Vec<(usize, JoinHandle<PipelineResult>)> = batch
                .items
                .into_iter()
                .map(|item| {
                    let this = Arc::clone(self);
                    let semaphore = Arc::clone(&self.semaphore);
                    let user_id = user_id.to_string();
                    let index = item.index;
                    let handle = tokio::spawn(async move {
                        let _permit = semaphore.acquire().await;
                        this.run_document(&item.id, &user_id, &item.text, Some(item.language), None)
                            .await
                    });
                    (index, handle)
                })
                .collect();

            for (index, handle) in handles {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => PipelineResult::failed(
                        documents[index].text.clone(),
                        ErrorKind::InternalError,
                        format!("document task failed: {e}"),
                        0,
                    ),
                };
                indexed.push((index, result));
            }
        }

        let results = restore_order(indexed);
        self.finish_batch(results, total, user_id, started)
    }

    fn finish_batch(
        &self,
        results: Vec<PipelineResult>,
        total: usize,
        user_id: &str,
        started: Instant,
    ) -> BatchResult {
        let successful = results.iter().filter(|r| r.success).count();
        let total_entities = results.iter().map(|r| r.spans.len()).sum();
        let total_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            user_id = user_id,
            total = total,
            successful = successful,
            failed = total - successful,
            total_entities = total_entities,
            total_time_ms = total_time_ms,
            "batch processing completed"
        );

        let mut metadata = Map::new();
        metadata.insert("user_id".into(), json!(user_id));

        BatchResult {
            total,
            successful,
            failed: total - successful,
            total_entities,
            total_time_ms,
            results,
            metadata,
        }
    }

    async fn run_document(
        &self,
        document_id: &str,
        user_id: &str,
        text: &str,
        language_override: Option<Language>,
        strategy_override: Option<StrategyKind>,
    ) -> PipelineResult {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.concurrency.per_doc_timeout_seconds.max(1));

        let work = self.run_pipeline(document_id, user_id, text, language_override, strategy_override);
        match tokio::time::timeout(timeout, work).await {
            Ok(outcome) => {
                if !outcome.from_cache {
                    self.emit_audit(document_id, user_id, &outcome).await;
                }
                outcome.result
            }
            Err(_) => {
                tracing::warn!(
                    document_id = document_id,
                    timeout_seconds = timeout.as_secs(),
                    "document processing timed out"
                );
                PipelineResult::failed(
                    text,
                    ErrorKind::Timeout,
                    format!("processing exceeded {}s", timeout.as_secs()),
                    started.elapsed().as_millis() as u64,
                )
            }
        }
    }

    async fn run_pipeline(
        &self,
        document_id: &str,
        user_id: &str,
        text: &str,
        language_override: Option<Language>,
        strategy_override: Option<StrategyKind>,
    ) -> PipelineOutcome {
        let started = Instant::now();
        let mut profiler = PipelineProfiler::new(self.config.profiling_enabled);

        tracing::debug!(
            document_id = document_id,
            user_id = user_id,
            text_length = text.len(),
            stage = PipelineStage::Received.as_str(),
            "document processing started"
        );

        profiler.begin("text_normalization");
        let normalized = normalize(text, &self.normalize_options);
        profiler.end();
        trace_stage(document_id, PipelineStage::Normalized);

        let (language, language_fallback) = self.resolve_language(language_override, &normalized);
        if language_fallback {
            tracing::warn!(
                document_id = document_id,
                "language fallback to italian"
            );
        }

        // Fingerprint over normalized text, recognizer identity and the
        // semantic configuration snapshot.
        let fingerprint_config = self.config.recognizer_fingerprint(self.primary.id());
        let fingerprint = cache_key(
            &normalized,
            self.primary.id(),
            &config_hash(&fingerprint_config),
        );

        trace_stage(document_id, PipelineStage::CacheLookup);
        profiler.begin("cache_lookup");
        let cached = self.cache.get(&fingerprint).await;
        profiler.end();

        if let Some((entry, tier)) = cached {
            let mut result = entry.into_result(text.to_string());
            result
                .metadata
                .insert("cache".into(), json!(tier.as_str()));
            result.processing_time_ms = started.elapsed().as_millis() as u64;
            tracing::debug!(
                document_id = document_id,
                tier = tier.as_str(),
                stage = PipelineStage::Done.as_str(),
                "cache hit"
            );
            return PipelineOutcome {
                replacements: Vec::new(),
                engine_id: self.primary.id().to_string(),
                engine_version: self.primary.version().to_string(),
                result,
                from_cache: true,
            };
        }

        let doc_context =
            context::classify(&normalized, self.config.detection.classifier_window_chars);

        trace_stage(document_id, PipelineStage::Detecting);
        profiler.begin("entity_detection");
        let detection = self.detect_with_fallback(&normalized, language, &mut profiler).await;
        profiler.end();

        let (mut spans, engine, fallback_triggered) = match detection {
            Ok(output) => output,
            Err(error) => {
                let kind = error.kind();
                tracing::error!(
                    document_id = document_id,
                    error = %error,
                    error_kind = kind.as_str(),
                    stage = PipelineStage::Failed(kind).as_str(),
                    "document processing failed"
                );
                let mut result = PipelineResult::failed(
                    text,
                    kind,
                    error.to_string(),
                    started.elapsed().as_millis() as u64,
                );
                result
                    .metadata
                    .insert("language".into(), json!(language.code()));
                return PipelineOutcome {
                    replacements: Vec::new(),
                    engine_id: self.primary.id().to_string(),
                    engine_version: self.primary.version().to_string(),
                    result,
                    from_cache: false,
                };
            }
        };

        trace_stage(document_id, PipelineStage::Filtering);
        profiler.begin("entity_filtering");
        spans = self.filter_chain.apply(spans, &normalized);
        profiler.end();

        trace_stage(document_id, PipelineStage::Scoring);
        profiler.begin("confidence_scoring");
        scoring::score_all(
            &mut spans,
            &normalized,
            self.config.detection.context_window_chars,
        );
        spans.retain(|s| s.confidence >= self.config.detection.meets_threshold);
        profiler.end();

        trace_stage(document_id, PipelineStage::Rewriting);
        profiler.begin("anonymization");
        let mut replacement_config = self.config.replacement.clone();
        if let Some(kind) = strategy_override {
            replacement_config.strategy = kind;
        }
        let mut strategy = create_strategy(&replacement_config);
        let anonymized = strategy.replace_all(&normalized, &spans);
        profiler.end();

        let mut metadata = Map::new();
        metadata.insert("primary_recognizer".into(), json!(self.primary.id()));
        metadata.insert("engine_used".into(), json!(engine.id()));
        metadata.insert("fallback_triggered".into(), json!(fallback_triggered));
        metadata.insert("language".into(), json!(language.code()));
        metadata.insert("language_fallback".into(), json!(language_fallback));
        metadata.insert("document_context".into(), json!(doc_context));
        metadata.insert("strategy".into(), json!(replacement_config.strategy.as_str()));
        metadata.insert("cache".into(), json!("miss"));
        if self.config.profiling_enabled {
            metadata.insert("profile".into(), profiler.export());
        }

        let result = PipelineResult {
            original_text: text.to_string(),
            anonymized_text: anonymized.text,
            spans,
            success: true,
            error_kind: None,
            error_message: None,
            processing_time_ms: started.elapsed().as_millis() as u64,
            metadata,
        };

        trace_stage(document_id, PipelineStage::Cached);
        self.cache
            .set(&fingerprint, CacheEntry::from_result(&result))
            .await;

        tracing::debug!(
            document_id = document_id,
            entities = result.spans.len(),
            processing_time_ms = result.processing_time_ms,
            stage = PipelineStage::Done.as_str(),
            "document processing completed"
        );

        PipelineOutcome {
            replacements: anonymized.replacements,
            engine_id: engine.id().to_string(),
            engine_version: engine.version().to_string(),
            result,
            from_cache: false,
        }
    }

    /// Primary detection with the configured fallback policy: re-run on a
    /// non-validation error, or when the primary finds nothing in a
    /// document long enough that silence is suspicious. Engines never run
    /// in parallel for one document.
    async fn detect_with_fallback(
        &self,
        normalized: &str,
        language: Language,
        profiler: &mut PipelineProfiler,
    ) -> Result<(Vec<DetectedSpan>, Arc<dyn Recognizer>, bool), PipelineError> {
        profiler.begin("primary_engine");
        let primary_outcome = self.primary.detect(normalized, language).await;
        profiler.end();

        let needs_fallback = match &primary_outcome {
            Err(error) => {
                tracing::warn!(
                    engine = self.primary.id(),
                    error = %error,
                    "primary recognizer failed"
                );
                error.triggers_fallback()
            }
            Ok(spans) => {
                spans.is_empty() && normalized.len() > self.config.detection.fallback_min_chars
            }
        };

        if !needs_fallback {
            return primary_outcome.map(|spans| (spans, Arc::clone(&self.primary), false));
        }

        let Some(fallback) = &self.fallback else {
            return primary_outcome.map(|spans| (spans, Arc::clone(&self.primary), false));
        };

        tracing::info!(
            primary = self.primary.id(),
            fallback = fallback.id(),
            "running fallback recognizer"
        );
        profiler.begin("fallback_engine");
        let fallback_outcome = fallback.detect(normalized, language).await;
        profiler.end();

        match fallback_outcome {
            Ok(spans) => Ok((spans, Arc::clone(fallback), true)),
            Err(fallback_error) => {
                tracing::warn!(
                    engine = fallback.id(),
                    error = %fallback_error,
                    "fallback recognizer failed"
                );
                // A primary that succeeded with zero spans still stands;
                // when both engines errored, report the primary's error.
                match primary_outcome {
                    Ok(spans) => Ok((spans, Arc::clone(&self.primary), true)),
                    Err(primary_error) => Err(primary_error),
                }
            }
        }
    }

    fn resolve_language(&self, requested: Option<Language>, normalized: &str) -> (Language, bool) {
        match requested {
            Some(language) => (language, false),
            None => {
                let detected = detect_language(normalized);
                (detected.language, detected.fallback)
            }
        }
    }

    async fn emit_audit(&self, document_id: &str, user_id: &str, outcome: &PipelineOutcome) {
        let record = AuditRecord::from_result(
            document_id,
            user_id,
            &outcome.engine_id,
            &outcome.engine_version,
            &outcome.result,
            &outcome.replacements,
            self.config.audit.max_context_chars,
        );
        if let Err(e) = self.audit.emit(record).await {
            tracing::warn!(
                document_id = document_id,
                error = %e,
                error_kind = ErrorKind::SinkError.as_str(),
                "audit sink failed, continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Fail,
        Empty,
        EmitNames,
        Sleep(Duration),
    }

    struct ScriptedRecognizer {
        id: String,
        behavior: Behavior,
    }

    impl ScriptedRecognizer {
        fn new(id: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                behavior,
            })
        }
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        fn id(&self) -> &str {
            &self.id
        }

        async fn detect(
            &self,
            text: &str,
            _language: Language,
        ) -> Result<Vec<DetectedSpan>, PipelineError> {
            match &self.behavior {
                Behavior::Fail => Err(PipelineError::Detection("scripted failure".into())),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(Vec::new())
                }
                Behavior::EmitNames => Ok(text
                    .match_indices("Mario Rossi")
                    .map(|(start, needle)| {
                        DetectedSpan::new(
                            EntityKind::Person,
                            needle,
                            start,
                            start + needle.len(),
                            0.9,
                            self.id.clone(),
                        )
                    })
                    .collect()),
            }
        }
    }

    struct CountingSink {
        emitted: AtomicUsize,
    }

    #[async_trait]
    impl AuditSink for CountingSink {
        async fn emit(&self, _record: AuditRecord) -> anyhow::Result<()> {
            self.emitted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn emit(&self, _record: AuditRecord) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    fn orchestrator(
        primary: Arc<dyn Recognizer>,
        fallback: Option<Arc<dyn Recognizer>>,
        audit: Arc<dyn AuditSink>,
    ) -> Arc<PipelineOrchestrator> {
        let config = PrivacyConfig::default();
        let cache = Arc::new(CacheManager::new(&config.cache));
        Arc::new(PipelineOrchestrator::new(
            config, primary, fallback, cache, audit,
        ))
    }

    #[tokio::test]
    async fn test_detection_error_folds_to_failed_result() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::Fail),
            None,
            Arc::new(TracingAuditSink),
        );
        let text = "Mario Rossi contro la convenuta.";
        let result = orchestrator
            .anonymize(text, AnonymizeOptions::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::DetectionError));
        assert_eq!(result.anonymized_text, text);
        assert!(result.spans.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_on_primary_failure() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::Fail),
            Some(ScriptedRecognizer::new("backup", Behavior::EmitNames)),
            Arc::new(TracingAuditSink),
        );
        let result = orchestrator
            .anonymize("Mario Rossi è comparso.", AnonymizeOptions::default())
            .await;

        assert!(result.success);
        assert_eq!(result.metadata["fallback_triggered"], json!(true));
        assert_eq!(result.metadata["engine_used"], json!("backup"));
        assert!(!result.anonymized_text.contains("Mario Rossi"));
    }

    #[tokio::test]
    async fn test_fallback_on_empty_large_document() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::Empty),
            Some(ScriptedRecognizer::new("backup", Behavior::EmitNames)),
            Arc::new(TracingAuditSink),
        );
        let filler = "della causa in esame. ".repeat(10);
        let text = format!("Mario Rossi è parte {}", filler);
        let result = orchestrator
            .anonymize(&text, AnonymizeOptions::default())
            .await;

        assert!(result.success);
        assert_eq!(result.metadata["fallback_triggered"], json!(true));
        assert_eq!(result.spans.len(), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_on_short_empty_document() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::Empty),
            Some(ScriptedRecognizer::new("backup", Behavior::EmitNames)),
            Arc::new(TracingAuditSink),
        );
        let result = orchestrator
            .anonymize("Nota breve.", AnonymizeOptions::default())
            .await;

        assert!(result.success);
        assert!(result.spans.is_empty());
        assert_eq!(result.metadata["fallback_triggered"], json!(false));
    }

    #[tokio::test]
    async fn test_timeout_produces_failed_result() {
        let mut config = PrivacyConfig::default();
        config.concurrency.per_doc_timeout_seconds = 1;
        let cache = Arc::new(CacheManager::new(&config.cache));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            config,
            ScriptedRecognizer::new("slow", Behavior::Sleep(Duration::from_secs(10))),
            None,
            cache,
            Arc::new(TracingAuditSink),
        ));

        let result = orchestrator
            .anonymize("testo qualunque", AnonymizeOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(result.anonymized_text, "testo qualunque");
    }

    #[tokio::test]
    async fn test_cache_hit_on_second_call() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::EmitNames),
            None,
            Arc::new(TracingAuditSink),
        );
        let request = DocumentRequest::new("doc1", "Mario Rossi è qui.");

        let first = orchestrator.process_document(&request, "user1").await;
        assert_eq!(first.metadata["cache"], json!("miss"));

        let second = orchestrator.process_document(&request, "user1").await;
        assert_eq!(second.metadata["cache"], json!("l1"));
        assert_eq!(second.anonymized_text, first.anonymized_text);
        assert_eq!(second.original_text, first.original_text);
    }

    #[tokio::test]
    async fn test_audit_emitted_once_not_on_cache_hits() {
        let sink = Arc::new(CountingSink {
            emitted: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::EmitNames),
            None,
            sink.clone(),
        );
        let request = DocumentRequest::new("doc1", "Mario Rossi è qui.");

        orchestrator.process_document(&request, "user1").await;
        orchestrator.process_document(&request, "user1").await;

        assert_eq!(sink.emitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_audit_sink_failure_does_not_propagate() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::EmitNames),
            None,
            Arc::new(FailingSink),
        );
        let result = orchestrator
            .anonymize("Mario Rossi è qui.", AnonymizeOptions::default())
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_batch_results_match_input_order() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::EmitNames),
            None,
            Arc::new(TracingAuditSink),
        );

        let long_body = "Mario Rossi incontra la controparte. ".repeat(60);
        let documents = vec![
            DocumentRequest::new("d0", "Mario Rossi, nota breve."),
            DocumentRequest::new("d1", long_body),
            DocumentRequest::new("d2", "Mario Rossi, altra nota."),
        ];
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

        let batch = orchestrator.process_batch(documents, "user1", Some(2)).await;

        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 3);
        assert_eq!(batch.results.len(), 3);
        for (result, original) in batch.results.iter().zip(&texts) {
            assert_eq!(&result.original_text, original);
        }
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::Fail),
            None,
            Arc::new(TracingAuditSink),
        );
        let documents = vec![
            DocumentRequest::new("d0", "primo documento di prova"),
            DocumentRequest::new("d1", "secondo documento di prova"),
        ];
        let batch = orchestrator.process_batch(documents, "user1", None).await;

        assert_eq!(batch.total, 2);
        assert_eq!(batch.failed, 2);
        assert_eq!(batch.successful, 0);
        assert!(batch.results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn test_optimized_batch_restores_order() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::EmitNames),
            None,
            Arc::new(TracingAuditSink),
        );

        let documents: Vec<DocumentRequest> = (0..8)
            .map(|i| {
                let body = if i % 2 == 0 {
                    format!("Documento {} con Mario Rossi.", i)
                } else {
                    format!("Documento {} lungo. {}", i, "testo ".repeat(600))
                };
                DocumentRequest::new(format!("d{}", i), body)
            })
            .collect();
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

        let batch = orchestrator
            .process_batch_optimized(documents, "user1")
            .await;

        assert_eq!(batch.total, 8);
        for (result, original) in batch.results.iter().zip(&texts) {
            assert_eq!(&result.original_text, original);
        }
    }

    #[tokio::test]
    async fn test_detect_does_not_anonymize() {
        let orchestrator = orchestrator(
            ScriptedRecognizer::new("primary", Behavior::EmitNames),
            None,
            Arc::new(TracingAuditSink),
        );
        let output = orchestrator
            .detect("Mario Rossi è qui.", DetectOptions::default())
            .await
            .unwrap();

        assert_eq!(output.spans.len(), 1);
        assert_eq!(output.spans[0].kind, EntityKind::Person);
        assert_eq!(output.metadata["language"], json!("it"));
    }
}
