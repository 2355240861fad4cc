//! Audit records emitted per processed document.
//!
//! Persistence is an external collaborator: the core only builds the
//! record and hands it to an [`AuditSink`]. Emission is fire-and-forget;
//! sink failures are logged and never alter the pipeline's return
//! contract. Context windows are truncated before emission so full
//! documents never leak into logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::models::{EntityKind, PipelineResult};

/// Per-span detection event inside an audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSpan {
    pub kind: EntityKind,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_before_truncated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_after_truncated: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub document_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub recognizer_id: String,
    pub recognizer_version: String,
    pub original_length: usize,
    pub anonymized_length: usize,
    pub entities_detected: usize,
    pub entities_replaced: usize,
    pub processing_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub spans: Vec<AuditSpan>,
}

impl AuditRecord {
    /// Build the record from a finished pipeline result. `replacements`
    /// aligns with `result.spans`; pass an empty slice for detect-only or
    /// failed runs.
    pub fn from_result(
        document_id: &str,
        user_id: &str,
        recognizer_id: &str,
        recognizer_version: &str,
        result: &PipelineResult,
        replacements: &[String],
        max_context_chars: usize,
    ) -> Self {
        let spans = result
            .spans
            .iter()
            .enumerate()
            .map(|(i, span)| AuditSpan {
                kind: span.kind,
                start: span.start,
                end: span.end,
                confidence: span.confidence,
                replacement: replacements.get(i).cloned(),
                context_before_truncated: span
                    .context_before
                    .as_deref()
                    .map(|c| truncate_chars(c, max_context_chars)),
                context_after_truncated: span
                    .context_after
                    .as_deref()
                    .map(|c| truncate_chars(c, max_context_chars)),
                metadata: span.metadata.clone(),
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            recognizer_id: recognizer_id.to_string(),
            recognizer_version: recognizer_version.to_string(),
            original_length: result.original_text.len(),
            anonymized_length: result.anonymized_text.len(),
            entities_detected: result.spans.len(),
            entities_replaced: replacements.len(),
            processing_time_ms: result.processing_time_ms,
            success: result.success,
            error_kind: result.error_kind,
            error_message: result.error_message.clone(),
            spans,
        }
    }
}

/// Destination for audit records. Implementations live outside the core
/// (database writers, queues); the default logs through `tracing`.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, record: AuditRecord) -> anyhow::Result<()>;
}

/// Default sink: one structured log line per document, span details at
/// debug level.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, record: AuditRecord) -> anyhow::Result<()> {
        tracing::info!(
            document_id = %record.document_id,
            user_id = %record.user_id,
            recognizer = %record.recognizer_id,
            entities_detected = record.entities_detected,
            entities_replaced = record.entities_replaced,
            processing_time_ms = record.processing_time_ms,
            success = record.success,
            "anonymization event"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(record = %serde_json::to_string(&record)?, "audit record");
        }
        Ok(())
    }
}

/// Truncate to `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
