use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error category tags carried on failed results and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    LanguageUnsupported,
    ModelLoadFailed,
    DetectionError,
    Timeout,
    CacheError,
    SinkError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::LanguageUnsupported => "LANGUAGE_UNSUPPORTED",
            ErrorKind::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorKind::DetectionError => "DETECTION_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::CacheError => "CACHE_ERROR",
            ErrorKind::SinkError => "SINK_ERROR",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Errors raised inside the pipeline. `process_document` never propagates
/// these to the caller: every variant folds into a failed
/// [`crate::models::PipelineResult`] carrying the matching [`ErrorKind`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("NER model unavailable for '{language}': {reason}")]
    ModelLoad { language: String, reason: String },

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("document processing exceeded {0}s")]
    Timeout(u64),

    #[error("cache operation failed: {0}")]
    Cache(String),

    #[error("audit sink failed: {0}")]
    Sink(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::ValidationError,
            PipelineError::ModelLoad { .. } => ErrorKind::ModelLoadFailed,
            PipelineError::Detection(_) => ErrorKind::DetectionError,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Cache(_) => ErrorKind::CacheError,
            PipelineError::Sink(_) => ErrorKind::SinkError,
            PipelineError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Validation failures must not trigger the fallback recognizer.
    pub fn triggers_fallback(&self) -> bool {
        !matches!(self, PipelineError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_tags() {
        assert_eq!(ErrorKind::Timeout.as_str(), "TIMEOUT");
        assert_eq!(ErrorKind::CacheError.as_str(), "CACHE_ERROR");
        let json = serde_json::to_string(&ErrorKind::ModelLoadFailed).unwrap();
        assert_eq!(json, "\"MODEL_LOAD_FAILED\"");
    }

    #[test]
    fn test_kind_mapping() {
        let err = PipelineError::Detection("boom".into());
        assert_eq!(err.kind(), ErrorKind::DetectionError);
        assert!(err.triggers_fallback());

        let err = PipelineError::Validation("missing field".into());
        assert!(!err.triggers_fallback());
    }
}
