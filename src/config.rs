//! Privacy pipeline configuration.
//!
//! All knobs live in one nested structure with production defaults; `from_env`
//! applies `PRIVACY_*` environment overrides. The orchestrator receives
//! the config explicitly at construction; there is no global instance.

use serde::{Deserialize, Serialize};

use crate::batching::BatchConfig;
use crate::cache::CacheConfig;
use crate::strategies::{HashAlgorithm, ReplacementConfig, StrategyKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent: usize,
    pub per_doc_timeout_seconds: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            per_doc_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Spans below this confidence never leave the recognizer.
    pub confidence_threshold: f64,
    /// Aggregate acceptance threshold for `meets_confidence_threshold`.
    pub meets_threshold: f64,
    pub context_window_chars: usize,
    pub classifier_window_chars: usize,
    /// Zero spans on a document longer than this triggers the fallback
    /// recognizer.
    pub fallback_min_chars: usize,
    pub piva_require_context: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            meets_threshold: 0.6,
            context_window_chars: 100,
            classifier_window_chars: 2_000,
            fallback_min_chars: 100,
            piva_require_context: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Context windows are truncated to this many chars before emission.
    pub max_context_chars: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    pub default_recognizer: String,
    pub fallback_recognizer: Option<String>,
    pub detection: DetectionConfig,
    pub cache: CacheConfig,
    pub concurrency: ConcurrencyConfig,
    pub replacement: ReplacementConfig,
    pub batching: BatchConfig,
    pub audit: AuditConfig,
    pub profiling_enabled: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            default_recognizer: "presidio".to_string(),
            fallback_recognizer: Some("spacy".to_string()),
            detection: DetectionConfig::default(),
            cache: CacheConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            replacement: ReplacementConfig::default(),
            batching: BatchConfig::default(),
            audit: AuditConfig::default(),
            profiling_enabled: true,
        }
    }
}

impl PrivacyConfig {
    /// Load defaults, then apply `PRIVACY_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(engine) = env_string("PRIVACY_DEFAULT_ENGINE") {
            config.default_recognizer = engine;
        }
        match env_string("PRIVACY_FALLBACK_ENGINE").as_deref() {
            Some("") | Some("none") => config.fallback_recognizer = None,
            Some(engine) => config.fallback_recognizer = Some(engine.to_string()),
            None => {}
        }

        if let Some(value) = env_parse::<f64>("PRIVACY_CONFIDENCE_THRESHOLD") {
            config.detection.confidence_threshold = value;
        }
        if let Some(value) = env_parse::<f64>("PRIVACY_MEETS_THRESHOLD") {
            config.detection.meets_threshold = value;
        }

        if let Some(value) = env_parse::<bool>("PRIVACY_CACHE_ENABLED") {
            config.cache.enabled = value;
        }
        if let Some(value) = env_parse::<u64>("PRIVACY_CACHE_TTL_SECONDS") {
            config.cache.ttl_seconds = value;
        }
        if let Some(value) = env_parse::<usize>("PRIVACY_CACHE_L1_MAX_SIZE") {
            config.cache.l1_max_size = value;
        }
        if let Some(url) = env_string("PRIVACY_REDIS_URL") {
            config.cache.redis_url = Some(url);
        }

        if let Some(value) = env_parse::<usize>("PRIVACY_MAX_CONCURRENT_JOBS") {
            config.concurrency.max_concurrent = value;
        }
        if let Some(value) = env_parse::<u64>("PRIVACY_TIMEOUT_SECONDS") {
            config.concurrency.per_doc_timeout_seconds = value;
        }

        if let Some(name) = env_string("PRIVACY_REPLACEMENT_STRATEGY") {
            match StrategyKind::from_name(&name) {
                Some(kind) => config.replacement.strategy = kind,
                None => tracing::warn!(strategy = %name, "unknown replacement strategy, keeping default"),
            }
        }
        if let Some(value) = env_parse::<bool>("PRIVACY_CONSISTENT_REPLACEMENT") {
            config.replacement.consistent = value;
        }
        if let Some(locale) = env_string("PRIVACY_SYNTHETIC_LOCALE") {
            config.replacement.synthetic_locale = locale;
        }
        if let Some(seed) = env_parse::<u64>("PRIVACY_SYNTHETIC_SEED") {
            config.replacement.synthetic_seed = Some(seed);
        }
        if let Some(salt) = env_string("PRIVACY_HASH_SALT") {
            config.replacement.hash_salt = Some(salt);
        }

        if let Some(value) = env_parse::<usize>("PRIVACY_MAX_BATCH_SIZE") {
            config.batching.max_batch_size = value;
        }
        if let Some(value) = env_parse::<bool>("PRIVACY_ADAPTIVE_BATCHING") {
            config.batching.adaptive = value;
        }

        config
    }

    /// The recognizer-facing configuration snapshot whose canonical JSON
    /// feeds the cache fingerprint. Every field here changes detection
    /// semantics, so every field must change the fingerprint.
    pub fn recognizer_fingerprint(&self, recognizer_id: &str) -> RecognizerFingerprint {
        RecognizerFingerprint {
            recognizer_id: recognizer_id.to_string(),
            confidence_threshold: self.detection.confidence_threshold,
            context_window_chars: self.detection.context_window_chars,
            piva_require_context: self.detection.piva_require_context,
            strategy: self.replacement.strategy,
            consistent: self.replacement.consistent,
            use_letters_for_names: self.replacement.use_letters_for_names,
            hash_algorithm: self.replacement.hash_algorithm,
        }
    }
}

/// Serialized (canonical JSON, key-sorted) and hashed into the cache key.
#[derive(Debug, Clone, Serialize)]
pub struct RecognizerFingerprint {
    pub recognizer_id: String,
    pub confidence_threshold: f64,
    pub context_window_chars: usize,
    pub piva_require_context: bool,
    pub strategy: StrategyKind,
    pub consistent: bool,
    pub use_letters_for_names: bool,
    pub hash_algorithm: HashAlgorithm,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
