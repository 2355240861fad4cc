//! Recognizer engines.
//!
//! A [`Recognizer`] turns normalized text into a span set for a given
//! language. The two shipped engines (`presidio`, `spacy`) compose the
//! per-language NER model with the pattern recognizers; they differ in
//! identity and base NER confidence, mirroring the engines they stand in
//! for. The orchestrator nominates one as primary and may configure the
//! other as fallback.

pub mod ner;
pub mod patterns;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::language::Language;
use crate::models::{DetectedSpan, EntityKind, SpanSet};

pub use ner::{NerModel, NerRegistry};
pub use patterns::{CfRecognizer, ContactRecognizer, LegalEntityRecognizer, PivaRecognizer};

/// A detection engine. Implementations are shared across document tasks
/// and must be internally immutable after construction.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn id(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn detect(
        &self,
        text: &str,
        language: Language,
    ) -> Result<Vec<DetectedSpan>, PipelineError>;
}

/// Map a model's native tag to the canonical entity kind. Unmappable tags
/// are dropped, not errors.
pub fn map_native_tag(tag: &str) -> Option<EntityKind> {
    match tag {
        "PER" | "PERSON" => Some(EntityKind::Person),
        "ORG" | "ORGANIZATION" => Some(EntityKind::Organization),
        "LOC" | "GPE" | "LOCATION" => Some(EntityKind::Location),
        "DATE" | "DATE_TIME" => Some(EntityKind::Date),
        "EMAIL" | "EMAIL_ADDRESS" => Some(EntityKind::Email),
        "PHONE" | "PHONE_NUMBER" => Some(EntityKind::Phone),
        "IBAN" | "IBAN_CODE" => Some(EntityKind::Iban),
        "CF" | "IT_FISCAL_CODE" => Some(EntityKind::FiscalCode),
        "PIVA" | "IT_VAT_CODE" => Some(EntityKind::VatNumber),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub confidence_threshold: f64,
    pub context_window_chars: usize,
    pub piva_require_context: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            context_window_chars: 100,
            piva_require_context: false,
        }
    }
}

/// NER model + pattern recognizers behind one engine identity.
pub struct RecognizerEngine {
    id: String,
    version: String,
    ner: Arc<NerRegistry>,
    cf: CfRecognizer,
    piva: PivaRecognizer,
    legal: LegalEntityRecognizer,
    contact: ContactRecognizer,
    config: EngineConfig,
}

impl RecognizerEngine {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        ner_base_confidence: f64,
        config: EngineConfig,
    ) -> Self {
        let id = id.into();
        Self {
            ner: Arc::new(NerRegistry::new(ner_base_confidence)),
            cf: CfRecognizer::new(id.clone()),
            piva: PivaRecognizer::new(id.clone(), config.piva_require_context),
            legal: LegalEntityRecognizer::new(id.clone()),
            contact: ContactRecognizer::new(id.clone()),
            version: version.into(),
            config,
            id,
        }
    }

    /// Presidio-profile engine: the default primary.
    pub fn presidio(config: EngineConfig) -> Self {
        Self::new("presidio", "2.2", 0.85, config)
    }

    /// spaCy-profile engine: the default fallback.
    pub fn spacy(config: EngineConfig) -> Self {
        Self::new("spacy", "3.7", 0.80, config)
    }

    fn attach_context(&self, spans: &mut [DetectedSpan], text: &str) {
        let window = self.config.context_window_chars;
        for span in spans {
            let before_start = floor_chars_back(text, span.start, window);
            let after_end = ceil_chars_forward(text, span.end, window);
            span.context_before = Some(text[before_start..span.start].trim().to_string());
            span.context_after = Some(text[span.end..after_end].trim().to_string());
        }
    }
}

#[async_trait]
impl Recognizer for RecognizerEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn detect(
        &self,
        text: &str,
        language: Language,
    ) -> Result<Vec<DetectedSpan>, PipelineError> {
        let model = self.ner.get_or_load(language).await?;

        // Model inference is CPU-bound; keep it off the async workers.
        let owned = text.to_string();
        let natives = tokio::task::spawn_blocking(move || model.infer(&owned))
            .await
            .map_err(|e| PipelineError::Detection(format!("inference task failed: {e}")))?;

        let mut spans: Vec<DetectedSpan> = natives
            .into_iter()
            .filter_map(|native| {
                let kind = map_native_tag(native.tag)?;
                Some(DetectedSpan::new(
                    kind,
                    native.text,
                    native.start,
                    native.end,
                    native.score,
                    self.id.clone(),
                ))
            })
            .collect();

        spans.extend(self.cf.detect(text));
        spans.extend(self.piva.detect(text));
        spans.extend(self.legal.detect(text));
        spans.extend(self.contact.detect(text));

        let mut spans = SpanSet::from_vec(spans).merge_overlapping().into_vec();
        spans.retain(|s| s.confidence >= self.config.confidence_threshold);

        self.attach_context(&mut spans, text);

        tracing::debug!(
            engine = %self.id,
            language = language.code(),
            spans = spans.len(),
            "detection complete"
        );

        Ok(spans)
    }
}

fn floor_chars_back(text: &str, from: usize, chars: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .nth(chars.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn ceil_chars_forward(text: &str, from: usize, chars: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(chars)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_detects_person_and_cf() {
        let engine = RecognizerEngine::presidio(EngineConfig::default());
        let spans = engine
            .detect("Il Dr. Mario Rossi, CF: RSSMRA85T10A562S.", Language::It)
            .await
            .unwrap();

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, EntityKind::Person);
        assert_eq!(spans[0].text, "Mario Rossi");
        assert_eq!((spans[0].start, spans[0].end), (7, 18));
        assert_eq!(spans[1].kind, EntityKind::FiscalCode);
        assert_eq!(spans[1].text, "RSSMRA85T10A562S");
        assert_eq!((spans[1].start, spans[1].end), (24, 40));
    }

    #[tokio::test]
    async fn test_non_overlap_invariant_after_merge() {
        let engine = RecognizerEngine::presidio(EngineConfig::default());
        let spans = engine
            .detect(
                "Avv. Luca Bianchi per Acme Costruzioni S.r.l., P.IVA 12345678903, Milano, 10 marzo 1985.",
                Language::It,
            )
            .await
            .unwrap();

        let set = SpanSet::from_vec(spans);
        assert!(set.is_non_overlapping());
        assert!(!set.is_empty());
    }

    #[tokio::test]
    async fn test_confidence_floor_applied() {
        let mut config = EngineConfig::default();
        config.confidence_threshold = 0.99;
        let engine = RecognizerEngine::spacy(config);
        let spans = engine
            .detect("Mario Rossi abita a Milano.", Language::It)
            .await
            .unwrap();
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_context_windows_attached() {
        let engine = RecognizerEngine::presidio(EngineConfig::default());
        let spans = engine
            .detect("Il convenuto Mario Rossi non è comparso.", Language::It)
            .await
            .unwrap();
        let person = spans.iter().find(|s| s.kind == EntityKind::Person).unwrap();
        assert!(person.context_before.as_deref().unwrap().contains("convenuto"));
        assert!(person.context_after.as_deref().unwrap().contains("comparso"));
    }

    #[test]
    fn test_native_tag_mapping() {
        assert_eq!(map_native_tag("PER"), Some(EntityKind::Person));
        assert_eq!(map_native_tag("GPE"), Some(EntityKind::Location));
        assert_eq!(map_native_tag("IT_FISCAL_CODE"), Some(EntityKind::FiscalCode));
        assert_eq!(map_native_tag("MISC"), None);
        assert_eq!(map_native_tag("CARDINAL"), None);
    }
}
