use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ErrorKind;

/// Entity kinds detected by the pipeline.
///
/// The string tags are stable: they are embedded in cache entries, audit
/// records and benchmark ground truth, so renaming a tag is a breaking
/// change for every stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Date,
    FiscalCode,
    VatNumber,
    Email,
    Phone,
    Address,
    Court,
    Judge,
    Lawyer,
    IdCard,
    Passport,
    Iban,
    Other,
}

impl EntityKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            EntityKind::Person => "PERSON",
            EntityKind::Organization => "ORGANIZATION",
            EntityKind::Location => "LOCATION",
            EntityKind::Date => "DATE",
            EntityKind::FiscalCode => "FISCAL_CODE",
            EntityKind::VatNumber => "VAT_NUMBER",
            EntityKind::Email => "EMAIL",
            EntityKind::Phone => "PHONE",
            EntityKind::Address => "ADDRESS",
            EntityKind::Court => "COURT",
            EntityKind::Judge => "JUDGE",
            EntityKind::Lawyer => "LAWYER",
            EntityKind::IdCard => "ID_CARD",
            EntityKind::Passport => "PASSPORT",
            EntityKind::Iban => "IBAN",
            EntityKind::Other => "OTHER",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PERSON" => Some(EntityKind::Person),
            "ORGANIZATION" => Some(EntityKind::Organization),
            "LOCATION" => Some(EntityKind::Location),
            "DATE" => Some(EntityKind::Date),
            "FISCAL_CODE" => Some(EntityKind::FiscalCode),
            "VAT_NUMBER" => Some(EntityKind::VatNumber),
            "EMAIL" => Some(EntityKind::Email),
            "PHONE" => Some(EntityKind::Phone),
            "ADDRESS" => Some(EntityKind::Address),
            "COURT" => Some(EntityKind::Court),
            "JUDGE" => Some(EntityKind::Judge),
            "LAWYER" => Some(EntityKind::Lawyer),
            "ID_CARD" => Some(EntityKind::IdCard),
            "PASSPORT" => Some(EntityKind::Passport),
            "IBAN" => Some(EntityKind::Iban),
            "OTHER" => Some(EntityKind::Other),
            _ => None,
        }
    }

    /// GDPR risk classification used by the sensitivity annotation step.
    pub fn sensitivity(&self) -> SensitivityLevel {
        match self {
            EntityKind::FiscalCode | EntityKind::IdCard | EntityKind::Passport => {
                SensitivityLevel::High
            }
            EntityKind::Organization | EntityKind::Court => SensitivityLevel::Low,
            _ => SensitivityLevel::Medium,
        }
    }
}

/// Entity sensitivity levels for GDPR compliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensitivityLevel {
    High,
    Medium,
    Low,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityLevel::High => "HIGH",
            SensitivityLevel::Medium => "MEDIUM",
            SensitivityLevel::Low => "LOW",
        }
    }
}

/// A single detected PII mention.
///
/// `start` and `end` are byte offsets into the *normalized* text, half-open
/// `[start, end)`. They always fall on UTF-8 boundaries because every
/// recognizer matches on char/regex boundaries of the normalized string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSpan {
    pub kind: EntityKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    pub recognizer_id: String,
    #[serde(default)]
    pub validation_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl DetectedSpan {
    pub fn new(
        kind: EntityKind,
        text: impl Into<String>,
        start: usize,
        end: usize,
        confidence: f64,
        recognizer_id: impl Into<String>,
    ) -> Self {
        debug_assert!(start < end, "span must be non-empty: {}..{}", start, end);
        Self {
            kind,
            text: text.into(),
            start,
            end,
            confidence,
            context_before: None,
            context_after: None,
            recognizer_id: recognizer_id.into(),
            validation_passed: false,
            sensitivity: None,
            original_confidence: None,
            metadata: Map::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &DetectedSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn is_high_confidence(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// Ordered collection of spans carried through the pipeline.
///
/// After [`SpanSet::merge_overlapping`] the set satisfies the non-overlap
/// invariant: for any two members `a`, `b`, `a.end <= b.start` or
/// `b.end <= a.start`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanSet(Vec<DetectedSpan>);

impl SpanSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_vec(spans: Vec<DetectedSpan>) -> Self {
        Self(spans)
    }

    pub fn push(&mut self, span: DetectedSpan) {
        self.0.push(span);
    }

    pub fn extend(&mut self, spans: impl IntoIterator<Item = DetectedSpan>) {
        self.0.extend(spans);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectedSpan> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[DetectedSpan] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<DetectedSpan> {
        self.0
    }

    /// Resolve overlaps: higher confidence wins; on ties the earlier start,
    /// then the longer span. The result is sorted by start position.
    pub fn merge_overlapping(self) -> Self {
        let mut spans = self.0;
        spans.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.len().cmp(&a.len()))
        });

        // Sorted by (start asc, length desc), so on equal confidence the
        // earlier start, then the longer span, is the one already in place.
        let mut merged: Vec<DetectedSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last() {
                Some(prev) if span.overlaps(prev) => {
                    if span.confidence > prev.confidence {
                        let idx = merged.len() - 1;
                        merged[idx] = span;
                    }
                }
                _ => merged.push(span),
            }
        }
        Self(merged)
    }

    /// Check the non-overlap invariant on an already-sorted set.
    pub fn is_non_overlapping(&self) -> bool {
        self.0
            .windows(2)
            .all(|w| w[0].end <= w[1].start || w[1].end <= w[0].start)
    }
}

impl IntoIterator for SpanSet {
    type Item = DetectedSpan;
    type IntoIter = std::vec::IntoIter<DetectedSpan>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Legal document types inferred from the opening window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Sentenza,
    Contratto,
    Atto,
    Verbale,
    Parere,
    Ricorso,
    Citazione,
    Unknown,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Sentenza => "sentenza",
            DocumentKind::Contratto => "contratto",
            DocumentKind::Atto => "atto",
            DocumentKind::Verbale => "verbale",
            DocumentKind::Parere => "parere",
            DocumentKind::Ricorso => "ricorso",
            DocumentKind::Citazione => "citazione",
            DocumentKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jurisdiction {
    Civile,
    Penale,
    Amministrativo,
}

impl Jurisdiction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Jurisdiction::Civile => "civile",
            Jurisdiction::Penale => "penale",
            Jurisdiction::Amministrativo => "amministrativo",
        }
    }
}

/// Advisory document context attached to result metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContext {
    pub document_kind: DocumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<Jurisdiction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
    pub confidence: f64,
}

impl Default for DocumentContext {
    fn default() -> Self {
        Self {
            document_kind: DocumentKind::Unknown,
            jurisdiction: None,
            court: None,
            confidence: 0.0,
        }
    }
}

/// Result of processing a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub original_text: String,
    pub anonymized_text: String,
    pub spans: Vec<DetectedSpan>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PipelineResult {
    /// Safe fallback result: the caller receives the original text back,
    /// untouched, together with the failure category.
    pub fn failed(
        text: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        processing_time_ms: u64,
    ) -> Self {
        let text = text.into();
        Self {
            anonymized_text: text.clone(),
            original_text: text,
            spans: Vec::new(),
            success: false,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            processing_time_ms,
            metadata: Map::new(),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.spans.len()
    }

    pub fn entities_by_kind(&self, kind: EntityKind) -> Vec<&DetectedSpan> {
        self.spans.iter().filter(|s| s.kind == kind).collect()
    }

    pub fn counts_by_kind(&self) -> HashMap<EntityKind, usize> {
        let mut counts = HashMap::new();
        for span in &self.spans {
            *counts.entry(span.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Percentage change in length caused by replacement.
    pub fn replacement_rate(&self) -> f64 {
        if self.original_text.is_empty() {
            return 0.0;
        }
        let original = self.original_text.len() as f64;
        let anonymized = self.anonymized_text.len() as f64;
        (anonymized - original).abs() / original * 100.0
    }
}

/// Result of batch processing. `results` is one-to-one with the input,
/// including failed documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<PipelineResult>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_entities: usize,
    pub total_time_ms: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// JSON-serializable snapshot of a [`PipelineResult`] without the original
/// text. The original is kept by the caller and re-attached on cache hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub anonymized_text: String,
    pub spans: Vec<DetectedSpan>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CacheEntry {
    pub fn from_result(result: &PipelineResult) -> Self {
        Self {
            anonymized_text: result.anonymized_text.clone(),
            spans: result.spans.clone(),
            success: result.success,
            error_kind: result.error_kind,
            error_message: result.error_message.clone(),
            processing_time_ms: result.processing_time_ms,
            metadata: result.metadata.clone(),
        }
    }

    pub fn into_result(self, original_text: String) -> PipelineResult {
        PipelineResult {
            original_text,
            anonymized_text: self.anonymized_text,
            spans: self.spans,
            success: self.success,
            error_kind: self.error_kind,
            error_message: self.error_message,
            processing_time_ms: self.processing_time_ms,
            metadata: self.metadata,
        }
    }
}

/// Aggregate confidence statistics over a span set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub mean_confidence: f64,
    pub median_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub std_deviation: f64,
    pub high_confidence_count: usize,
    pub medium_confidence_count: usize,
    pub low_confidence_count: usize,
    pub total_entities: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, confidence: f64) -> DetectedSpan {
        DetectedSpan::new(EntityKind::Person, "x", start, end, confidence, "test")
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [
            EntityKind::Person,
            EntityKind::FiscalCode,
            EntityKind::VatNumber,
            EntityKind::IdCard,
            EntityKind::Other,
        ] {
            assert_eq!(EntityKind::from_tag(kind.as_tag()), Some(kind));
        }
        assert_eq!(EntityKind::from_tag("NOPE"), None);
    }

    #[test]
    fn test_sensitivity_mapping() {
        assert_eq!(EntityKind::FiscalCode.sensitivity(), SensitivityLevel::High);
        assert_eq!(EntityKind::Passport.sensitivity(), SensitivityLevel::High);
        assert_eq!(EntityKind::Organization.sensitivity(), SensitivityLevel::Low);
        assert_eq!(EntityKind::Person.sensitivity(), SensitivityLevel::Medium);
    }

    #[test]
    fn test_merge_keeps_higher_confidence() {
        let set = SpanSet::from_vec(vec![span(0, 10, 0.7), span(5, 15, 0.9)]);
        let merged = set.merge_overlapping();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.as_slice()[0].start, 5);
        assert!(merged.is_non_overlapping());
    }

    #[test]
    fn test_merge_tie_prefers_earlier_then_longer() {
        let set = SpanSet::from_vec(vec![span(5, 12, 0.8), span(0, 10, 0.8)]);
        let merged = set.merge_overlapping();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.as_slice()[0].start, 0);

        let set = SpanSet::from_vec(vec![span(0, 8, 0.8), span(0, 12, 0.8)]);
        let merged = set.merge_overlapping();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.as_slice()[0].end, 12);
    }

    #[test]
    fn test_merge_keeps_disjoint_spans() {
        let set = SpanSet::from_vec(vec![span(10, 20, 0.9), span(0, 10, 0.8)]);
        let merged = set.merge_overlapping();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.as_slice()[0].start, 0);
        assert!(merged.is_non_overlapping());
    }

    #[test]
    fn test_cache_entry_round_trip() {
        let result = PipelineResult {
            original_text: "Mario Rossi".into(),
            anonymized_text: "PERSON_A".into(),
            spans: vec![span(0, 11, 0.9)],
            success: true,
            error_kind: None,
            error_message: None,
            processing_time_ms: 12,
            metadata: Map::new(),
        };
        let entry = CacheEntry::from_result(&result);
        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        let restored = back.into_result(result.original_text.clone());
        assert_eq!(restored.anonymized_text, result.anonymized_text);
        assert_eq!(restored.spans.len(), 1);
        assert!(restored.success);
    }

    #[test]
    fn test_replacement_rate_empty_text() {
        let result = PipelineResult::failed("", ErrorKind::InternalError, "x", 0);
        assert_eq!(result.replacement_rate(), 0.0);
    }
}
