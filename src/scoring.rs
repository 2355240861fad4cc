//! Confidence scoring for detected spans.
//!
//! The scorer only ever raises confidence: each applicable factor adds a
//! fixed boost and the result is clamped to 1.0. The original base
//! confidence is preserved on the span whenever a boost applies.

use serde_json::Value;

use crate::models::{ConfidenceMetrics, DetectedSpan, EntityKind};

const BOOST_HIGH_RELIABILITY: f64 = 0.10;
const BOOST_CONTEXT_KEYWORDS: f64 = 0.10;
const BOOST_VALIDATION_PASSED: f64 = 0.15;
const BOOST_MULTIPLE_PATTERNS: f64 = 0.10;
const BOOST_PATTERN_COMPLEXITY: f64 = 0.05;

const HIGH_RELIABILITY_THRESHOLD: f64 = 0.85;
const PATTERN_COMPLEXITY_THRESHOLD: f64 = 0.8;

/// Per-kind reliability: how trustworthy a detection of this kind is,
/// given its pattern strength and validation robustness. The table is
/// total over the closed kind set; OTHER is the catch-all category.
pub fn type_reliability(kind: EntityKind) -> f64 {
    match kind {
        EntityKind::FiscalCode => 0.95,
        EntityKind::VatNumber => 0.90,
        EntityKind::Iban => 0.90,
        EntityKind::Email => 0.85,
        EntityKind::Phone => 0.75,
        EntityKind::Passport => 0.80,
        EntityKind::IdCard => 0.80,
        EntityKind::Date => 0.70,
        EntityKind::Person => 0.65,
        EntityKind::Organization => 0.65,
        EntityKind::Location => 0.60,
        EntityKind::Court => 0.75,
        EntityKind::Judge => 0.70,
        EntityKind::Lawyer => 0.70,
        EntityKind::Address => 0.65,
        EntityKind::Other => 0.50,
    }
}

/// Context keywords whose presence near a span of the given kind boosts
/// confidence.
pub fn context_keywords(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::FiscalCode => &[
            "codice fiscale",
            "c.f.",
            "cf",
            "nato a",
            "nata a",
            "residente in",
            "domiciliato in",
            "domiciliata in",
        ],
        EntityKind::VatNumber => &["p.iva", "p. iva", "partita iva", "vat", "vat number", "p.i."],
        EntityKind::Person => &[
            "nome", "cognome", "sig.", "sig.ra", "dott.", "dott.ssa", "avv.", "ing.", "prof.",
        ],
        EntityKind::Email => &["email", "e-mail", "pec", "contatto", "scrivere a"],
        EntityKind::Phone => &["tel.", "telefono", "cell.", "cellulare", "fax", "contattare"],
        EntityKind::Organization => &["società", "s.r.l.", "s.p.a.", "ditta", "azienda", "impresa"],
        EntityKind::Court => &["tribunale", "corte", "giudice", "sentenza", "ordinanza"],
        EntityKind::Iban => &["iban", "conto corrente", "bonifico", "c/c", "coordinate bancarie"],
        _ => &[],
    }
}

/// Extra signals a recognizer can attach for the scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreContext<'a> {
    pub surrounding_text: Option<&'a str>,
    pub multiple_patterns: bool,
    pub pattern_complexity: Option<f64>,
}

/// Apply all applicable boosts to one span, in place.
pub fn score_span(span: &mut DetectedSpan, context: &ScoreContext<'_>) {
    let base = span.confidence;
    let mut confidence = base;

    if type_reliability(span.kind) >= HIGH_RELIABILITY_THRESHOLD {
        confidence += BOOST_HIGH_RELIABILITY;
    }

    let mut keywords_present = context
        .surrounding_text
        .map(|s| has_context_keywords(span.kind, s))
        .unwrap_or(false);
    if !keywords_present && (span.context_before.is_some() || span.context_after.is_some()) {
        let surrounding = format!(
            "{} {}",
            span.context_before.as_deref().unwrap_or(""),
            span.context_after.as_deref().unwrap_or("")
        );
        keywords_present = has_context_keywords(span.kind, &surrounding);
    }
    if keywords_present {
        confidence += BOOST_CONTEXT_KEYWORDS;
    }

    if span.validation_passed {
        confidence += BOOST_VALIDATION_PASSED;
    }

    let multiple_patterns = context.multiple_patterns
        || span
            .metadata
            .get("multiple_patterns")
            .and_then(Value::as_bool)
            .unwrap_or(false);
    if multiple_patterns {
        confidence += BOOST_MULTIPLE_PATTERNS;
    }

    let pattern_complexity = context.pattern_complexity.or_else(|| {
        span.metadata
            .get("pattern_complexity")
            .and_then(Value::as_f64)
    });
    if pattern_complexity.is_some_and(|c| c >= PATTERN_COMPLEXITY_THRESHOLD) {
        confidence += BOOST_PATTERN_COMPLEXITY;
    }

    let confidence = confidence.min(1.0);
    if confidence > base {
        span.original_confidence = Some(base);
        span.confidence = confidence;
    }
}

/// Score every span, deriving the surrounding text from the document when
/// the span does not already carry context windows.
pub fn score_all(spans: &mut [DetectedSpan], text: &str, window_chars: usize) {
    for span in spans.iter_mut() {
        let surrounding;
        let context = if span.context_before.is_some() || span.context_after.is_some() {
            ScoreContext::default()
        } else {
            surrounding = surrounding_window(text, span.start, span.end, window_chars);
            ScoreContext {
                surrounding_text: Some(&surrounding),
                ..Default::default()
            }
        };
        score_span(span, &context);
    }
}

fn has_context_keywords(kind: EntityKind, text: &str) -> bool {
    let keywords = context_keywords(kind);
    if keywords.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

/// Byte-boundary-safe window of up to `window_chars` characters on each
/// side of `[start, end)`.
pub fn surrounding_window(text: &str, start: usize, end: usize, window_chars: usize) -> String {
    let before_start = text[..start]
        .char_indices()
        .rev()
        .nth(window_chars.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let after_end = text[end..]
        .char_indices()
        .nth(window_chars)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    format!("{} {}", &text[before_start..start], &text[end..after_end])
}

/// Aggregate statistics over a span set's confidences.
pub fn aggregate_confidence(spans: &[DetectedSpan]) -> ConfidenceMetrics {
    if spans.is_empty() {
        return ConfidenceMetrics {
            mean_confidence: 0.0,
            median_confidence: 0.0,
            min_confidence: 0.0,
            max_confidence: 0.0,
            std_deviation: 0.0,
            high_confidence_count: 0,
            medium_confidence_count: 0,
            low_confidence_count: 0,
            total_entities: 0,
        };
    }

    let mut confidences: Vec<f64> = spans.iter().map(|s| s.confidence).collect();
    confidences.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let n = confidences.len();
    let mean = confidences.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (confidences[n / 2 - 1] + confidences[n / 2]) / 2.0
    } else {
        confidences[n / 2]
    };
    let variance = confidences.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n as f64;

    ConfidenceMetrics {
        mean_confidence: mean,
        median_confidence: median,
        min_confidence: confidences[0],
        max_confidence: confidences[n - 1],
        std_deviation: variance.sqrt(),
        high_confidence_count: confidences.iter().filter(|&&c| c >= 0.8).count(),
        medium_confidence_count: confidences
            .iter()
            .filter(|&&c| (0.6..0.8).contains(&c))
            .count(),
        low_confidence_count: confidences.iter().filter(|&&c| c < 0.6).count(),
        total_entities: n,
    }
}

/// Threshold check combining mean confidence and the percentage of spans
/// individually above the threshold.
pub fn meets_confidence_threshold(
    spans: &[DetectedSpan],
    threshold: f64,
    min_percentage: f64,
    check_mean: bool,
) -> bool {
    if spans.is_empty() {
        return false;
    }

    let metrics = aggregate_confidence(spans);
    if check_mean && metrics.mean_confidence < threshold {
        return false;
    }

    let meeting = spans.iter().filter(|s| s.confidence >= threshold).count();
    meeting as f64 / spans.len() as f64 >= min_percentage
}
