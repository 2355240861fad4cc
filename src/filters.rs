//! Post-detection filter chain: validation, legal-formula exclusion and
//! sensitivity annotation, applied in that order.
//!
//! Every step is deterministic and stateless; the chain is a single
//! configured struct so the orchestrator carries one dependency.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{DetectedSpan, EntityKind};
use crate::validators;

/// Chars inspected on each side of a span when matching legal formulae.
const FORMULA_WINDOW_CHARS: usize = 50;

lazy_static! {
    /// Conventional phrases of Italian legal writing. An entity inside the
    /// window of one of these is a citation, not personal data.
    static ref LEGAL_FORMULAE: Vec<Regex> = vec![
        Regex::new(r"(?i)ai sensi dell['’]\s?art").unwrap(),
        Regex::new(r"(?i)ai sensi degli artt").unwrap(),
        Regex::new(r"(?i)visto il").unwrap(),
        Regex::new(r"(?i)vista la").unwrap(),
        Regex::new(r"(?i)considerato che").unwrap(),
        Regex::new(r"(?i)ritenuto che").unwrap(),
        Regex::new(r"(?i)in conformità a").unwrap(),
        Regex::new(r"(?i)ex art\.").unwrap(),
        Regex::new(r"(?i)di cui all['’]\s?art").unwrap(),
    ];
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub validate_entities: bool,
    pub legal_pattern_matching: bool,
    pub sensitivity_scoring: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            validate_entities: true,
            legal_pattern_matching: true,
            sensitivity_scoring: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    config: FilterConfig,
}

impl FilterChain {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Run the chain over a span set against the normalized text the spans
    /// index into.
    pub fn apply(&self, spans: Vec<DetectedSpan>, text: &str) -> Vec<DetectedSpan> {
        let before = spans.len();
        let mut spans = spans;

        if self.config.validate_entities {
            spans.retain_mut(|span| validate_span(span));
        }

        if self.config.legal_pattern_matching {
            spans.retain(|span| {
                !formula_filter_applies(span.kind) || !inside_legal_formula(text, span)
            });
        }

        if self.config.sensitivity_scoring {
            for span in &mut spans {
                span.sensitivity = Some(span.kind.sensitivity());
            }
        }

        if spans.len() != before {
            tracing::debug!(
                before = before,
                after = spans.len(),
                "filter chain dropped spans"
            );
        }

        spans
    }
}

/// Validate a span whose kind has a validator; marks `validation_passed`
/// and reports whether the span survives.
fn validate_span(span: &mut DetectedSpan) -> bool {
    let verdict = match span.kind {
        EntityKind::FiscalCode => Some(validators::validate_fiscal_code(&span.text)),
        EntityKind::VatNumber => Some(validators::validate_vat_number(&span.text)),
        EntityKind::Email => Some(validators::validate_email(&span.text)),
        EntityKind::Phone => Some(validators::validate_italian_phone(&span.text)),
        EntityKind::Iban => Some(validators::validate_iban(&span.text)),
        _ => None,
    };

    match verdict {
        Some(true) => {
            span.validation_passed = true;
            true
        }
        Some(false) => false,
        None => true,
    }
}

/// The formula filter only applies to citation-prone kinds: a date or an
/// article number next to `ai sensi dell'art.` is a legal reference, but a
/// person or a validated identifier stays personal data wherever it sits.
fn formula_filter_applies(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Date
            | EntityKind::Location
            | EntityKind::Organization
            | EntityKind::Court
            | EntityKind::Other
    )
}

/// True when any legal-formula pattern matches the ±50-char window around
/// the span.
fn inside_legal_formula(text: &str, span: &DetectedSpan) -> bool {
    let window = crate::scoring::surrounding_window(text, span.start, span.end, FORMULA_WINDOW_CHARS);
    LEGAL_FORMULAE.iter().any(|re| re.is_match(&window))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(text: &str, kind: EntityKind, needle: &str) -> DetectedSpan {
        let start = text.find(needle).expect("needle present");
        DetectedSpan::new(kind, needle, start, start + needle.len(), 0.9, "test")
    }

    #[test]
    fn test_invalid_fiscal_code_dropped() {
        let text = "CF RSSMRA85T10A562A del convenuto";
        let spans = vec![span_at(text, EntityKind::FiscalCode, "RSSMRA85T10A562A")];
        let chain = FilterChain::default();
        assert!(chain.apply(spans, text).is_empty());
    }

    #[test]
    fn test_valid_fiscal_code_marked() {
        let text = "CF RSSMRA85T10A562S del convenuto";
        let spans = vec![span_at(text, EntityKind::FiscalCode, "RSSMRA85T10A562S")];
        let out = FilterChain::default().apply(spans, text);
        assert_eq!(out.len(), 1);
        assert!(out[0].validation_passed);
    }

    #[test]
    fn test_legal_formula_drops_nearby_span() {
        let text = "Ai sensi dell'art. 2043 c.c., il danneggiante risponde.";
        let spans = vec![span_at(text, EntityKind::Date, "2043")];
        let out = FilterChain::default().apply(spans, text);
        assert!(out.is_empty());
    }

    #[test]
    fn test_person_near_formula_survives() {
        let text = "Ai sensi dell'art. 2043 c.c., Mario Rossi è responsabile.";
        let spans = vec![
            span_at(text, EntityKind::Date, "2043"),
            span_at(text, EntityKind::Person, "Mario Rossi"),
        ];
        let out = FilterChain::default().apply(spans, text);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, EntityKind::Person);
    }

    #[test]
    fn test_span_far_from_formula_survives() {
        let filler = "x".repeat(80);
        let text = format!("Visto il decreto. {} Mario Rossi è presente.", filler);
        let spans = vec![span_at(&text, EntityKind::Person, "Mario Rossi")];
        let out = FilterChain::default().apply(spans, &text);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_sensitivity_annotation() {
        let text = "CF RSSMRA85T10A562S per Acme S.r.l.";
        let spans = vec![
            span_at(text, EntityKind::FiscalCode, "RSSMRA85T10A562S"),
            span_at(text, EntityKind::Organization, "Acme S.r.l."),
        ];
        let out = FilterChain::default().apply(spans, text);
        assert_eq!(
            out[0].sensitivity,
            Some(crate::models::SensitivityLevel::High)
        );
        assert_eq!(
            out[1].sensitivity,
            Some(crate::models::SensitivityLevel::Low)
        );
    }

    #[test]
    fn test_unvalidated_kinds_pass_through() {
        let text = "Mario Rossi compare in giudizio";
        let spans = vec![span_at(text, EntityKind::Person, "Mario Rossi")];
        let out = FilterChain::default().apply(spans, text);
        assert_eq!(out.len(), 1);
        assert!(!out[0].validation_passed);
    }
}
