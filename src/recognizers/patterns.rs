//! Pattern-based recognizers: Codice Fiscale, Partita IVA and Italian
//! legal entities. Regex plus checksum validation where the kind has one.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use crate::models::{DetectedSpan, EntityKind};
use crate::validators;

lazy_static! {
    static ref CF_PATTERN: Regex =
        Regex::new(r"\b[A-Za-z]{6}\d{2}[A-Za-z]\d{2}[A-Za-z]\d{3}[A-Za-z]\b").unwrap();
    static ref PIVA_PATTERN: Regex = Regex::new(r"\b\d{11}\b").unwrap();
    static ref PIVA_CONTEXT: Regex =
        Regex::new(r"(?i)p\.?\s*iva|partita\s+iva|vat\s+number|vat\s*:").unwrap();
    static ref LEGAL_ENTITY_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"Corte di Cassazione").unwrap(),
        Regex::new(r"Corte Costituzionale").unwrap(),
        Regex::new(r"Consiglio di Stato").unwrap(),
        Regex::new(r"Corte d['’][Aa]ppello di [A-Z][a-zàèéìòù]+").unwrap(),
        Regex::new(r"Tribunale di [A-Z][a-zàèéìòù]+").unwrap(),
        Regex::new(r"TAR\s+[A-Z][a-zàèéìòù]+").unwrap(),
        Regex::new(r"Ministero (?:della|del|degli|delle) [A-Z][a-zàèéìòù]+(?: [A-Z][a-zàèéìòù]+)?")
            .unwrap(),
        Regex::new(r"Agenzia delle Entrate").unwrap(),
        Regex::new(r"\bINPS\b").unwrap(),
        Regex::new(r"\bINAIL\b").unwrap(),
        Regex::new(r"Guardia di Finanza").unwrap(),
    ];
}

const CF_CONFIDENCE: f64 = 0.95;
const PIVA_CONFIDENCE: f64 = 0.95;
const LEGAL_ENTITY_CONFIDENCE: f64 = 0.90;

/// Codice Fiscale recognizer with checksum validation. Candidates that
/// fail the checksum are not emitted at all.
pub struct CfRecognizer {
    recognizer_id: String,
}

impl CfRecognizer {
    pub fn new(recognizer_id: impl Into<String>) -> Self {
        Self {
            recognizer_id: recognizer_id.into(),
        }
    }

    pub fn detect(&self, text: &str) -> Vec<DetectedSpan> {
        let mut spans = Vec::new();
        for m in CF_PATTERN.find_iter(text) {
            let candidate = m.as_str().to_uppercase();
            if !validators::validate_fiscal_code(&candidate) {
                continue;
            }
            let mut span = DetectedSpan::new(
                EntityKind::FiscalCode,
                m.as_str(),
                m.start(),
                m.end(),
                CF_CONFIDENCE,
                self.recognizer_id.clone(),
            );
            span.validation_passed = true;
            span.metadata
                .insert("pattern".into(), json!("fiscal_code"));
            spans.push(span);
        }
        spans
    }
}

/// Partita IVA recognizer. Rejects leading zeros and failed checksums;
/// optionally requires a context keyword in the 50 chars before the match.
pub struct PivaRecognizer {
    recognizer_id: String,
    require_context: bool,
}

impl PivaRecognizer {
    pub fn new(recognizer_id: impl Into<String>, require_context: bool) -> Self {
        Self {
            recognizer_id: recognizer_id.into(),
            require_context,
        }
    }

    pub fn detect(&self, text: &str) -> Vec<DetectedSpan> {
        let mut spans = Vec::new();
        for m in PIVA_PATTERN.find_iter(text) {
            let candidate = m.as_str();
            if candidate.starts_with('0') {
                continue;
            }

            if self.require_context {
                let window_start = floor_char_boundary(text, m.start().saturating_sub(50));
                if !PIVA_CONTEXT.is_match(&text[window_start..m.start()]) {
                    continue;
                }
            }

            if !validators::validate_vat_number(candidate) {
                continue;
            }

            let mut span = DetectedSpan::new(
                EntityKind::VatNumber,
                candidate,
                m.start(),
                m.end(),
                PIVA_CONFIDENCE,
                self.recognizer_id.clone(),
            );
            span.validation_passed = true;
            span.metadata.insert("pattern".into(), json!("vat_number"));
            spans.push(span);
        }
        spans
    }
}

/// Courts, ministries and public authorities, emitted as ORGANIZATION.
pub struct LegalEntityRecognizer {
    recognizer_id: String,
}

impl LegalEntityRecognizer {
    pub fn new(recognizer_id: impl Into<String>) -> Self {
        Self {
            recognizer_id: recognizer_id.into(),
        }
    }

    pub fn detect(&self, text: &str) -> Vec<DetectedSpan> {
        let mut spans = Vec::new();
        for pattern in LEGAL_ENTITY_PATTERNS.iter() {
            for m in pattern.find_iter(text) {
                let mut span = DetectedSpan::new(
                    EntityKind::Organization,
                    m.as_str(),
                    m.start(),
                    m.end(),
                    LEGAL_ENTITY_CONFIDENCE,
                    self.recognizer_id.clone(),
                );
                span.metadata
                    .insert("pattern".into(), json!("legal_entity"));
                spans.push(span);
            }
        }
        spans
    }
}

/// Contact identifiers: email, Italian phone numbers and IBAN. Phone and
/// IBAN candidates are checksum/format-validated before emission; a bare
/// 11-digit number is left to the P.IVA recognizer.
pub struct ContactRecognizer {
    recognizer_id: String,
}

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_PATTERN: Regex = Regex::new(
        r"(?:\+39|0039)[\s.]?\d{2,3}[\s.]?\d{6,7}\b|\b3\d{2}[\s\-.]\d{6,7}\b|\b0\d{1,3}[\s\-./]\d{6,8}\b"
    )
    .unwrap();
    static ref IBAN_PATTERN: Regex = Regex::new(r"\b[A-Z]{2}\d{2}[A-Za-z0-9]{11,30}\b").unwrap();
}

impl ContactRecognizer {
    pub fn new(recognizer_id: impl Into<String>) -> Self {
        Self {
            recognizer_id: recognizer_id.into(),
        }
    }

    pub fn detect(&self, text: &str) -> Vec<DetectedSpan> {
        let mut spans = Vec::new();

        for m in EMAIL_PATTERN.find_iter(text) {
            let mut span = DetectedSpan::new(
                EntityKind::Email,
                m.as_str(),
                m.start(),
                m.end(),
                1.0,
                self.recognizer_id.clone(),
            );
            span.validation_passed = validators::validate_email(m.as_str());
            spans.push(span);
        }

        for m in PHONE_PATTERN.find_iter(text) {
            if !validators::validate_italian_phone(m.as_str()) {
                continue;
            }
            let mut span = DetectedSpan::new(
                EntityKind::Phone,
                m.as_str(),
                m.start(),
                m.end(),
                0.95,
                self.recognizer_id.clone(),
            );
            span.validation_passed = true;
            spans.push(span);
        }

        for m in IBAN_PATTERN.find_iter(text) {
            if !validators::validate_iban(m.as_str()) {
                continue;
            }
            let mut span = DetectedSpan::new(
                EntityKind::Iban,
                m.as_str(),
                m.start(),
                m.end(),
                0.95,
                self.recognizer_id.clone(),
            );
            span.validation_passed = true;
            spans.push(span);
        }

        spans
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
