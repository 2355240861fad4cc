//! Document context classification from the opening window.
//!
//! Advisory only: the result is attached to pipeline metadata and may
//! inform filtering, but never drops an entity on its own.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{DocumentContext, DocumentKind, Jurisdiction};

/// Priority-ordered tag-phrase sets: the first kind whose phrase set
/// matches wins.
const KIND_PHRASES: &[(DocumentKind, &[&str], f64)] = &[
    (
        DocumentKind::Sentenza,
        &["sentenza", "corte", "tribunale", "giudice"],
        0.9,
    ),
    (
        DocumentKind::Contratto,
        &["contratto", "contraente", "clausola", "le parti convengono"],
        0.9,
    ),
    (
        DocumentKind::Ricorso,
        &["ricorso", "ricorrente", "resistente"],
        0.85,
    ),
    (
        DocumentKind::Citazione,
        &["atto di citazione", "citazione a comparire"],
        0.85,
    ),
    (DocumentKind::Verbale, &["verbale", "udienza"], 0.8),
    (DocumentKind::Parere, &["parere", "quesito"], 0.8),
    (DocumentKind::Atto, &["atto", "notaio", "rogito"], 0.75),
];

lazy_static! {
    static ref COURT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(Corte di Cassazione)").unwrap(),
        Regex::new(r"(Consiglio di Stato)").unwrap(),
        Regex::new(r"(Corte Costituzionale)").unwrap(),
        Regex::new(r"(Corte d['’][Aa]ppello di [A-Z][a-zàèéìòù]+)").unwrap(),
        Regex::new(r"(Tribunale di [A-Z][a-zàèéìòù]+)").unwrap(),
        Regex::new(r"(TAR\s+[A-Z][a-zàèéìòù]+)").unwrap(),
    ];
}

/// Classify the document from the first `window_chars` characters of the
/// normalized text.
pub fn classify(text: &str, window_chars: usize) -> DocumentContext {
    let window = head_chars(text, window_chars);
    let lowered = window.to_lowercase();

    let mut context = DocumentContext::default();

    for (kind, phrases, confidence) in KIND_PHRASES {
        if phrases.iter().any(|p| contains_word(&lowered, p)) {
            context.document_kind = *kind;
            context.confidence = *confidence;
            break;
        }
    }

    context.jurisdiction = detect_jurisdiction(&lowered);

    for pattern in COURT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(window) {
            context.court = Some(caps[1].to_string());
            break;
        }
    }

    context
}

fn detect_jurisdiction(lowered: &str) -> Option<Jurisdiction> {
    if contains_word(lowered, "penale") || lowered.contains("c.p.") {
        Some(Jurisdiction::Penale)
    } else if contains_word(lowered, "amministrativo")
        || contains_word(lowered, "tar")
        || lowered.contains("t.a.r.")
    {
        Some(Jurisdiction::Amministrativo)
    } else if contains_word(lowered, "civile") || lowered.contains("c.c.") {
        Some(Jurisdiction::Civile)
    } else {
        None
    }
}

/// Whole-word containment check; avoids `atto` matching inside
/// `contratto`.
fn contains_word(haystack: &str, phrase: &str) -> bool {
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(phrase) {
        let abs = search_from + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
        let after = abs + phrase.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(char::is_alphanumeric);
        if before_ok && after_ok {
            return true;
        }
        search_from = abs + phrase.len();
    }
    false
}

fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentenza_detection() {
        let ctx = classify(
            "REPUBBLICA ITALIANA. Il Tribunale di Milano, sezione civile, pronuncia la seguente sentenza.",
            2000,
        );
        assert_eq!(ctx.document_kind, DocumentKind::Sentenza);
        assert_eq!(ctx.confidence, 0.9);
        assert_eq!(ctx.jurisdiction, Some(Jurisdiction::Civile));
        assert_eq!(ctx.court.as_deref(), Some("Tribunale di Milano"));
    }

    #[test]
    fn test_contratto_not_mistaken_for_atto() {
        let ctx = classify("Il presente contratto di locazione tra le parti.", 2000);
        assert_eq!(ctx.document_kind, DocumentKind::Contratto);
    }

    #[test]
    fn test_unknown_document() {
        let ctx = classify("Nota spese del mese di marzo.", 2000);
        assert_eq!(ctx.document_kind, DocumentKind::Unknown);
        assert_eq!(ctx.confidence, 0.0);
        assert!(ctx.court.is_none());
    }

    #[test]
    fn test_penale_jurisdiction() {
        let ctx = classify("Sentenza penale della Corte di Cassazione.", 2000);
        assert_eq!(ctx.jurisdiction, Some(Jurisdiction::Penale));
        assert_eq!(ctx.court.as_deref(), Some("Corte di Cassazione"));
    }

    #[test]
    fn test_window_limits_classification() {
        // The word "sentenza" sits beyond the classification window.
        let mut text = "x".repeat(50);
        text.push_str(" sentenza del tribunale");
        let ctx = classify(&text, 40);
        assert_eq!(ctx.document_kind, DocumentKind::Unknown);
    }

    #[test]
    fn test_tar_court_capture() {
        let ctx = classify("Ricorso al TAR Lazio contro il provvedimento.", 2000);
        assert_eq!(ctx.document_kind, DocumentKind::Ricorso);
        assert_eq!(ctx.jurisdiction, Some(Jurisdiction::Amministrativo));
        assert_eq!(ctx.court.as_deref(), Some("TAR Lazio"));
    }
}
