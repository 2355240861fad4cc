//! Supported languages and statistical language detection.

use serde::{Deserialize, Serialize};

/// Languages with PII recognizers available. Italian is the default for
/// legal documents and the fallback for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    It,
    En,
    Fr,
    De,
    Es,
    Pt,
}

pub const DEFAULT_LANGUAGE: Language = Language::It;

/// Detection below this length is unreliable; skip it and default to
/// Italian.
const MIN_DETECTION_CHARS: usize = 20;

impl Language {
    pub const ALL: [Language; 6] = [
        Language::It,
        Language::En,
        Language::Fr,
        Language::De,
        Language::Es,
        Language::Pt,
    ];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::It => "it",
            Language::En => "en",
            Language::Fr => "fr",
            Language::De => "de",
            Language::Es => "es",
            Language::Pt => "pt",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "it" => Some(Language::It),
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            "de" => Some(Language::De),
            "es" => Some(Language::Es),
            "pt" => Some(Language::Pt),
            _ => None,
        }
    }

    /// Stable identity of the NER model bound to this language.
    pub fn ner_model(&self) -> &'static str {
        match self {
            Language::It => "it_core_news_lg",
            Language::En => "en_core_web_lg",
            Language::Fr => "fr_core_news_lg",
            Language::De => "de_core_news_lg",
            Language::Es => "es_core_news_lg",
            Language::Pt => "pt_core_news_lg",
        }
    }
}

/// Outcome of language detection; `fallback` is true whenever the detector
/// could not produce a supported language and Italian was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedLanguage {
    pub language: Language,
    pub fallback: bool,
}

/// Detect the document language with the short-text guard and Italian
/// fallback. Never fails.
pub fn detect_language(text: &str) -> DetectedLanguage {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_DETECTION_CHARS {
        tracing::debug!(
            text_length = trimmed.len(),
            "text too short for language detection, defaulting to italian"
        );
        return DetectedLanguage {
            language: DEFAULT_LANGUAGE,
            fallback: true,
        };
    }

    match whatlang::detect(trimmed) {
        Some(info) => {
            let language = match info.lang() {
                whatlang::Lang::Ita => Some(Language::It),
                whatlang::Lang::Eng => Some(Language::En),
                whatlang::Lang::Fra => Some(Language::Fr),
                whatlang::Lang::Deu => Some(Language::De),
                whatlang::Lang::Spa => Some(Language::Es),
                whatlang::Lang::Por => Some(Language::Pt),
                _ => None,
            };
            match language {
                Some(language) => DetectedLanguage {
                    language,
                    fallback: false,
                },
                None => {
                    tracing::warn!(
                        detected = info.lang().code(),
                        "detected unsupported language, falling back to italian"
                    );
                    DetectedLanguage {
                        language: DEFAULT_LANGUAGE,
                        fallback: true,
                    }
                }
            }
        }
        None => DetectedLanguage {
            language: DEFAULT_LANGUAGE,
            fallback: true,
        },
    }
}
