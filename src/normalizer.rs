//! Text normalization applied before detection.
//!
//! Every span offset in the pipeline refers to the normalized text, so
//! normalization must be deterministic and idempotent:
//! `normalize(normalize(x)) == normalize(x)`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SPACES_TABS: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref TRAILING_SPACE: Regex = Regex::new(r" +\n").unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref ANY_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Lowercasing destroys proper-noun signal for NER; keep false for
    /// legal text.
    pub lowercase: bool,
    pub collapse_whitespace: bool,
    /// Unicode NFC.
    pub normalize_unicode: bool,
    pub preserve_newlines: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            lowercase: false,
            collapse_whitespace: true,
            normalize_unicode: true,
            preserve_newlines: true,
        }
    }
}

/// Normalize `text` for detection. Order: Unicode NFC first, then
/// whitespace handling, then trimming.
pub fn normalize(text: &str, options: &NormalizeOptions) -> String {
    let mut out = if options.normalize_unicode {
        text.nfc().collect::<String>()
    } else {
        text.to_string()
    };

    if options.collapse_whitespace {
        if options.preserve_newlines {
            out = out.replace("\r\n", "\n").replace('\r', "\n");
            out = SPACES_TABS.replace_all(&out, " ").into_owned();
            out = TRAILING_SPACE.replace_all(&out, "\n").into_owned();
            out = BLANK_LINES.replace_all(&out, "\n\n").into_owned();
        } else {
            out = ANY_WHITESPACE.replace_all(&out, " ").into_owned();
        }
    }

    let mut out = out.trim().to_string();

    if options.lowercase {
        out = out.to_lowercase();
    }

    out
}
