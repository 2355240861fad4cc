//! Replacement strategies for PII anonymization.
//!
//! Four base strategies (deterministic indexed, synthetic fake data,
//! labelled redaction, salted hash) behind one trait, plus the consistency
//! wrapper guaranteeing same-surface-form → same-placeholder within a
//! document. Strategy instances hold per-document state and must never be
//! shared across concurrent document tasks; allocate one per document.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::models::{DetectedSpan, EntityKind};
use crate::rewriter;

/// Default seed for the synthetic generator when none is configured.
const DEFAULT_SYNTHETIC_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Deterministic,
    Synthetic,
    Redaction,
    Hash,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Deterministic => "deterministic",
            StrategyKind::Synthetic => "synthetic",
            StrategyKind::Redaction => "redaction",
            StrategyKind::Hash => "hash",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "deterministic" => Some(StrategyKind::Deterministic),
            "synthetic" => Some(StrategyKind::Synthetic),
            "redaction" | "redact" => Some(StrategyKind::Redaction),
            "hash" => Some(StrategyKind::Hash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

/// Configuration shared by the factory and the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementConfig {
    pub strategy: StrategyKind,
    /// Wrap the base strategy so repeated mentions map to one placeholder.
    pub consistent: bool,
    pub deterministic_template: String,
    pub use_letters_for_names: bool,
    pub synthetic_locale: String,
    pub synthetic_seed: Option<u64>,
    pub redaction_template: String,
    pub hash_algorithm: HashAlgorithm,
    pub hash_salt: Option<String>,
    pub hash_truncate: Option<usize>,
    pub hash_prefix: String,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Deterministic,
            consistent: true,
            deterministic_template: "{kind}_{index}".to_string(),
            use_letters_for_names: true,
            synthetic_locale: "it_IT".to_string(),
            synthetic_seed: None,
            redaction_template: "[{label}]".to_string(),
            hash_algorithm: HashAlgorithm::Sha256,
            hash_salt: None,
            hash_truncate: Some(16),
            hash_prefix: "HASH_".to_string(),
        }
    }
}

/// Anonymized text together with the placeholder chosen for each input
/// span (aligned to the input order, for audit records).
#[derive(Debug, Clone)]
pub struct AnonymizedText {
    pub text: String,
    pub replacements: Vec<String>,
}

/// A replacement strategy produces one placeholder per span.
///
/// `replace_all` resets per-document state first, assigns placeholders in
/// document order (ascending start), and splices them walking descending
/// start order so earlier offsets stay valid.
pub trait ReplacementStrategy: Send {
    fn name(&self) -> &'static str;

    /// Clear per-document state (counters, consistency maps, RNG).
    fn reset(&mut self) {}

    fn replace_one(&mut self, span: &DetectedSpan) -> String;

    fn replace_all(&mut self, text: &str, spans: &[DetectedSpan]) -> AnonymizedText {
        self.reset();

        let mut order: Vec<usize> = (0..spans.len()).collect();
        order.sort_by_key(|&i| spans[i].start);

        let mut replacements = vec![String::new(); spans.len()];
        for i in order {
            replacements[i] = self.replace_one(&spans[i]);
        }

        AnonymizedText {
            text: rewriter::apply_replacements(text, spans, &replacements),
            replacements,
        }
    }
}

// ---------------------------------------------------------------------------
// Deterministic
// ---------------------------------------------------------------------------

/// `PERSON_A`, `PERSON_B`, `FISCAL_CODE_1`, ... with per-kind monotonic
/// counters.
pub struct DeterministicStrategy {
    template: String,
    use_letters_for_names: bool,
    counters: HashMap<EntityKind, u64>,
}

impl DeterministicStrategy {
    pub fn new(template: impl Into<String>, use_letters_for_names: bool) -> Self {
        Self {
            template: template.into(),
            use_letters_for_names,
            counters: HashMap::new(),
        }
    }

    fn render_index(&self, kind: EntityKind, index: u64) -> String {
        let lettered = self.use_letters_for_names
            && matches!(kind, EntityKind::Person | EntityKind::Organization);
        if lettered && index <= 26 {
            char::from(b'A' + (index - 1) as u8).to_string()
        } else {
            index.to_string()
        }
    }
}

impl ReplacementStrategy for DeterministicStrategy {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn reset(&mut self) {
        self.counters.clear();
    }

    fn replace_one(&mut self, span: &DetectedSpan) -> String {
        let counter = self.counters.entry(span.kind).or_insert(0);
        *counter += 1;
        let current = *counter;
        let index = self.render_index(span.kind, current);
        self.template
            .replace("{kind}", span.kind.as_tag())
            .replace("{index}", &index)
    }
}

// ---------------------------------------------------------------------------
// Synthetic
// ---------------------------------------------------------------------------

const MALE_FIRST_NAMES: &[&str] = &[
    "Marco", "Luca", "Andrea", "Francesco", "Alessandro", "Giuseppe", "Antonio", "Paolo",
    "Stefano", "Roberto", "Davide", "Matteo",
];
const FEMALE_FIRST_NAMES: &[&str] = &[
    "Giulia", "Francesca", "Chiara", "Federica", "Sara", "Martina", "Valentina", "Elena",
    "Laura", "Anna", "Silvia", "Paola",
];
const LAST_NAMES: &[&str] = &[
    "Ferrari", "Esposito", "Bianchi", "Romano", "Colombo", "Ricci", "Marino", "Greco", "Bruno",
    "Gallo", "Conti", "Mancini", "Costa", "Giordano", "Rizzo",
];
const CITIES: &[&str] = &[
    "Milano", "Roma", "Napoli", "Torino", "Palermo", "Genova", "Bologna", "Firenze", "Bari",
    "Catania", "Venezia", "Verona", "Padova", "Trieste", "Brescia",
];
const COMPANY_WORDS: &[&str] = &[
    "Edil", "Tecno", "Agri", "Termo", "Idro", "Elettro", "Logistica", "Meccanica", "Servizi",
    "Consulting",
];
const COMPANY_SUFFIXES: &[&str] = &["S.r.l.", "S.p.A.", "S.n.c.", "S.a.s."];
const STREETS: &[&str] = &[
    "Garibaldi", "Mazzini", "Cavour", "Dante", "Verdi", "Manzoni", "Leopardi", "Marconi",
    "Galilei", "Colombo",
];
const EMAIL_DOMAINS: &[&str] = &["esempio.it", "posta.it", "studiolegale.it", "azienda.it"];

/// Plausible fake data generated from a seeded RNG; `reset` re-seeds, so a
/// document always produces the same synthetic values.
pub struct SyntheticStrategy {
    locale: String,
    seed: u64,
    rng: StdRng,
}

impl SyntheticStrategy {
    pub fn new(locale: impl Into<String>, seed: Option<u64>) -> Self {
        let locale = locale.into();
        if locale != "it_IT" {
            tracing::warn!(locale = %locale, "only it_IT synthetic data is available, using italian tables");
        }
        let seed = seed.unwrap_or(DEFAULT_SYNTHETIC_SEED);
        Self {
            locale,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.gen_range(0..items.len())]
    }

    fn fake_person(&mut self, original: &str) -> String {
        // Best-effort gender heuristic on the final vowel of the last token.
        let last_token = original.split_whitespace().last().unwrap_or("");
        let first = if last_token.ends_with('a') {
            self.pick(FEMALE_FIRST_NAMES)
        } else if last_token.ends_with('o') {
            self.pick(MALE_FIRST_NAMES)
        } else if self.rng.gen_bool(0.5) {
            self.pick(MALE_FIRST_NAMES)
        } else {
            self.pick(FEMALE_FIRST_NAMES)
        };
        format!("{} {}", first, self.pick(LAST_NAMES))
    }

    fn fake_fiscal_code(&mut self) -> String {
        let mut out = String::with_capacity(16);
        for _ in 0..6 {
            out.push(self.random_letter());
        }
        out.push_str(&format!("{:02}", self.rng.gen_range(50..99)));
        out.push(self.random_letter());
        out.push_str(&format!("{:02}", self.rng.gen_range(1..29)));
        out.push(self.random_letter());
        out.push_str(&format!("{:03}", self.rng.gen_range(1..999)));
        out.push(self.random_letter());
        out
    }

    fn random_letter(&mut self) -> char {
        char::from(b'A' + self.rng.gen_range(0..26u8))
    }

    fn random_alphanumeric(&mut self, len: usize) -> String {
        const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        (0..len)
            .map(|_| char::from(ALPHABET[self.rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}

impl ReplacementStrategy for SyntheticStrategy {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn replace_one(&mut self, span: &DetectedSpan) -> String {
        match span.kind {
            EntityKind::Person | EntityKind::Judge | EntityKind::Lawyer => {
                self.fake_person(&span.text)
            }
            EntityKind::Organization | EntityKind::Court => format!(
                "{}{} {}",
                self.pick(COMPANY_WORDS),
                self.pick(COMPANY_WORDS).to_lowercase(),
                self.pick(COMPANY_SUFFIXES)
            ),
            EntityKind::Address => {
                let number = self.rng.gen_range(1..120);
                format!(
                    "Via {} {}, {}",
                    self.pick(STREETS),
                    number,
                    self.pick(CITIES)
                )
            }
            EntityKind::Email => {
                let first = self.pick(MALE_FIRST_NAMES).to_lowercase();
                let last = self.pick(LAST_NAMES).to_lowercase();
                format!("{}.{}@{}", first, last, self.pick(EMAIL_DOMAINS))
            }
            EntityKind::Phone => format!(
                "+39 3{}{} {:07}",
                self.rng.gen_range(0..10),
                self.rng.gen_range(0..10),
                self.rng.gen_range(0..10_000_000)
            ),
            EntityKind::FiscalCode => self.fake_fiscal_code(),
            EntityKind::VatNumber => format!(
                "{}{:010}",
                self.rng.gen_range(1..10),
                self.rng.gen_range(0u64..10_000_000_000)
            ),
            EntityKind::Location => self.pick(CITIES).to_string(),
            EntityKind::Date => format!(
                "{:02}/{:02}/{}",
                self.rng.gen_range(1..29),
                self.rng.gen_range(1..13),
                self.rng.gen_range(1950..2006)
            ),
            EntityKind::Iban => {
                let mut iban = format!("IT{:02}{}", self.rng.gen_range(2..99), self.random_letter());
                for _ in 0..22 {
                    iban.push(char::from(b'0' + self.rng.gen_range(0..10u8)));
                }
                iban
            }
            _ => self.random_alphanumeric(span.text.chars().count()),
        }
    }
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

/// `[NOME]`, `[CODICE_FISCALE]`, ... with locale-specific labels.
pub struct RedactionStrategy {
    template: String,
}

impl RedactionStrategy {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Italian redaction label for an entity kind.
    pub fn label(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Person => "NOME",
            EntityKind::Organization => "ORGANIZZAZIONE",
            EntityKind::Location => "LUOGO",
            EntityKind::Date => "DATA",
            EntityKind::FiscalCode => "CODICE_FISCALE",
            EntityKind::VatNumber => "PARTITA_IVA",
            EntityKind::Email => "EMAIL",
            EntityKind::Phone => "TELEFONO",
            EntityKind::Address => "INDIRIZZO",
            EntityKind::Court => "TRIBUNALE",
            EntityKind::Judge => "GIUDICE",
            EntityKind::Lawyer => "AVVOCATO",
            EntityKind::IdCard => "CARTA_IDENTITA",
            EntityKind::Passport => "PASSAPORTO",
            EntityKind::Iban => "IBAN",
            EntityKind::Other => "DATO",
        }
    }
}

impl ReplacementStrategy for RedactionStrategy {
    fn name(&self) -> &'static str {
        "redaction"
    }

    fn replace_one(&mut self, span: &DetectedSpan) -> String {
        self.template.replace("{label}", Self::label(span.kind))
    }
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// Salted hash of the span text, truncated. No collision handling:
/// acceptable for this domain.
pub struct HashStrategy {
    algorithm: HashAlgorithm,
    salt: String,
    truncate: Option<usize>,
    prefix: String,
}

impl HashStrategy {
    pub fn new(
        algorithm: HashAlgorithm,
        salt: Option<String>,
        truncate: Option<usize>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            algorithm,
            salt: salt.unwrap_or_default(),
            truncate,
            prefix: prefix.into(),
        }
    }

    fn digest(&self, input: &str) -> String {
        match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(input.as_bytes());
                hex::encode(hasher.finalize())
            }
            HashAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(input.as_bytes());
                hex::encode(hasher.finalize())
            }
            HashAlgorithm::Md5 => format!("{:x}", md5::compute(input.as_bytes())),
        }
    }
}

impl ReplacementStrategy for HashStrategy {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn replace_one(&mut self, span: &DetectedSpan) -> String {
        let salted = format!("{}{}", span.text, self.salt);
        let mut digest = self.digest(&salted);
        if let Some(n) = self.truncate {
            digest.truncate(n);
        }
        format!("{}{}", self.prefix, digest)
    }
}

// ---------------------------------------------------------------------------
// Consistency wrapper
// ---------------------------------------------------------------------------

/// Wraps a base strategy with a `(kind, casefolded text) -> placeholder`
/// map populated on first occurrence and hit on every repeat within one
/// document. The wrapper owns the per-document reset.
pub struct ConsistentStrategy<S: ReplacementStrategy> {
    inner: S,
    assigned: HashMap<(EntityKind, String), String>,
}

impl<S: ReplacementStrategy> ConsistentStrategy<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            assigned: HashMap::new(),
        }
    }
}

impl<S: ReplacementStrategy> ReplacementStrategy for ConsistentStrategy<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn reset(&mut self) {
        self.assigned.clear();
        self.inner.reset();
    }

    fn replace_one(&mut self, span: &DetectedSpan) -> String {
        let key = (span.kind, span.text.to_lowercase());
        if let Some(existing) = self.assigned.get(&key) {
            return existing.clone();
        }
        let placeholder = self.inner.replace_one(span);
        self.assigned.insert(key, placeholder.clone());
        placeholder
    }
}

/// Build the configured strategy, wrapped for consistency when requested.
pub fn create_strategy(config: &ReplacementConfig) -> Box<dyn ReplacementStrategy> {
    macro_rules! wrap {
        ($base:expr) => {
            if config.consistent {
                Box::new(ConsistentStrategy::new($base)) as Box<dyn ReplacementStrategy>
            } else {
                Box::new($base) as Box<dyn ReplacementStrategy>
            }
        };
    }

    match config.strategy {
        StrategyKind::Deterministic => wrap!(DeterministicStrategy::new(
            config.deterministic_template.clone(),
            config.use_letters_for_names,
        )),
        StrategyKind::Synthetic => wrap!(SyntheticStrategy::new(
            config.synthetic_locale.clone(),
            config.synthetic_seed,
        )),
        StrategyKind::Redaction => wrap!(RedactionStrategy::new(config.redaction_template.clone())),
        StrategyKind::Hash => wrap!(HashStrategy::new(
            config.hash_algorithm,
            config.hash_salt.clone(),
            config.hash_truncate,
            config.hash_prefix.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(text: &str, kind: EntityKind, needle: &str, nth: usize) -> DetectedSpan {
        let start = text
            .match_indices(needle)
            .nth(nth)
            .map(|(i, _)| i)
            .expect("needle present");
        DetectedSpan::new(kind, needle, start, start + needle.len(), 0.9, "test")
    }

    #[test]
    fn test_deterministic_letters_for_names() {
        let mut strategy = DeterministicStrategy::new("{kind}_{index}", true);
        let text = "Mario Rossi, RSSMRA85T10A562S, Luca Bianchi";
        let spans = vec![
            span_at(text, EntityKind::Person, "Mario Rossi", 0),
            span_at(text, EntityKind::FiscalCode, "RSSMRA85T10A562S", 0),
            span_at(text, EntityKind::Person, "Luca Bianchi", 0),
        ];
        let out = strategy.replace_all(text, &spans);
        assert_eq!(out.text, "PERSON_A, FISCAL_CODE_1, PERSON_B");
        assert_eq!(out.replacements, vec!["PERSON_A", "FISCAL_CODE_1", "PERSON_B"]);
    }

    #[test]
    fn test_deterministic_decimal_after_z() {
        let mut strategy = DeterministicStrategy::new("{kind}_{index}", true);
        for i in 1..=26 {
            let span = DetectedSpan::new(EntityKind::Person, "x", 0, 1, 0.9, "test");
            let placeholder = strategy.replace_one(&span);
            let expected = char::from(b'A' + (i - 1) as u8).to_string();
            assert_eq!(placeholder, format!("PERSON_{}", expected));
        }
        let span = DetectedSpan::new(EntityKind::Person, "x", 0, 1, 0.9, "test");
        assert_eq!(strategy.replace_one(&span), "PERSON_27");
    }

    #[test]
    fn test_deterministic_counters_reset_per_document() {
        let mut strategy = DeterministicStrategy::new("{kind}_{index}", true);
        let text = "Mario Rossi";
        let spans = vec![span_at(text, EntityKind::Person, "Mario Rossi", 0)];
        let first = strategy.replace_all(text, &spans);
        let second = strategy.replace_all(text, &spans);
        assert_eq!(first.text, second.text);
        assert_eq!(first.text, "PERSON_A");
    }

    #[test]
    fn test_consistency_within_document() {
        let mut strategy =
            ConsistentStrategy::new(DeterministicStrategy::new("{kind}_{index}", true));
        let text = "Mario Rossi ha incontrato Mario Rossi.";
        let spans = vec![
            span_at(text, EntityKind::Person, "Mario Rossi", 0),
            span_at(text, EntityKind::Person, "Mario Rossi", 1),
        ];
        let out = strategy.replace_all(text, &spans);
        assert_eq!(out.text, "PERSON_A ha incontrato PERSON_A.");
    }

    #[test]
    fn test_consistency_is_casefolded() {
        let mut strategy =
            ConsistentStrategy::new(DeterministicStrategy::new("{kind}_{index}", true));
        let text = "MARIO ROSSI e Mario Rossi";
        let spans = vec![
            span_at(text, EntityKind::Person, "MARIO ROSSI", 0),
            span_at(text, EntityKind::Person, "Mario Rossi", 0),
        ];
        let out = strategy.replace_all(text, &spans);
        assert_eq!(out.text, "PERSON_A e PERSON_A");
    }

    #[test]
    fn test_consistency_resets_between_documents() {
        let mut strategy =
            ConsistentStrategy::new(DeterministicStrategy::new("{kind}_{index}", true));
        let text = "Luca Bianchi";
        let spans = vec![span_at(text, EntityKind::Person, "Luca Bianchi", 0)];
        assert_eq!(strategy.replace_all(text, &spans).text, "PERSON_A");

        let text2 = "Anna Verdi";
        let spans2 = vec![span_at(text2, EntityKind::Person, "Anna Verdi", 0)];
        assert_eq!(strategy.replace_all(text2, &spans2).text, "PERSON_A");
    }

    #[test]
    fn test_redaction_labels() {
        let mut strategy = RedactionStrategy::new("[{label}]");
        let span = DetectedSpan::new(EntityKind::FiscalCode, "x", 0, 1, 0.9, "test");
        assert_eq!(strategy.replace_one(&span), "[CODICE_FISCALE]");
        let span = DetectedSpan::new(EntityKind::Person, "x", 0, 1, 0.9, "test");
        assert_eq!(strategy.replace_one(&span), "[NOME]");
    }

    #[test]
    fn test_hash_truncation_and_prefix() {
        let mut strategy =
            HashStrategy::new(HashAlgorithm::Sha256, Some("salt".into()), Some(16), "HASH_");
        let span = DetectedSpan::new(EntityKind::Person, "Mario Rossi", 0, 11, 0.9, "test");
        let out = strategy.replace_one(&span);
        assert!(out.starts_with("HASH_"));
        assert_eq!(out.len(), "HASH_".len() + 16);

        // Deterministic for the same input and salt.
        assert_eq!(out, strategy.replace_one(&span));
    }

    #[test]
    fn test_hash_full_digest_when_untruncated() {
        let mut strategy = HashStrategy::new(HashAlgorithm::Md5, None, None, "HASH_");
        let span = DetectedSpan::new(EntityKind::Person, "x", 0, 1, 0.9, "test");
        let out = strategy.replace_one(&span);
        assert_eq!(out.len(), "HASH_".len() + 32);
    }

    #[test]
    fn test_synthetic_is_seeded_and_repeatable() {
        let text = "Mario Rossi, CF RSSMRA85T10A562S";
        let spans = vec![
            span_at(text, EntityKind::Person, "Mario Rossi", 0),
            span_at(text, EntityKind::FiscalCode, "RSSMRA85T10A562S", 0),
        ];
        let mut a = SyntheticStrategy::new("it_IT", Some(7));
        let mut b = SyntheticStrategy::new("it_IT", Some(7));
        assert_eq!(a.replace_all(text, &spans).text, b.replace_all(text, &spans).text);
    }

    #[test]
    fn test_synthetic_fiscal_code_shape() {
        let mut strategy = SyntheticStrategy::new("it_IT", None);
        let span = DetectedSpan::new(EntityKind::FiscalCode, "x", 0, 1, 0.9, "test");
        let fake = strategy.replace_one(&span);
        let shape = regex::Regex::new(r"^[A-Z]{6}\d{2}[A-Z]\d{2}[A-Z]\d{3}[A-Z]$").unwrap();
        assert!(shape.is_match(&fake), "unexpected shape: {}", fake);
    }

    #[test]
    fn test_synthetic_gender_heuristic() {
        let mut strategy = SyntheticStrategy::new("it_IT", Some(3));
        let span = DetectedSpan::new(EntityKind::Person, "Maria Urso", 0, 10, 0.9, "test");
        let fake = strategy.replace_one(&span);
        let first = fake.split_whitespace().next().unwrap();
        assert!(MALE_FIRST_NAMES.contains(&first), "'Urso' ends in o: {}", fake);
    }

    #[test]
    fn test_synthetic_other_preserves_length() {
        let mut strategy = SyntheticStrategy::new("it_IT", None);
        let span = DetectedSpan::new(EntityKind::Other, "abcdefgh", 0, 8, 0.9, "test");
        assert_eq!(strategy.replace_one(&span).chars().count(), 8);
    }

    #[test]
    fn test_factory_respects_consistency_flag() {
        let config = ReplacementConfig::default();
        let mut strategy = create_strategy(&config);
        assert_eq!(strategy.name(), "deterministic");

        let text = "Mario Rossi e Mario Rossi";
        let spans = vec![
            span_at(text, EntityKind::Person, "Mario Rossi", 0),
            span_at(text, EntityKind::Person, "Mario Rossi", 1),
        ];
        let out = strategy.replace_all(text, &spans);
        assert_eq!(out.text, "PERSON_A e PERSON_A");
    }
}
