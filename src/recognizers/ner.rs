//! NER model runners.
//!
//! Each supported language binds to a named model identity
//! (`it_core_news_lg`, ...). Inference is pattern- and gazetteer-based:
//! title-prefixed names, capitalized bigrams with stopword and
//! false-positive screening, organization suffixes and date shapes.
//! Models are long-lived and read-only after load; the Italian model loads
//! eagerly at registry construction, others lazily on first use. Inference
//! is CPU-bound and must be dispatched through `spawn_blocking` by the
//! caller.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::language::Language;

/// A raw model prediction carrying the model's native tag. Tags are mapped
/// to canonical kinds by the engine; unmappable tags are dropped there.
#[derive(Debug, Clone)]
pub struct NativeEntity {
    pub tag: &'static str,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

lazy_static! {
    static ref NAME_PATTERN: Regex =
        Regex::new(r"\b\p{Lu}\p{Ll}+(?:\s\p{Lu}\.)?\s\p{Lu}\p{Ll}+\b").unwrap();
    static ref NUMERIC_DATE: Regex = Regex::new(r"\b\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}\b").unwrap();
    static ref BARE_YEAR: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").unwrap();
    static ref ACRONYM: Regex = Regex::new(r"\b[A-Z]{3,5}\b").unwrap();
}

struct LanguagePack {
    titles: &'static str,
    months: &'static str,
    org_suffixes: &'static str,
    stopwords: &'static [&'static str],
    false_positives: &'static [&'static str],
    cities: &'static [&'static str],
}

fn language_pack(language: Language) -> LanguagePack {
    match language {
        Language::It => LanguagePack {
            titles: r"Dott\.ssa|Dott\.|Dr\.|Avv\.|Sig\.ra|Sig\.|Ing\.|Prof\.|Geom\.|On\.",
            months: "gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre",
            org_suffixes: r"S\.?r\.?l\.?|S\.?p\.?[Aa]\.?|S\.?n\.?c\.?|S\.?a\.?s\.?|S\.?c\.?a\.?r\.?l\.?",
            stopwords: &[
                "Il", "Lo", "La", "Le", "Gli", "Un", "Una", "Uno", "Nel", "Nella", "Del", "Della",
                "Dei", "Delle", "Dal", "Dalla", "Al", "Alla", "Ai", "Agli", "Alle", "Sul", "Sulla",
                "Con", "Per", "Tra", "Fra", "Che", "Chi", "Come", "Dove", "Quando", "Non", "Se",
                "Ogni", "Questo", "Questa", "Art", "Artt", "Visto", "Vista",
            ],
            false_positives: &[
                "Repubblica Italiana",
                "Corte Costituzionale",
                "Corte Suprema",
                "Stato Italiano",
                "Unione Europea",
                "Gazzetta Ufficiale",
                "Codice Civile",
                "Codice Penale",
                "Pubblico Ministero",
            ],
            cities: &[
                "Milano", "Roma", "Napoli", "Torino", "Palermo", "Genova", "Bologna", "Firenze",
                "Bari", "Catania", "Venezia", "Verona", "Padova", "Trieste", "Brescia", "Bergamo",
                "Modena", "Parma", "Perugia", "Cagliari",
            ],
        },
        Language::En => LanguagePack {
            titles: r"Mr\.|Mrs\.|Ms\.|Dr\.|Prof\.|Judge|Attorney",
            months: "january|february|march|april|may|june|july|august|september|october|november|december",
            org_suffixes: r"Inc\.?|LLC|LLP|Corp\.?|Corporation|Company|Ltd\.?|Limited|Group",
            stopwords: &[
                "The", "This", "That", "These", "Those", "First", "Second", "Third", "New", "Any",
                "Each", "United", "Supreme", "Federal", "District",
            ],
            false_positives: &[
                "United States", "Supreme Court", "District Court", "Federal Court",
                "First Amendment", "New York", "Los Angeles",
            ],
            cities: &["London", "Manchester", "Birmingham", "Leeds", "Liverpool"],
        },
        Language::Fr => LanguagePack {
            titles: r"M\.|Mme|Me|Dr|Prof\.",
            months: "janvier|février|mars|avril|mai|juin|juillet|août|septembre|octobre|novembre|décembre",
            org_suffixes: r"SARL|SAS|SA|SNC|EURL",
            stopwords: &["Le", "La", "Les", "Un", "Une", "Des", "Du", "De", "Ce", "Cette"],
            false_positives: &["République Française", "Cour de Cassation"],
            cities: &["Paris", "Lyon", "Marseille", "Toulouse", "Bordeaux"],
        },
        Language::De => LanguagePack {
            titles: r"Herr|Frau|Dr\.|Prof\.",
            months: "januar|februar|märz|april|mai|juni|juli|august|september|oktober|november|dezember",
            org_suffixes: r"GmbH|AG|KG|OHG|e\.V\.",
            stopwords: &["Der", "Die", "Das", "Ein", "Eine", "Dem", "Den", "Des"],
            false_positives: &["Bundesrepublik Deutschland", "Bundesgerichtshof"],
            cities: &["Berlin", "Hamburg", "München", "Köln", "Frankfurt"],
        },
        Language::Es => LanguagePack {
            titles: r"Sr\.|Sra\.|Dr\.|Dra\.|Lic\.",
            months: "enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre",
            org_suffixes: r"S\.?L\.?|S\.?A\.?|S\.?L\.?U\.?",
            stopwords: &["El", "La", "Los", "Las", "Un", "Una", "Este", "Esta"],
            false_positives: &["Tribunal Supremo", "Reino de España"],
            cities: &["Madrid", "Barcelona", "Valencia", "Sevilla", "Bilbao"],
        },
        Language::Pt => LanguagePack {
            titles: r"Sr\.|Sra\.|Dr\.|Dra\.|Prof\.",
            months: "janeiro|fevereiro|março|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro",
            org_suffixes: r"Lda\.?|S\.?A\.?|Unipessoal",
            stopwords: &["O", "A", "Os", "As", "Um", "Uma", "Este", "Esta"],
            false_positives: &["República Portuguesa", "Supremo Tribunal"],
            cities: &["Lisboa", "Porto", "Braga", "Coimbra", "Faro"],
        },
    }
}

/// One loaded NER model. Read-only after construction; shared freely.
#[derive(Debug)]
pub struct NerModel {
    language: Language,
    model_id: &'static str,
    base_confidence: f64,
    title_pattern: Regex,
    org_pattern: Regex,
    month_date_pattern: Regex,
    stopwords: &'static [&'static str],
    false_positives: &'static [&'static str],
    cities: &'static [&'static str],
}

impl NerModel {
    fn load(language: Language, base_confidence: f64) -> Result<Self, PipelineError> {
        let pack = language_pack(language);

        let title_pattern = Regex::new(&format!(
            r"(?:{})\s+(\p{{Lu}}\p{{Ll}}+(?:\s\p{{Lu}}\p{{Ll}}+)?)",
            pack.titles
        ))
        .map_err(|e| PipelineError::ModelLoad {
            language: language.code().to_string(),
            reason: e.to_string(),
        })?;

        let org_pattern = Regex::new(&format!(
            r"\b\p{{Lu}}[\p{{L}}&.]*(?:\s\p{{Lu}}[\p{{L}}&.]*){{0,3}}\s(?:{})",
            pack.org_suffixes
        ))
        .map_err(|e| PipelineError::ModelLoad {
            language: language.code().to_string(),
            reason: e.to_string(),
        })?;

        let month_date_pattern = Regex::new(&format!(
            r"(?i)\b\d{{1,2}}°?\s(?:{})\s\d{{4}}\b",
            pack.months
        ))
        .map_err(|e| PipelineError::ModelLoad {
            language: language.code().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            language,
            model_id: language.ner_model(),
            base_confidence,
            title_pattern,
            org_pattern,
            month_date_pattern,
            stopwords: pack.stopwords,
            false_positives: pack.false_positives,
            cities: pack.cities,
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn model_id(&self) -> &'static str {
        self.model_id
    }

    /// Run inference over the normalized text. CPU-bound; call from a
    /// worker thread.
    pub fn infer(&self, text: &str) -> Vec<NativeEntity> {
        let mut entities = Vec::new();

        // Title-prefixed names: high confidence.
        for caps in self.title_pattern.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                entities.push(NativeEntity {
                    tag: "PER",
                    text: name.as_str().to_string(),
                    start: name.start(),
                    end: name.end(),
                    score: (self.base_confidence + 0.10).min(0.98),
                });
            }
        }

        // Capitalized bigrams, screened against stopwords and known
        // non-person phrases.
        for m in NAME_PATTERN.find_iter(text) {
            let candidate = m.as_str();
            if self.is_false_positive(candidate) || self.starts_with_stopword(candidate) {
                continue;
            }
            entities.push(NativeEntity {
                tag: "PER",
                text: candidate.to_string(),
                start: m.start(),
                end: m.end(),
                score: self.base_confidence - 0.05,
            });
        }

        for m in self.org_pattern.find_iter(text) {
            entities.push(NativeEntity {
                tag: "ORG",
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                score: self.base_confidence,
            });
        }

        for city in self.cities {
            for (pos, _) in text.match_indices(city) {
                if !is_word_bounded(text, pos, pos + city.len()) {
                    continue;
                }
                entities.push(NativeEntity {
                    tag: "LOC",
                    text: (*city).to_string(),
                    start: pos,
                    end: pos + city.len(),
                    score: self.base_confidence,
                });
            }
        }

        for m in self.month_date_pattern.find_iter(text) {
            entities.push(NativeEntity {
                tag: "DATE",
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                score: self.base_confidence,
            });
        }
        for m in NUMERIC_DATE.find_iter(text) {
            entities.push(NativeEntity {
                tag: "DATE",
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                score: self.base_confidence - 0.05,
            });
        }
        for m in BARE_YEAR.find_iter(text) {
            entities.push(NativeEntity {
                tag: "DATE",
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                score: 0.70,
            });
        }

        // Standalone acronyms carry no mappable kind; emitted with the
        // model's miscellaneous tag and dropped during kind mapping.
        for m in ACRONYM.find_iter(text) {
            entities.push(NativeEntity {
                tag: "MISC",
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
                score: 0.50,
            });
        }

        entities
    }

    fn starts_with_stopword(&self, candidate: &str) -> bool {
        candidate
            .split_whitespace()
            .next()
            .map(|first| self.stopwords.contains(&first))
            .unwrap_or(true)
    }

    fn is_false_positive(&self, candidate: &str) -> bool {
        self.false_positives.contains(&candidate)
    }
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before_ok = start == 0
        || !text[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_alphanumeric);
    let after_ok = end >= text.len()
        || !text[end..]
            .chars()
            .next()
            .is_some_and(char::is_alphanumeric);
    before_ok && after_ok
}

/// Process-wide registry of loaded models, one per language.
pub struct NerRegistry {
    base_confidence: f64,
    available: Vec<Language>,
    models: RwLock<HashMap<Language, Arc<NerModel>>>,
}

impl NerRegistry {
    /// Build the registry and eagerly load the Italian model; panics only
    /// if the built-in Italian patterns fail to compile, which would be a
    /// programming error.
    pub fn new(base_confidence: f64) -> Self {
        Self::with_available(base_confidence, Language::ALL.to_vec())
    }

    /// Restrict loadable languages; used to exercise model-load failures.
    pub fn with_available(base_confidence: f64, available: Vec<Language>) -> Self {
        let registry = Self {
            base_confidence,
            available,
            models: RwLock::new(HashMap::new()),
        };
        if registry.available.contains(&Language::It) {
            let italian = NerModel::load(Language::It, base_confidence)
                .expect("italian NER model must load at startup");
            registry
                .models
                .try_write()
                .expect("registry not yet shared")
                .insert(Language::It, Arc::new(italian));
        }
        registry
    }

    pub async fn get_or_load(&self, language: Language) -> Result<Arc<NerModel>, PipelineError> {
        if let Some(model) = self.models.read().await.get(&language) {
            return Ok(Arc::clone(model));
        }

        if !self.available.contains(&language) {
            return Err(PipelineError::ModelLoad {
                language: language.code().to_string(),
                reason: format!("model {} not installed", language.ner_model()),
            });
        }

        let mut models = self.models.write().await;
        // Another task may have loaded it while we waited for the lock.
        if let Some(model) = models.get(&language) {
            return Ok(Arc::clone(model));
        }

        tracing::info!(
            language = language.code(),
            model = language.ner_model(),
            "loading NER model"
        );
        let model = Arc::new(NerModel::load(language, self.base_confidence)?);
        models.insert(language, Arc::clone(&model));
        Ok(model)
    }

    pub async fn loaded_languages(&self) -> Vec<Language> {
        self.models.read().await.keys().copied().collect()
    }
}
