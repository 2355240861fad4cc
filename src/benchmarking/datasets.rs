//! Annotated corpus loading for benchmarks.
//!
//! A dataset is JSON: `{id, kind, documents: [{id, text, entities:
//! [{kind, start, end, text?}]}]}`. Annotation offsets are trusted as
//! given; when an annotation carries its surface text a consistency check
//! against the document runs and mismatches are logged at warn, not
//! failed, since dataset defects are dataset defects.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthSpan {
    #[serde(rename = "kind")]
    pub kind_tag: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedDocument {
    pub id: String,
    pub text: String,
    pub entities: Vec<GroundTruthSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkDataset {
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    pub documents: Vec<AnnotatedDocument>,
}

impl BenchmarkDataset {
    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: BenchmarkDataset =
            serde_json::from_str(json).context("invalid benchmark dataset JSON")?;
        dataset.check_annotations();
        Ok(dataset)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_entities(&self) -> usize {
        self.documents.iter().map(|d| d.entities.len()).sum()
    }

    fn check_annotations(&self) {
        for document in &self.documents {
            for entity in &document.entities {
                if entity.start >= entity.end || entity.end > document.text.len() {
                    tracing::warn!(
                        document_id = %document.id,
                        start = entity.start,
                        end = entity.end,
                        "annotation offsets out of range"
                    );
                    continue;
                }
                if let Some(expected) = &entity.text {
                    if !document.text.is_char_boundary(entity.start)
                        || !document.text.is_char_boundary(entity.end)
                        || &document.text[entity.start..entity.end] != expected.as_str()
                    {
                        tracing::warn!(
                            document_id = %document.id,
                            kind = %entity.kind_tag,
                            start = entity.start,
                            "annotation text does not match document offsets"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "legal_corpus_v1",
        "kind": "mixed_legal",
        "documents": [
            {
                "id": "doc1",
                "text": "Mario Rossi, CF RSSMRA85T10A562S",
                "entities": [
                    {"kind": "PERSON", "start": 0, "end": 11, "text": "Mario Rossi"},
                    {"kind": "FISCAL_CODE", "start": 16, "end": 32}
                ]
            },
            {
                "id": "doc2",
                "text": "Nessuna entità qui.",
                "entities": []
            }
        ]
    }"#;

    #[test]
    fn test_load_from_json() {
        let dataset = BenchmarkDataset::from_json(SAMPLE).unwrap();
        assert_eq!(dataset.id, "legal_corpus_v1");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.total_entities(), 2);
        assert_eq!(dataset.documents[0].entities[0].kind_tag, "PERSON");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(BenchmarkDataset::from_json("not json").is_err());
    }

    #[test]
    fn test_offset_defects_do_not_fail_loading() {
        let json = r#"{
            "id": "defective",
            "documents": [
                {
                    "id": "d",
                    "text": "breve",
                    "entities": [{"kind": "PERSON", "start": 2, "end": 99}]
                }
            ]
        }"#;
        let dataset = BenchmarkDataset::from_json(json).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let dataset = BenchmarkDataset::from_file(&path).unwrap();
        assert_eq!(dataset.id, "legal_corpus_v1");
    }
}
