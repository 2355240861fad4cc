//! Smart batching: group documents by language and length bucket so
//! similarly sized work shares a batch, then restore original input order
//! after processing.

use serde::{Deserialize, Serialize};

use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LengthBucket {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub small_threshold: usize,
    pub large_threshold: usize,
    pub adaptive: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            small_threshold: 500,
            large_threshold: 2_000,
            adaptive: true,
        }
    }
}

impl BatchConfig {
    pub fn classify(&self, text_len: usize) -> LengthBucket {
        if text_len < self.small_threshold {
            LengthBucket::Small
        } else if text_len <= self.large_threshold {
            LengthBucket::Medium
        } else {
            LengthBucket::Large
        }
    }

    /// Large documents get smaller batches when adaptive sizing is on.
    fn effective_batch_size(&self, bucket: LengthBucket) -> usize {
        if self.adaptive && bucket == LengthBucket::Large {
            (self.max_batch_size / 2).max(1)
        } else {
            self.max_batch_size.max(1)
        }
    }
}

/// A document queued for batch processing; `index` is its position in the
/// caller's input and drives result reordering.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub index: usize,
    pub id: String,
    pub text: String,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct DocumentBatch {
    pub language: Language,
    pub bucket: LengthBucket,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptimizer {
    config: BatchConfig,
}

impl BatchOptimizer {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Group items by (language, bucket) and split groups exceeding the
    /// effective batch size. Within a batch the original relative order is
    /// preserved.
    pub fn create_batches(&self, items: Vec<BatchItem>) -> Vec<DocumentBatch> {
        let mut batches: Vec<DocumentBatch> = Vec::new();

        for item in items {
            let bucket = self.config.classify(item.text.len());
            let limit = self.config.effective_batch_size(bucket);

            match batches
                .iter_mut()
                .find(|b| b.language == item.language && b.bucket == bucket && b.items.len() < limit)
            {
                Some(batch) => batch.items.push(item),
                None => batches.push(DocumentBatch {
                    language: item.language,
                    bucket,
                    items: vec![item],
                }),
            }
        }

        batches
    }
}

/// Reorder `(original_index, result)` pairs back to input order. Hard
/// correctness requirement for batch output.
pub fn restore_order<T>(mut indexed: Vec<(usize, T)>) -> Vec<T> {
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}
