//! Offline embeddings by feature hashing.
//!
//! Every lower-cased alphanumeric token that is not a stop word is hashed with
//! FNV-1a into one of `dimension` buckets, with the sign taken from the top bit
//! of the hash. The bucket counts are then L2-normalized. Texts that share
//! vocabulary end up close under cosine distance, which is enough for tests and
//! for running the assistant without network access or model downloads.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, convert_to_f16};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

/// Bucket count used when the configuration does not set `dimensions`.
pub const DEFAULT_HASH_DIMENSION: usize = 384;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "does", "for", "from", "how", "in", "is",
    "it", "of", "on", "or", "shall", "that", "the", "this", "to", "what", "which", "with",
];

/// Split text into lower-cased alphanumeric tokens, dropping common stop words.
///
/// # Example
/// ```
/// use gdpr_ai_embed::hashing::tokens;
///
/// let words: Vec<String> = tokens("What is the Right to Erasure?").collect();
/// assert_eq!(words, vec!["right", "erasure"]);
/// ```
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
}

/// Deterministic embedding provider that needs neither a model nor a network.
#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
}

impl HashEmbedProvider {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hash embedding dimension must be greater than zero",
            ));
        }
        Ok(Self { dimension })
    }

    pub fn from_config(config: &EmbedConfig) -> Result<Self> {
        Self::new(config.dimensions.unwrap_or(DEFAULT_HASH_DIMENSION))
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let mut hasher = FnvHasher::default();
            hasher.write(token.as_bytes());
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            buckets[bucket] += sign;
        }
        buckets
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let raw: Vec<Vec<f32>> = texts.iter().map(|text| self.embed_one(text)).collect();
        Ok(EmbeddingResult::new(convert_to_f16(raw, true)))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash"
    }

    fn model_id(&self) -> String {
        format!("hash:fnv1a:{}", self.dimension)
    }
}
