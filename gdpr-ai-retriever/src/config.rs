//! Retriever configuration

use crate::error::{RagError, Result};
use crate::storage::DistanceMetric;
use gdpr_ai_context::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSplitter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for building and querying the article index.
///
/// Deserializes from the `[retriever]` table of the application config;
/// missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// JSON file with the GDPR articles
    pub corpus_path: PathBuf,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one article
    pub chunk_overlap: usize,
    /// Number of chunks returned when the caller does not ask for a specific count
    pub top_k: usize,
    /// How embeddings are compared
    pub metric: DistanceMetric,
    /// Embedding batches in flight at once while building the index
    pub embed_concurrency: usize,
    /// Texts per embedding request while building the index
    pub embed_batch_size: usize,
    /// Extra attempts for an embedding call that failed transiently
    pub embed_retries: u32,
    /// Optional SQLite file caching chunk embeddings between runs
    pub cache_path: Option<PathBuf>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/gdpr_articles.json"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: 4,
            metric: DistanceMetric::Cosine,
            embed_concurrency: 4,
            embed_batch_size: 32,
            embed_retries: 2,
            cache_path: None,
        }
    }
}

impl RetrieverConfig {
    /// Create a configuration for the corpus at `corpus_path` with default settings.
    ///
    /// # Arguments
    /// * `corpus_path` - JSON file holding the articles
    ///
    /// # Returns
    /// A configuration with 1000-character chunks overlapping by 100 characters,
    /// cosine distance, four results per query and no embedding cache.
    pub fn new(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            ..Self::default()
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set how many embedding batches may be in flight while building the index.
    pub fn with_embed_concurrency(mut self, embed_concurrency: usize) -> Self {
        self.embed_concurrency = embed_concurrency;
        self
    }

    pub fn with_embed_batch_size(mut self, embed_batch_size: usize) -> Self {
        self.embed_batch_size = embed_batch_size;
        self
    }

    pub fn with_embed_retries(mut self, embed_retries: u32) -> Self {
        self.embed_retries = embed_retries;
        self
    }

    /// Cache chunk embeddings in the SQLite file at `path`.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// The splitter described by `chunk_size` and `chunk_overlap`.
    pub fn splitter(&self) -> Result<TextSplitter> {
        Ok(TextSplitter::new(self.chunk_size, self.chunk_overlap)?)
    }

    /// Check every setting that does not need the filesystem.
    pub fn validate(&self) -> Result<()> {
        self.splitter()?;
        if self.top_k == 0 {
            return Err(RagError::config("top_k must be at least 1"));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::config("embed_concurrency must be at least 1"));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::config("embed_batch_size must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert!(config.cache_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = RetrieverConfig::new("articles.json")
            .with_chunking(500, 50)
            .with_top_k(2)
            .with_metric(DistanceMetric::Euclidean)
            .with_embed_concurrency(8)
            .with_cache_path("cache.db");

        assert_eq!(config.corpus_path, PathBuf::from("articles.json"));
        assert_eq!(config.splitter().unwrap().chunk_size(), 500);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.embed_concurrency, 8);
        assert_eq!(config.cache_path, Some(PathBuf::from("cache.db")));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(matches!(
            RetrieverConfig::default().with_chunking(100, 100).validate(),
            Err(RagError::Config { .. })
        ));
        assert!(RetrieverConfig::default().with_chunking(0, 0).validate().is_err());
        assert!(RetrieverConfig::default().with_top_k(0).validate().is_err());
        assert!(RetrieverConfig::default().with_embed_concurrency(0).validate().is_err());
        assert!(RetrieverConfig::default().with_embed_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: RetrieverConfig = serde_json::from_str(
            r#"{"corpus_path": "gdpr.json", "metric": "euclidean", "top_k": 6}"#,
        )
        .unwrap();
        assert_eq!(config.corpus_path, PathBuf::from("gdpr.json"));
        assert_eq!(config.metric, DistanceMetric::Euclidean);
        assert_eq!(config.top_k, 6);
        assert_eq!(config.chunk_size, 1000);
    }
}
