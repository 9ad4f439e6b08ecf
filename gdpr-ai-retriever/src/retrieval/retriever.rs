//! The retriever: corpus in, relevant chunks out.
//!
//! ## Pipeline Flow
//!
//! ```text
//! corpus JSON → load_corpus → ChunkingStrategy → build_index → VectorIndex
//!                                                     ↑             ↓
//!                                     EmbeddingProvider ── query → find_relevant
//! ```
//!
//! A [`Retriever`] is built once and then only read. It is `Send + Sync`, so
//! one instance can serve concurrent queries from many tasks.

use super::chunking_strategy::ChunkingStrategy;
use super::index_builder::{BuildOptions, BuildReport, build_index};
use super::retry::with_retries;
use crate::config::RetrieverConfig;
use crate::corpus::{corpus_fingerprint, load_corpus};
use crate::error::{RagError, Result};
use crate::storage::{DistanceMetric, EmbeddingCache, FlatIndex, SearchHit, VectorIndex};
use gdpr_ai_context::{Article, Chunk};
use gdpr_ai_embed::EmbeddingProvider;
use half::f16;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summary of a built index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub articles: usize,
    pub chunks: usize,
    /// Embedding dimension, `None` when the corpus produced no chunks
    pub dimension: Option<usize>,
    pub metric: DistanceMetric,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub model_id: String,
    pub corpus_fingerprint: String,
    /// Chunks embedded during this build
    pub embedded: usize,
    /// Chunks whose embedding came from the cache
    pub cached: usize,
    pub build_millis: u64,
}

/// Semantic search over the GDPR articles.
pub struct Retriever<I: VectorIndex = FlatIndex> {
    config: RetrieverConfig,
    provider: Arc<dyn EmbeddingProvider>,
    index: I,
    stats: IndexStats,
}

impl<I: VectorIndex> std::fmt::Debug for Retriever<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .field("provider", &self.provider.provider_name())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<I: VectorIndex> Retriever<I> {
    /// Load the corpus named by `config.corpus_path`, chunk it, embed the
    /// chunks and build the index.
    ///
    /// # Errors
    /// - [`RagError::Config`] for invalid chunking or search settings
    /// - [`RagError::CorpusLoad`] when the corpus cannot be read or validated
    /// - [`RagError::Embedding`] when the provider fails after retries
    pub async fn initialize(
        config: RetrieverConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let articles = load_corpus(&config.corpus_path).await?;
        Self::from_articles(articles, config, provider).await
    }

    /// Build a retriever from articles already in memory.
    pub async fn from_articles(
        articles: Vec<Article>,
        config: RetrieverConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();

        let chunks = ChunkingStrategy::from_config(&config)?.chunk_corpus(&articles);
        info!(
            "Split {} articles into {} chunks (size {}, overlap {})",
            articles.len(),
            chunks.len(),
            config.chunk_size,
            config.chunk_overlap
        );

        let mut options = BuildOptions::from_config(&config);
        if let Some(path) = &config.cache_path {
            match EmbeddingCache::open(path).await {
                Ok(cache) => options = options.with_cache(cache),
                Err(e) => warn!(
                    "Embedding cache at {} unavailable, continuing without it: {}",
                    path.display(),
                    e
                ),
            }
        }

        let chunk_count = chunks.len();
        let (index, BuildReport { embedded, cached }) =
            build_index::<I>(chunks, provider.as_ref(), &options).await?;

        let stats = IndexStats {
            articles: articles.len(),
            chunks: chunk_count,
            dimension: index.dimension(),
            metric: index.metric(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            model_id: provider.model_id(),
            corpus_fingerprint: corpus_fingerprint(&articles),
            embedded,
            cached,
            build_millis: start.elapsed().as_millis() as u64,
        };
        info!(
            "Index ready: {} chunks, dimension {:?}, built in {}ms",
            stats.chunks, stats.dimension, stats.build_millis
        );

        Ok(Self {
            config,
            provider,
            index,
            stats,
        })
    }

    /// The `k` chunks closest to `query`, nearest first.
    ///
    /// Returns `min(k, number of chunks)` chunks. `k == 0` is rejected with
    /// [`RagError::InvalidArgument`]. An empty query is embedded like any other
    /// text.
    pub async fn find_relevant(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .find_relevant_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }

    /// Like [`Self::find_relevant`] but keeps the distance of every hit.
    pub async fn find_relevant_scored(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(RagError::invalid_argument("k must be at least 1"));
        }
        let embedding = self.embed_query(query).await?;
        let hits = self.index.search(&embedding, k)?;
        for hit in &hits {
            debug!(
                "Hit: article {} chunk {} distance {:.4}",
                hit.chunk.metadata.article_number, hit.chunk.sequence, hit.distance
            );
        }
        Ok(hits)
    }

    /// [`Self::find_relevant`] with the configured `top_k`.
    pub async fn find_relevant_default(&self, query: &str) -> Result<Vec<Chunk>> {
        self.find_relevant(query, self.config.top_k).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f16>> {
        with_retries(self.config.embed_retries, "Query embedding", || async {
            self.provider
                .embed_text(query)
                .await
                .map_err(RagError::from)
        })
        .await
    }

    pub fn default_k(&self) -> usize {
        self.config.top_k
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gdpr_ai_embed::{EmbedError, EmbeddingResult, HashEmbedProvider};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn articles() -> Vec<Article> {
        vec![
            Article::new(
                16,
                "Right to rectification",
                "The data subject shall have the right to obtain from the controller without undue delay the rectification of inaccurate personal data concerning him or her.",
            ),
            Article::new(
                17,
                "Right to erasure ('right to be forgotten')",
                "The data subject shall have the right to obtain from the controller the erasure of personal data concerning him or her without undue delay.",
            ),
            Article::new(
                20,
                "Right to data portability",
                "The data subject shall have the right to receive the personal data concerning him or her in a structured, commonly used and machine-readable format.",
            ),
        ]
    }

    fn hash_provider() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashEmbedProvider::new(256).unwrap())
    }

    #[tokio::test]
    async fn test_find_relevant_ranks_matching_article_first() -> anyhow::Result<()> {
        let retriever: Retriever =
            Retriever::from_articles(articles(), RetrieverConfig::default(), hash_provider())
                .await?;

        let chunks = retriever
            .find_relevant("machine-readable format for portability", 2)
            .await?;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.article_number, 20);

        assert_eq!(retriever.stats().articles, 3);
        assert_eq!(retriever.stats().chunks, 3);
        assert_eq!(retriever.stats().dimension, Some(256));
        Ok(())
    }

    #[tokio::test]
    async fn test_k_larger_than_corpus() -> anyhow::Result<()> {
        let retriever: Retriever =
            Retriever::from_articles(articles(), RetrieverConfig::default(), hash_provider())
                .await?;
        assert_eq!(retriever.find_relevant("erasure", 50).await?.len(), 3);
        assert!(matches!(
            retriever.find_relevant("erasure", 0).await,
            Err(RagError::InvalidArgument { .. })
        ));
        // An empty query is still answered.
        assert_eq!(retriever.find_relevant("", 1).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_embedding() {
        let config = RetrieverConfig::default().with_chunking(100, 100);
        let result: Result<Retriever> =
            Retriever::from_articles(articles(), config, hash_provider()).await;
        assert!(matches!(result, Err(RagError::Config { .. })));
    }

    struct FlakyQueries {
        inner: HashEmbedProvider,
        fail_single: AtomicU32,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyQueries {
        async fn embed_text(&self, text: &str) -> gdpr_ai_embed::Result<Vec<f16>> {
            if self.fail_single.load(Ordering::SeqCst) > 0 {
                self.fail_single.fetch_sub(1, Ordering::SeqCst);
                return Err(EmbedError::unavailable("HTTP 429"));
            }
            self.inner.embed_text(text).await
        }

        async fn embed_texts(&self, texts: &[String]) -> gdpr_ai_embed::Result<EmbeddingResult> {
            self.inner.embed_texts(texts).await
        }

        fn embedding_dimension(&self) -> usize {
            self.inner.embedding_dimension()
        }

        fn provider_name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_query_embedding_is_retried() -> anyhow::Result<()> {
        let provider = Arc::new(FlakyQueries {
            inner: HashEmbedProvider::new(64)?,
            fail_single: AtomicU32::new(2),
        });
        let retriever: Retriever =
            Retriever::from_articles(articles(), RetrieverConfig::default(), provider.clone())
                .await?;

        assert_eq!(retriever.find_relevant("erasure", 1).await?.len(), 1);

        provider.fail_single.store(5, Ordering::SeqCst);
        let err = retriever.find_relevant("erasure", 1).await.unwrap_err();
        assert!(err.is_retryable());
        Ok(())
    }
}
