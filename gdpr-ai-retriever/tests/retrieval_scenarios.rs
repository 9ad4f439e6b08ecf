//! End-to-end retrieval over the bundled 21-article corpus
//!
//! These tests use the offline hashing provider so they need neither a
//! network connection nor a model download:
//! - Building the index from the corpus file
//! - Returning exactly `k` chunks with article metadata
//! - Clamping to the index size when `k` is larger
//! - Reusing cached embeddings across builds

use anyhow::Result;
use gdpr_ai_context::Article;
use gdpr_ai_embed::{EmbedConfig, create_provider};
use gdpr_ai_retriever::storage::EmbeddingCache;
use gdpr_ai_retriever::{RagError, Retriever, RetrieverConfig, SharedRetriever};
use std::path::PathBuf;
use tempfile::tempdir;

const TRANSPARENCY_QUERY: &str = "What is the principle of transparency stands for?";

fn corpus_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data/gdpr_articles.json")
}

async fn build(config: RetrieverConfig) -> Result<Retriever> {
    let provider = create_provider(EmbedConfig::hashing(384)).await?;
    Ok(Retriever::initialize(config, provider).await?)
}

#[tokio::test]
async fn test_top_four_chunks_carry_article_numbers() -> Result<()> {
    let retriever = build(RetrieverConfig::new(corpus_path()).with_chunking(1000, 100)).await?;
    assert_eq!(retriever.stats().articles, 21);
    assert!(retriever.stats().chunks > 21);

    let chunks = retriever.find_relevant(TRANSPARENCY_QUERY, 4).await?;
    assert_eq!(chunks.len(), 4);
    for chunk in &chunks {
        assert!((1..=21).contains(&chunk.metadata.article_number));
        assert!(!chunk.metadata.article_summary.is_empty());
        assert!(chunk.char_len() <= 1000);
    }
    // Article 5 is the one that spells out the transparency principle.
    assert_eq!(chunks[0].metadata.article_number, 5);

    let two = retriever.find_relevant(TRANSPARENCY_QUERY, 2).await?;
    assert_eq!(two.len(), 2);
    assert_eq!(two, chunks[..2]);
    Ok(())
}

#[tokio::test]
async fn test_k_larger_than_index_returns_every_chunk() -> Result<()> {
    let articles = vec![
        Article::new(
            16,
            "Right to rectification",
            "Inaccurate personal data shall be rectified.",
        ),
        Article::new(
            20,
            "Right to data portability",
            "Data shall be portable between controllers.",
        ),
    ];
    let provider = create_provider(EmbedConfig::hashing(128)).await?;
    let retriever: Retriever =
        Retriever::from_articles(articles, RetrieverConfig::default(), provider).await?;

    let chunks = retriever
        .find_relevant("portable data between controllers", 4)
        .await?;
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].metadata.article_number, 20);
    Ok(())
}

#[tokio::test]
async fn test_results_are_reproducible_across_builds() -> Result<()> {
    let config = RetrieverConfig::new(corpus_path());
    let first = build(config.clone()).await?;
    let second = build(config).await?;

    assert_eq!(
        first.stats().corpus_fingerprint,
        second.stats().corpus_fingerprint
    );
    let query = "When can the data subject withdraw consent?";
    assert_eq!(
        first.find_relevant_scored(query, 4).await?,
        second.find_relevant_scored(query, 4).await?
    );
    Ok(())
}

#[tokio::test]
async fn test_second_build_reads_embeddings_from_cache() -> Result<()> {
    let temp_dir = tempdir()?;
    let cache_path = temp_dir.path().join("cache").join("embeddings.db");
    let config = RetrieverConfig::new(corpus_path()).with_cache_path(&cache_path);

    let cold = build(config.clone()).await?;
    assert_eq!(cold.stats().cached, 0);
    assert_eq!(cold.stats().embedded, cold.stats().chunks);

    let warm = build(config).await?;
    assert_eq!(warm.stats().embedded, 0);
    assert_eq!(warm.stats().cached, warm.stats().chunks);

    let cache = EmbeddingCache::open(&cache_path).await?;
    assert_eq!(
        cache.count(&warm.stats().model_id).await?,
        warm.stats().chunks
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_corpus_is_reported_with_path() -> Result<()> {
    let temp_dir = tempdir()?;
    let missing = temp_dir.path().join("nope.json");
    let err = build(RetrieverConfig::new(&missing)).await.unwrap_err();

    let err = err.downcast::<RagError>()?;
    assert!(matches!(err, RagError::CorpusLoad { .. }));
    assert!(err.to_string().contains("nope.json"));
    Ok(())
}

#[tokio::test]
async fn test_shared_retriever_serves_concurrent_queries() -> Result<()> {
    let shared: SharedRetriever = SharedRetriever::new();
    assert!(matches!(
        shared.find_relevant("erasure", 4).await,
        Err(RagError::IndexNotBuilt)
    ));

    let provider = create_provider(EmbedConfig::hashing(384)).await?;
    shared
        .initialize(RetrieverConfig::new(corpus_path()), provider)
        .await?;

    let queries = [
        "right to erasure",
        "data portability",
        "child consent",
        "supervisory authority complaint",
    ];
    let handles: Vec<_> = queries
        .iter()
        .map(|query| {
            let shared = shared.clone();
            let query = query.to_string();
            tokio::spawn(async move { shared.find_relevant(&query, 3).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await??.len(), 3);
    }
    Ok(())
}
