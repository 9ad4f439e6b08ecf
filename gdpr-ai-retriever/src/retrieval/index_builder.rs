//! Embedding chunks and assembling them into a [`VectorIndex`].
//!
//! Chunks are embedded in batches, with up to `concurrency` batches in flight.
//! Batches may complete in any order; every batch carries the positions of its
//! chunks, so each vector is paired with the chunk it was computed from no
//! matter when its batch finishes. When an [`EmbeddingCache`] is supplied,
//! chunks whose text was embedded before by the same model skip the provider.

use super::retry::with_retries;
use crate::config::RetrieverConfig;
use crate::error::{RagError, Result};
use crate::storage::{ContentHash, DistanceMetric, EmbeddingCache, VectorIndex, content_hash};
use futures::stream::{self, StreamExt, TryStreamExt};
use gdpr_ai_context::Chunk;
use gdpr_ai_embed::EmbeddingProvider;
use half::f16;
use tracing::{debug, info, warn};

/// Settings for [`build_index`]
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub metric: DistanceMetric,
    /// Embedding batches in flight at once
    pub concurrency: usize,
    /// Chunks per embedding batch
    pub batch_size: usize,
    /// Extra attempts for a batch that failed transiently
    pub retries: u32,
    pub cache: Option<EmbeddingCache>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&RetrieverConfig::default())
    }
}

impl BuildOptions {
    /// Options matching a retriever configuration, without a cache
    pub fn from_config(config: &RetrieverConfig) -> Self {
        Self {
            metric: config.metric,
            concurrency: config.embed_concurrency.max(1),
            batch_size: config.embed_batch_size.max(1),
            retries: config.embed_retries,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// What happened while building an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Chunks sent to the embedding provider
    pub embedded: usize,
    /// Chunks whose vector came from the cache
    pub cached: usize,
}

/// Embed `chunks` with `provider` and build an index of type `I`.
///
/// The index holds the chunks in the order given. Any provider failure that
/// persists after retries aborts the build; cache failures are logged and
/// otherwise ignored.
pub async fn build_index<I: VectorIndex>(
    chunks: Vec<Chunk>,
    provider: &dyn EmbeddingProvider,
    options: &BuildOptions,
) -> Result<(I, BuildReport)> {
    let model_id = provider.model_id();
    let hashes: Vec<ContentHash> = chunks.iter().map(|c| content_hash(&c.content)).collect();
    let mut vectors: Vec<Option<Vec<f16>>> = vec![None; chunks.len()];

    if let Some(cache) = &options.cache {
        match cache.get_many(&model_id, &hashes).await {
            Ok(found) => {
                for (slot, hash) in vectors.iter_mut().zip(&hashes) {
                    *slot = found.get(hash).cloned();
                }
            }
            Err(e) => warn!("Embedding cache lookup failed, embedding everything: {}", e),
        }
    }

    let missing: Vec<usize> = vectors
        .iter()
        .enumerate()
        .filter_map(|(position, slot)| slot.is_none().then_some(position))
        .collect();
    let report = BuildReport {
        embedded: missing.len(),
        cached: chunks.len() - missing.len(),
    };
    info!(
        "Embedding {} chunks with {} ({} cached)",
        report.embedded, model_id, report.cached
    );

    let chunks_ref = &chunks;
    let batches: Vec<Vec<usize>> = missing
        .chunks(options.batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect();
    let completed: Vec<(Vec<usize>, Vec<Vec<f16>>)> = stream::iter(batches)
        .map(|positions| async move {
            let texts: Vec<String> = positions
                .iter()
                .map(|&position| chunks_ref[position].content.clone())
                .collect();
            let result = with_retries(options.retries, "Embedding batch", || async {
                provider.embed_texts(&texts).await.map_err(RagError::from)
            })
            .await?;
            if result.len() != positions.len() {
                return Err(RagError::embedding(format!(
                    "provider returned {} embeddings for {} chunks",
                    result.len(),
                    positions.len()
                )));
            }
            debug!("Embedded batch of {} chunks", positions.len());
            Ok::<_, RagError>((positions, result.embeddings))
        })
        .buffer_unordered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let mut fresh: Vec<(ContentHash, Vec<f16>)> = Vec::with_capacity(report.embedded);
    for (positions, embeddings) in completed {
        for (position, embedding) in positions.into_iter().zip(embeddings) {
            if options.cache.is_some() {
                fresh.push((hashes[position], embedding.clone()));
            }
            vectors[position] = Some(embedding);
        }
    }

    if let Some(cache) = &options.cache {
        if !fresh.is_empty() {
            if let Err(e) = cache.put_many(&model_id, &fresh).await {
                warn!("Failed to store {} embeddings in cache: {}", fresh.len(), e);
            }
        }
    }

    let entries = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| {
            vector
                .map(|v| (chunk, v))
                .ok_or_else(|| RagError::embedding("a chunk was left without an embedding"))
        })
        .collect::<Result<Vec<_>>>()?;

    let index = I::from_embeddings(entries, options.metric)?;
    Ok((index, report))
}
