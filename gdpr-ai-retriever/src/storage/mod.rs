//! Storage layer for gdpr-ai-retriever
//!
//! Two concerns live here:
//!
//! - **VectorIndex**: The in-memory nearest-neighbour index over chunk embeddings.
//!   [`FlatIndex`] is the exhaustive implementation; any structure that returns
//!   the same top-k may replace it.
//! - **EmbeddingCache**: An optional SQLite store that remembers the vector of
//!   every chunk text per embedding model, so rebuilding the index does not pay
//!   for the same embeddings twice.
//!
//! ## Architecture
//!
//! ```text
//! Chunks ── EmbeddingProvider ──┬── VectorIndex (FlatIndex) ── search
//!                               └── EmbeddingCache (SQLite)
//! ```

use crate::error::Result;
use gdpr_ai_context::Chunk;
use half::f16;
use serde::Serialize;

pub mod distance;
pub mod embedding_cache;
pub mod flat_index;

pub use distance::DistanceMetric;
pub use embedding_cache::{ContentHash, EmbeddingCache, content_hash};
pub use flat_index::FlatIndex;

/// Position of a chunk in the index, assigned in insertion order.
pub type ChunkId = usize;

/// One search result: the chunk, its index id and its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub distance: f32,
    pub chunk: Chunk,
}

/// A nearest-neighbour index over chunk embeddings.
///
/// An index is immutable once built and can be shared between tasks for
/// concurrent reads.
pub trait VectorIndex: Send + Sync + Sized {
    /// Build an index from chunks paired with their embeddings.
    ///
    /// All embeddings must have the same, non-zero dimension. An empty input
    /// builds an empty index.
    fn from_embeddings(entries: Vec<(Chunk, Vec<f16>)>, metric: DistanceMetric) -> Result<Self>;

    /// Return up to `k` hits ordered by ascending distance.
    ///
    /// Returns `min(k, len())` hits. Ties are broken by insertion order.
    /// `k == 0` is an invalid argument; a query of the wrong dimension is an
    /// embedding error.
    fn search(&self, query: &[f16], k: usize) -> Result<Vec<SearchHit>>;

    /// Number of indexed chunks
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension, or `None` for an empty index
    fn dimension(&self) -> Option<usize>;

    fn metric(&self) -> DistanceMetric;
}
