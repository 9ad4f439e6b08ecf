//! Exhaustive nearest-neighbour search.
//!
//! Every query is compared against every stored vector. For a corpus the size
//! of the GDPR (a few hundred chunks) this is both exact and fast.

use super::distance::{DistanceMetric, magnitude};
use super::{ChunkId, SearchHit, VectorIndex};
use crate::error::{RagError, Result};
use gdpr_ai_context::Chunk;
use half::f16;

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
    magnitude: f32,
}

/// Brute-force [`VectorIndex`] holding chunks and vectors in insertion order.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    entries: Vec<IndexEntry>,
    dimension: Option<usize>,
    metric: DistanceMetric,
}

impl FlatIndex {
    /// The chunk stored under `id`
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.entries.get(id).map(|entry| &entry.chunk)
    }

    /// All chunks in insertion order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }
}

impl VectorIndex for FlatIndex {
    fn from_embeddings(entries: Vec<(Chunk, Vec<f16>)>, metric: DistanceMetric) -> Result<Self> {
        let dimension = entries.first().map(|(_, embedding)| embedding.len());
        if dimension == Some(0) {
            return Err(RagError::embedding("embeddings must not be empty"));
        }

        let mut indexed = Vec::with_capacity(entries.len());
        for (position, (chunk, embedding)) in entries.into_iter().enumerate() {
            if Some(embedding.len()) != dimension {
                return Err(RagError::embedding(format!(
                    "embedding {position} has dimension {}, expected {}",
                    embedding.len(),
                    dimension.unwrap_or_default()
                )));
            }
            let vector: Vec<f32> = embedding.iter().map(|v| v.to_f32()).collect();
            let magnitude = magnitude(&vector);
            indexed.push(IndexEntry {
                chunk,
                vector,
                magnitude,
            });
        }

        Ok(Self {
            entries: indexed,
            dimension,
            metric,
        })
    }

    fn search(&self, query: &[f16], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(RagError::invalid_argument("k must be at least 1"));
        }
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::embedding(format!(
                "query has dimension {}, index has {dimension}",
                query.len()
            )));
        }

        let query: Vec<f32> = query.iter().map(|v| v.to_f32()).collect();
        let query_magnitude = magnitude(&query);

        let mut scored: Vec<(ChunkId, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(id, entry)| {
                let distance =
                    self.metric
                        .distance(&query, query_magnitude, &entry.vector, entry.magnitude);
                (id, distance)
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(id, distance)| SearchHit {
                id,
                distance,
                chunk: self.entries[id].chunk.clone(),
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
