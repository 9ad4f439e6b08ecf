//! A retriever handle that can be cloned before the index exists.
//!
//! Building the index can take a while (model download, embedding the corpus).
//! [`SharedRetriever`] lets the application hand out handles right away, start
//! the build in the background and answer queries once it finishes. Queries
//! that arrive earlier fail with [`RagError::IndexNotBuilt`] instead of waiting.

use super::retriever::Retriever;
use crate::config::RetrieverConfig;
use crate::error::{RagError, Result};
use crate::storage::{FlatIndex, VectorIndex};
use gdpr_ai_context::Chunk;
use gdpr_ai_embed::EmbeddingProvider;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SharedRetriever<I: VectorIndex = FlatIndex> {
    cell: Arc<OnceCell<Retriever<I>>>,
}

impl<I: VectorIndex> Clone for SharedRetriever<I> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<I: VectorIndex> Default for SharedRetriever<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: VectorIndex> std::fmt::Debug for SharedRetriever<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRetriever")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<I: VectorIndex> SharedRetriever<I> {
    /// A handle whose index has not been built yet
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// A handle around an already built retriever
    pub fn from_retriever(retriever: Retriever<I>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(retriever))),
        }
    }

    /// Build the index unless it already exists.
    ///
    /// Concurrent callers wait for a single build. If the build fails the
    /// handle stays empty and a later call may try again.
    pub async fn initialize(
        &self,
        config: RetrieverConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<&Retriever<I>> {
        self.cell
            .get_or_try_init(|| Retriever::initialize(config, provider))
            .await
    }

    /// The built retriever, or [`RagError::IndexNotBuilt`]
    pub fn get(&self) -> Result<&Retriever<I>> {
        self.cell.get().ok_or(RagError::IndexNotBuilt)
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn find_relevant(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        self.get()?.find_relevant(query, k).await
    }
}
