//! gdpr-ai-retriever: Semantic search over the articles of the GDPR
//!
//! This crate loads the article corpus, splits every article into overlapping
//! chunks, embeds the chunks and answers "which passages are most relevant to
//! this question" queries.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Chunking, index building, the [`Retriever`] and its shared handle
//! - **[`storage`]**: The vector index and the SQLite embedding cache
//! - **[`corpus`]**: Loading and validating the corpus file
//! - **[`config`]**: [`RetrieverConfig`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gdpr_ai_embed::{EmbedConfig, create_provider};
//! use gdpr_ai_retriever::{Retriever, RetrieverConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = create_provider(EmbedConfig::hashing(384)).await?;
//! let retriever: Retriever =
//!     Retriever::initialize(RetrieverConfig::new("data/gdpr_articles.json"), provider).await?;
//!
//! for chunk in retriever.find_relevant("What is the right to erasure?", 4).await? {
//!     println!("Article {}: {}", chunk.metadata.article_number, chunk.content);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Corpus → ChunkingStrategy → EmbeddingProvider → VectorIndex → find_relevant
//!                                    ↕
//!                             EmbeddingCache (SQLite)
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod retrieval;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{RagError, Result};
pub use retrieval::retriever::{IndexStats, Retriever};
pub use retrieval::shared::SharedRetriever;
pub use storage::{DistanceMetric, FlatIndex, SearchHit, VectorIndex};
