//! # gdpr-ai-embed
//!
//! Text embeddings for the GDPR assistant, behind one async trait so that the
//! retriever does not care where vectors come from.
//!
//! ## Features
//!
//! - **Hosted embeddings**: OpenAI-compatible `/embeddings` endpoints over `reqwest`
//! - **Local ONNX Models**: Run embedding models locally via FastEmbed
//! - **Offline hashing**: Deterministic feature-hashing vectors for tests and air-gapped use
//! - **Model Caching**: Local models are loaded once per process
//! - **Half-Precision**: Memory-efficient f16 embeddings
//!
//! ## Quick Start
//!
//! ```no_run
//! use gdpr_ai_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = create_provider(EmbedConfig::fastembed("all-MiniLM-L6-v2")).await?;
//!
//! let texts = vec![
//!     "Right to erasure".to_string(),
//!     "Right to data portability".to_string(),
//! ];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: Provider selection and settings
//! - [`provider`]: The [`EmbeddingProvider`] trait and the FastEmbed implementation
//! - [`openai`]: The HTTP provider
//! - [`hashing`]: The offline provider
//! - [`error`]: Error types and result handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! [`EmbedError::is_retryable`] tells transient service failures apart from
//! errors that will repeat.

pub mod config;
pub mod error;
pub mod hashing;
pub mod openai;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_OPENAI_API_BASE, EmbedConfig, EmbedConfigBuilder, ProviderKind};
pub use error::{EmbedError, Result};
pub use hashing::HashEmbedProvider;
pub use openai::OpenAiEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, create_provider};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_provider_dispatches_on_kind() -> Result<()> {
        let provider = create_provider(EmbedConfig::hashing(48)).await?;
        assert_eq!(provider.provider_name(), "hash");
        assert_eq!(provider.embedding_dimension(), 48);

        let provider =
            create_provider(EmbedConfig::openai("text-embedding-3-small", "sk-test")).await?;
        assert_eq!(provider.provider_name(), "openai");

        let missing_key =
            create_provider(EmbedConfig::new(ProviderKind::OpenAi, "text-embedding-3-small")).await;
        assert!(missing_key.is_err());
        Ok(())
    }
}
