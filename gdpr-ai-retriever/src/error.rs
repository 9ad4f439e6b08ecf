//! Error types for corpus loading, indexing and retrieval

use gdpr_ai_context::SplitError;
use gdpr_ai_embed::EmbedError;
use std::path::{Path, PathBuf};

/// Result type used throughout the retriever.
pub type Result<T> = std::result::Result<T, RagError>;

/// Everything that can go wrong between reading the corpus and returning chunks.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Settings that can never work (zero chunk size, overlap too large, k of zero in config)
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// The corpus file is missing, unreadable, malformed or empty
    #[error("Failed to load corpus from {}: {message}", path.display())]
    CorpusLoad { path: PathBuf, message: String },

    /// The embedding provider failed or returned vectors we cannot use
    #[error("Embedding failed: {message}")]
    Embedding {
        message: String,
        #[source]
        source: Option<EmbedError>,
    },

    /// A query arrived before the index was built
    #[error("The index has not been built yet; initialize the retriever first")]
    IndexNotBuilt,

    /// A caller passed an argument outside the accepted range
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The on-disk embedding cache failed
    #[error("Embedding cache error: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RagError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn corpus_load<S: Into<String>>(path: &Path, message: S) -> Self {
        Self::CorpusLoad {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// An embedding failure that did not come from the provider itself,
    /// e.g. a vector count or dimension mismatch.
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding {
                source: Some(source),
                ..
            } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<EmbedError> for RagError {
    fn from(source: EmbedError) -> Self {
        Self::Embedding {
            message: source.to_string(),
            source: Some(source),
        }
    }
}

impl From<SplitError> for RagError {
    fn from(error: SplitError) -> Self {
        Self::config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_follows_embedding_source() {
        assert!(RagError::from(EmbedError::unavailable("HTTP 503")).is_retryable());
        assert!(!RagError::from(EmbedError::invalid_config("no key")).is_retryable());
        assert!(!RagError::embedding("dimension mismatch").is_retryable());
        assert!(!RagError::IndexNotBuilt.is_retryable());
    }

    #[test]
    fn test_corpus_error_names_the_file() {
        let err = RagError::corpus_load(Path::new("data/gdpr.json"), "file not found");
        assert_eq!(
            err.to_string(),
            "Failed to load corpus from data/gdpr.json: file not found"
        );
    }
}
