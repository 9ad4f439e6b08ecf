//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration mistakes, model loading failures, remote service
/// failures and runtime errors during embedding generation.
///
/// # Error Categories
///
/// - **Configuration Errors**: Unknown models, missing API keys, bad settings
/// - **Initialization Errors**: Failures during model loading or client setup
/// - **Transient Errors**: [`EmbedError::Unavailable`], worth retrying
/// - **Runtime Errors**: Problems during embedding generation or malformed responses
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The embedding service is temporarily unreachable, overloaded or rate limited
    #[error("Embedding service unavailable: {message}")]
    Unavailable { message: String },

    /// The embedding service answered with something we cannot use
    #[error("Invalid embedding response: {message}")]
    InvalidResponse { message: String },

    /// IO errors when reading model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    ///
    /// # Arguments
    /// * `source` - The underlying error that caused the initialization failure
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingGeneration {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Only transient service failures qualify; configuration and response
    /// errors will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(EmbedError::unavailable("HTTP 429").is_retryable());
        assert!(!EmbedError::invalid_config("missing key").is_retryable());
        assert!(!EmbedError::invalid_response("3 vectors for 4 inputs").is_retryable());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "model.onnx");
        assert!(!EmbedError::from(io).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = EmbedError::unavailable("HTTP 503");
        assert_eq!(err.to_string(), "Embedding service unavailable: HTTP 503");
        let err = EmbedError::invalid_config("Unsupported fastembed model: foo");
        assert_eq!(
            err.to_string(),
            "Invalid model configuration: Unsupported fastembed model: foo"
        );
    }
}
