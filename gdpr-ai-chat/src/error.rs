use crate::generation::GenerationError;
use gdpr_ai_retriever::RagError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors surfaced to whoever asked a question.
///
/// Neither variant ends the session: the question stays in the conversation
/// history and the caller may ask again.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RagError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl ChatError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether asking the same question again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config { .. } => false,
            Self::Retrieval(RagError::IndexNotBuilt) => true,
            Self::Retrieval(e) => e.is_retryable(),
            Self::Generation(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display_and_retryability() {
        let err = ChatError::from(GenerationError::Timeout {
            after: Duration::from_secs(5),
        });
        assert_eq!(err.to_string(), "Generation failed: Generation timed out after 5s");
        assert!(err.is_retryable());

        let err = ChatError::from(RagError::IndexNotBuilt);
        assert!(err.is_retryable());
        assert!(!ChatError::config("bad toml").is_retryable());
    }
}
