//! Turning retrieved passages and conversation history into an answer.
//!
//! [`GenerationService`] is the seam between the assembler and whatever model
//! writes the answer. Implementations must reply with exactly
//! [`FALLBACK_ANSWER`] when the supplied context has nothing relevant to the
//! question; callers rely on that string verbatim.

pub mod offline;
pub mod openai;

use crate::memory::Turn;
use async_trait::async_trait;
use gdpr_ai_context::Chunk;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub use offline::ExtractiveGenerator;
pub use openai::{OpenAiChatConfig, OpenAiChatService};

/// The exact reply for questions the context cannot answer.
pub const FALLBACK_ANSWER: &str = "I don't know.";

/// System prompt; `{context}` is replaced by the rendered passages and
/// `{fallback}` by [`FALLBACK_ANSWER`].
pub const SYSTEM_TEMPLATE: &str = "\
You are a helpful assistant who answers questions about the GDPR Articles. Answer the user's questions based on the below context.
If the context doesn't contain any relevant information to the question, don't make something up and reply exactly with \"{fallback}\":

<context>
{context}
</context>
";

/// A retrieved chunk as handed to the generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextPassage {
    pub text: String,
    pub article_number: u32,
    pub article_summary: String,
}

impl From<&Chunk> for ContextPassage {
    fn from(chunk: &Chunk) -> Self {
        Self {
            text: chunk.content.clone(),
            article_number: chunk.metadata.article_number,
            article_summary: chunk.metadata.article_summary.clone(),
        }
    }
}

impl From<Chunk> for ContextPassage {
    fn from(chunk: Chunk) -> Self {
        Self {
            text: chunk.content,
            article_number: chunk.metadata.article_number,
            article_summary: chunk.metadata.article_summary,
        }
    }
}

/// Everything a generator sees for one answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Passages, most relevant first
    pub context: Vec<ContextPassage>,
    /// Conversation so far, oldest first; the last turn is the question
    pub history: Vec<Turn>,
}

impl GenerationRequest {
    pub fn new(context: Vec<ContextPassage>, history: Vec<Turn>) -> Self {
        Self { context, history }
    }

    /// Passages separated by blank lines.
    pub fn render_context(&self) -> String {
        self.context
            .iter()
            .map(|passage| passage.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn system_prompt(&self) -> String {
        SYSTEM_TEMPLATE
            .replace("{fallback}", FALLBACK_ANSWER)
            .replace("{context}", &self.render_context())
    }

    /// Content of the most recent user turn.
    pub fn question(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == crate::memory::Role::User)
            .map(|turn| turn.content.as_str())
    }
}

/// Errors from a generation service
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The service could not be reached or is overloaded; worth retrying
    #[error("Generation service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Generation timed out after {after:?}")]
    Timeout { after: Duration },

    /// The service refused the request; retrying will not help
    #[error("Generation request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed generation response: {message}")]
    Malformed { message: String },
}

impl GenerationError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Something that writes an answer from context and history.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    fn service_name(&self) -> &str;
}
