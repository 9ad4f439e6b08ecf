//! gdpr-ai-chat: Conversational question answering over the GDPR
//!
//! Each question goes through the same cycle: it is recorded in the
//! session's [`memory::ConversationMemory`], the most relevant article chunks
//! are retrieved, a [`generation::GenerationService`] writes an answer from
//! those chunks and the history, and the answer is recorded too.
//!
//! ## Key Modules
//!
//! - **[`session`]**: [`ChatSession`], the query surface
//! - **[`assembler`]**: The question/answer cycle with timeouts and retries
//! - **[`generation`]**: The generator trait, OpenAI chat completions and an offline generator
//! - **[`memory`]**: Conversation history
//! - **[`config`]**: The TOML application config
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gdpr_ai_chat::{AnswerOptions, ChatSession, generation::ExtractiveGenerator};
//! use gdpr_ai_embed::{EmbedConfig, create_provider};
//! use gdpr_ai_retriever::{RetrieverConfig, SharedRetriever};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let retriever: SharedRetriever = SharedRetriever::new();
//! let provider = create_provider(EmbedConfig::hashing(384)).await?;
//! retriever
//!     .initialize(RetrieverConfig::new("data/gdpr_articles.json"), provider)
//!     .await?;
//!
//! let session = ChatSession::new(
//!     retriever,
//!     Arc::new(ExtractiveGenerator::default()),
//!     AnswerOptions::default(),
//! );
//! println!("{}", session.ask("What is the right to erasure?").await?);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod config;
pub mod error;
pub mod generation;
pub mod memory;
pub mod retry;
pub mod session;

pub use assembler::{AnswerOptions, answer};
pub use config::AppConfig;
pub use error::{ChatError, Result};
pub use generation::{FALLBACK_ANSWER, GenerationError, GenerationRequest, GenerationService};
pub use memory::{ConversationMemory, Role, Turn};
pub use retry::RetryPolicy;
pub use session::ChatSession;
