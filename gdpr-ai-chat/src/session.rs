//! One conversation with the assistant.

use crate::assembler::{AnswerOptions, answer};
use crate::error::Result;
use crate::generation::GenerationService;
use crate::memory::{ConversationMemory, Turn};
use gdpr_ai_retriever::{FlatIndex, SharedRetriever, VectorIndex};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A conversation: its memory plus the shared retriever and generator.
///
/// Sessions never share memory with each other. Questions asked concurrently
/// on one session are answered one at a time, so every user turn is directly
/// followed by its answer.
pub struct ChatSession<I: VectorIndex = FlatIndex> {
    memory: Mutex<ConversationMemory>,
    retriever: SharedRetriever<I>,
    generator: Arc<dyn GenerationService>,
    options: AnswerOptions,
}

impl<I: VectorIndex> std::fmt::Debug for ChatSession<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.service_name())
            .field("options", &self.options)
            .finish()
    }
}

impl<I: VectorIndex> ChatSession<I> {
    pub fn new(
        retriever: SharedRetriever<I>,
        generator: Arc<dyn GenerationService>,
        options: AnswerOptions,
    ) -> Self {
        Self {
            memory: Mutex::new(ConversationMemory::new()),
            retriever,
            generator,
            options,
        }
    }

    /// Ask a question and get the answer.
    ///
    /// Fails with `Retrieval(IndexNotBuilt)` without touching the history when
    /// the index is still being built.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let retriever = self.retriever.get()?;
        let mut memory = self.memory.lock().await;
        answer(
            &mut memory,
            retriever,
            question,
            self.generator.as_ref(),
            &self.options,
        )
        .await
    }

    /// Snapshot of the conversation so far
    pub async fn history(&self) -> Vec<Turn> {
        self.memory.lock().await.history()
    }

    pub fn is_ready(&self) -> bool {
        self.retriever.is_ready()
    }

    pub fn options(&self) -> &AnswerOptions {
        &self.options
    }
}
