//! Answering one question: remember it, retrieve context, generate, remember the answer.

use crate::error::{ChatError, Result};
use crate::generation::{
    ContextPassage, GenerationError, GenerationRequest, GenerationService,
};
use crate::memory::ConversationMemory;
use crate::retry::RetryPolicy;
use gdpr_ai_retriever::{Retriever, VectorIndex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs for [`answer`]
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOptions {
    /// Passages retrieved per question
    pub top_k: usize,
    /// Limit for each generation attempt; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    /// Most recent turns sent to the generator; `None` sends all of them.
    /// The question itself is always sent.
    pub max_history_turns: Option<usize>,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            timeout: Some(Duration::from_secs(60)),
            retry: RetryPolicy::default(),
            max_history_turns: None,
        }
    }
}

impl AnswerOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_history_turns(mut self, max_history_turns: Option<usize>) -> Self {
        self.max_history_turns = max_history_turns;
        self
    }
}

/// Answer `question` and record the exchange in `memory`.
///
/// The question is recorded as a user turn before anything else happens. The
/// generated text is recorded verbatim as an assistant turn and returned.
/// When retrieval or generation fails the user turn stays and no assistant
/// turn is added.
pub async fn answer<I: VectorIndex>(
    memory: &mut ConversationMemory,
    retriever: &Retriever<I>,
    question: &str,
    generator: &dyn GenerationService,
    options: &AnswerOptions,
) -> Result<String> {
    memory.append_user(question);

    let chunks = retriever.find_relevant(question, options.top_k).await?;
    for chunk in &chunks {
        debug!(
            "Context: article {} chunk {} ({} chars)",
            chunk.metadata.article_number,
            chunk.sequence,
            chunk.char_len()
        );
    }

    let request = GenerationRequest::new(
        chunks.into_iter().map(ContextPassage::from).collect(),
        memory.window(options.max_history_turns.map(|turns| turns.max(1))),
    );
    let reply = generate_with_retry(generator, &request, options).await?;

    memory.append_assistant(reply.clone());
    info!(
        "Answered with {} ({} passages, {} turns in memory)",
        generator.service_name(),
        request.context.len(),
        memory.len()
    );
    Ok(reply)
}

async fn generate_once(
    generator: &dyn GenerationService,
    request: &GenerationRequest,
    timeout: Option<Duration>,
) -> std::result::Result<String, GenerationError> {
    match timeout {
        Some(after) => tokio::time::timeout(after, generator.generate(request))
            .await
            .unwrap_or(Err(GenerationError::Timeout { after })),
        None => generator.generate(request).await,
    }
}

/// Call the generator, retrying retryable failures per `options.retry`.
pub async fn generate_with_retry(
    generator: &dyn GenerationService,
    request: &GenerationRequest,
    options: &AnswerOptions,
) -> Result<String> {
    let mut attempt = 0;
    loop {
        match generate_once(generator, request, options.timeout).await {
            Ok(reply) => return Ok(reply),
            Err(e) if e.is_retryable() && attempt < options.retry.max_retries => {
                attempt += 1;
                let delay = options.retry.backoff(attempt);
                warn!(
                    "Generation with {} failed (attempt {} of {}): {}; retrying in {:?}",
                    generator.service_name(),
                    attempt,
                    options.retry.max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(ChatError::Generation(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FALLBACK_ANSWER;
    use crate::memory::Role;
    use async_trait::async_trait;
    use gdpr_ai_context::Article;
    use gdpr_ai_embed::{EmbedConfig, create_provider};
    use gdpr_ai_retriever::{RagError, RetrieverConfig};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing_test::traced_test;

    async fn retriever() -> Retriever {
        let articles = vec![
            Article::new(
                7,
                "Conditions for consent",
                "The data subject shall have the right to withdraw his or her consent at any time.",
            ),
            Article::new(
                17,
                "Right to erasure",
                "The data subject shall have the right to obtain the erasure of personal data without undue delay.",
            ),
        ];
        let provider = create_provider(EmbedConfig::hashing(128)).await.unwrap();
        Retriever::from_articles(articles, RetrieverConfig::default(), provider)
            .await
            .unwrap()
    }

    fn fast_options() -> AnswerOptions {
        AnswerOptions::default().with_retry(
            RetryPolicy::new(2).with_backoff(Duration::from_millis(1), Duration::from_millis(2)),
        )
    }

    /// Records every request and replies with a fixed text.
    struct Recording {
        reply: String,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl Recording {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationService for Recording {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> std::result::Result<String, GenerationError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }

        fn service_name(&self) -> &str {
            "recording"
        }
    }

    /// Fails with the given error for the first `failures` calls.
    struct Failing {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> GenerationError,
    }

    #[async_trait]
    impl GenerationService for Failing {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<String, GenerationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err((self.error)())
            } else {
                Ok("recovered".to_string())
            }
        }

        fn service_name(&self) -> &str {
            "failing"
        }
    }

    struct Slow;

    #[async_trait]
    impl GenerationService for Slow {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }

        fn service_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_answer_records_both_turns() {
        let retriever = retriever().await;
        let generator = Recording::new("You may withdraw consent at any time.");
        let mut memory = ConversationMemory::new();

        let reply = answer(
            &mut memory,
            &retriever,
            "Can I withdraw consent?",
            &generator,
            &AnswerOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(reply, "You may withdraw consent at any time.");
        let history = memory.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "Can I withdraw consent?");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, reply);

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].context.len(), 2);
        assert_eq!(requests[0].context[0].article_number, 7);
        assert_eq!(requests[0].history.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_is_stored_verbatim() {
        let retriever = retriever().await;
        let generator = Recording::new(FALLBACK_ANSWER);
        let mut memory = ConversationMemory::new();

        let reply = answer(
            &mut memory,
            &retriever,
            "How big is the moon?",
            &generator,
            &AnswerOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(reply, FALLBACK_ANSWER);
        assert_eq!(memory.last().unwrap().content, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_history_window_is_applied() {
        let retriever = retriever().await;
        let generator = Recording::new("ok");
        let mut memory = ConversationMemory::new();
        let options = AnswerOptions::default().with_max_history_turns(Some(3));

        for question in ["first", "second", "third"] {
            answer(&mut memory, &retriever, question, &generator, &options)
                .await
                .unwrap();
        }

        assert_eq!(memory.len(), 6);
        let requests = generator.requests.lock().unwrap();
        let last = &requests[2].history;
        assert_eq!(last.len(), 3);
        assert_eq!(last[0].content, "second");
        assert_eq!(last[2].content, "third");
    }

    #[tokio::test]
    async fn test_zero_history_window_still_sends_question() {
        let retriever = retriever().await;
        let generator = Recording::new("ok");
        let mut memory = ConversationMemory::new();
        let options = AnswerOptions::default().with_max_history_turns(Some(0));

        for question in ["Can I withdraw consent?", "What is erasure?"] {
            answer(&mut memory, &retriever, question, &generator, &options)
                .await
                .unwrap();
        }

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[1].history.len(), 1);
        assert_eq!(requests[1].question(), Some("What is erasure?"));
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_only_user_turn() {
        let retriever = retriever().await;
        let generator = Failing {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: || GenerationError::Rejected {
                status: 401,
                message: "invalid key".to_string(),
            },
        };
        let mut memory = ConversationMemory::new();

        let err = answer(&mut memory, &retriever, "What is erasure?", &generator, &fast_options())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Generation(GenerationError::Rejected { status: 401, .. })
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.last().unwrap().role, Role::User);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let retriever = retriever().await;
        let generator = Failing {
            failures: 2,
            calls: AtomicU32::new(0),
            error: || GenerationError::unavailable("HTTP 503"),
        };
        let mut memory = ConversationMemory::new();

        let reply = answer(&mut memory, &retriever, "What is erasure?", &generator, &fast_options())
            .await
            .unwrap();
        assert_eq!(reply, "recovered");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(memory.len(), 2);
        assert!(logs_contain("Generation with failing failed (attempt 2 of 3)"));
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let retriever = retriever().await;
        let generator = Failing {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: || GenerationError::unavailable("HTTP 429"),
        };
        let mut memory = ConversationMemory::new();

        let err = answer(&mut memory, &retriever, "What is erasure?", &generator, &fast_options())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_generation_times_out() {
        let retriever = retriever().await;
        let mut memory = ConversationMemory::new();
        let options = AnswerOptions::default()
            .with_timeout(Some(Duration::from_millis(50)))
            .with_retry(RetryPolicy::none());

        let err = answer(&mut memory, &retriever, "What is erasure?", &Slow, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Generation(GenerationError::Timeout { after }) if after == Duration::from_millis(50)
        ));
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieval_failure_keeps_only_user_turn() {
        let retriever = retriever().await;
        let generator = Recording::new("unused");
        let mut memory = ConversationMemory::new();
        let options = AnswerOptions::default().with_top_k(0);

        let err = answer(&mut memory, &retriever, "What is erasure?", &generator, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::Retrieval(RagError::InvalidArgument { .. })
        ));
        assert_eq!(memory.len(), 1);
        assert!(generator.requests.lock().unwrap().is_empty());
    }
}
