//! OpenAI chat completions as a [`GenerationService`].

use super::{FALLBACK_ANSWER, GenerationError, GenerationRequest, GenerationService};
use crate::error::ChatError;
use crate::memory::Role;
use async_trait::async_trait;
use gdpr_ai_embed::DEFAULT_OPENAI_API_BASE;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection settings for [`OpenAiChatService`]
#[derive(Clone, PartialEq)]
pub struct OpenAiChatConfig {
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChatConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiChatConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Answers with an OpenAI-compatible `/chat/completions` endpoint at temperature 0.
///
/// The request carries the system prompt with the retrieved context followed
/// by the whole conversation history. No retries happen here; transient
/// failures come back as [`GenerationError::Unavailable`].
#[derive(Clone)]
pub struct OpenAiChatService {
    client: Client,
    endpoint: String,
    model: String,
}

impl fmt::Debug for OpenAiChatService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChatService")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiChatService {
    pub fn new(config: OpenAiChatConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(ChatError::config("missing OpenAI API key"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ChatError::config("invalid OpenAI API key"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model,
        })
    }

    fn build_body<'a>(
        &'a self,
        request: &'a GenerationRequest,
        system: &'a str,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
        messages.extend(request.history.iter().map(|turn| ChatMessage {
            role: match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &turn.content,
        }));
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages,
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::unavailable(err.to_string())
    } else {
        GenerationError::malformed(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> GenerationError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GenerationError::unavailable(format!("HTTP {status}: {body}"))
    } else {
        GenerationError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    }
}

fn extract_answer(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .map(normalize_fallback)
        .ok_or_else(|| GenerationError::malformed("response contained no answer"))
}

/// Replies that only differ from [`FALLBACK_ANSWER`] in case, quoting or
/// punctuation become the fallback itself.
fn normalize_fallback(content: String) -> String {
    let bare = content
        .trim_matches(|c: char| c == '"' || c == '.' || c == '!' || c.is_whitespace())
        .replace('\u{2019}', "'")
        .to_lowercase();
    if bare == FALLBACK_ANSWER.trim_end_matches('.').to_lowercase() {
        FALLBACK_ANSWER.to_string()
    } else {
        content
    }
}

#[async_trait]
impl GenerationService for OpenAiChatService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let system = request.system_prompt();
        let body = self.build_body(request, &system);
        tracing::debug!(
            "Requesting completion from {} with {} passages and {} turns",
            self.model,
            request.context.len(),
            request.history.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::malformed(format!("failed to parse body: {e}")))?;
        extract_answer(parsed)
    }

    fn service_name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
