//! `gdpr-ai.toml`: settings for every stage of the assistant.
//!
//! ```toml
//! [retriever]
//! corpus_path = "data/gdpr_articles.json"
//! chunk_size = 1000
//! chunk_overlap = 100
//! top_k = 4
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//!
//! [generation]
//! model = "gpt-4o-mini"
//! timeout_secs = 60
//! max_retries = 2
//! ```
//!
//! Every field has a default and missing sections use them. API keys never
//! appear in the file; they come from the command line or the environment.

use crate::assembler::AnswerOptions;
use crate::error::{ChatError, Result};
use crate::generation::OpenAiChatConfig;
use crate::retry::RetryPolicy;
use gdpr_ai_embed::{EmbedConfig, ProviderKind};
use gdpr_ai_retriever::RetrieverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The `[embedding]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    /// Defaults to the provider's default model
    pub model: Option<String>,
    pub dimensions: Option<usize>,
    pub api_base: Option<String>,
    pub batch_size: usize,
    /// Where local models are downloaded
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: None,
            dimensions: None,
            api_base: None,
            batch_size: 32,
            cache_dir: PathBuf::from(".gdpr-ai/models"),
            timeout_secs: 60,
        }
    }
}

impl EmbeddingSettings {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn to_embed_config(&self, api_key: Option<&str>) -> EmbedConfig {
        let mut config = EmbedConfig::new(self.provider, self.model())
            .with_batch_size(self.batch_size)
            .with_cache_dir(&self.cache_dir);
        config.timeout_secs = self.timeout_secs;
        if let Some(dimensions) = self.dimensions {
            config = config.with_dimensions(dimensions);
        }
        if let Some(api_base) = &self.api_base {
            config = config.with_api_base(api_base);
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        config
    }
}

/// The `[generation]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub api_base: Option<String>,
    /// Limit for one generation attempt
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Turns of history sent with each question; unset sends all of them
    pub max_history_turns: Option<usize>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            timeout_secs: 60,
            max_retries: 2,
            max_history_turns: None,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn to_openai_config(&self, api_key: &str) -> OpenAiChatConfig {
        let config = OpenAiChatConfig::new(&self.model, api_key).with_timeout(self.timeout());
        match &self.api_base {
            Some(api_base) => config.with_api_base(api_base),
            None => config,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub retriever: RetrieverConfig,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

impl AppConfig {
    /// Load `path`, or the defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| ChatError::config(format!("{} in {}", e, path.display())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ChatError::config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ChatError::config(format!("Failed to serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.retriever
            .validate()
            .map_err(|e| ChatError::config(e.to_string()))?;
        self.embedding
            .to_embed_config(None)
            .validate()
            .map_err(|e| ChatError::config(e.to_string()))?;
        if self.generation.timeout_secs == 0 {
            return Err(ChatError::config(
                "generation.timeout_secs must be greater than zero",
            ));
        }
        if self.generation.max_history_turns == Some(0) {
            return Err(ChatError::config(
                "generation.max_history_turns must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn answer_options(&self) -> AnswerOptions {
        AnswerOptions::default()
            .with_top_k(self.retriever.top_k)
            .with_timeout(Some(self.generation.timeout()))
            .with_retry(RetryPolicy::new(self.generation.max_retries))
            .with_max_history_turns(self.generation.max_history_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = AppConfig::parse("[generation]\nmodel = \"gpt-4o\"\n").unwrap();
        assert_eq!(config.generation.model, "gpt-4o");
        assert_eq!(config.generation.max_retries, 2);
        assert_eq!(config.retriever.chunk_size, 1000);
        assert_eq!(config.retriever.chunk_overlap, 100);
        assert_eq!(config.retriever.top_k, 4);
        assert_eq!(config.embedding.provider, ProviderKind::OpenAi);
        assert_eq!(config.embedding.model(), "text-embedding-3-small");
    }

    #[test]
    fn test_embedding_section() {
        let config = AppConfig::parse(
            "[embedding]\nprovider = \"hash\"\ndimensions = 256\n\n[retriever]\ntop_k = 6\n",
        )
        .unwrap();
        let embed = config.embedding.to_embed_config(Some("sk-test"));
        assert_eq!(embed.provider, ProviderKind::Hash);
        assert_eq!(embed.dimensions, Some(256));
        assert_eq!(embed.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.answer_options().top_k, 6);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let overlap = AppConfig::parse("[retriever]\nchunk_size = 100\nchunk_overlap = 100\n");
        assert!(matches!(overlap, Err(ChatError::Config { .. })));
        assert!(AppConfig::parse("[generation]\ntimeout_secs = 0\n").is_err());
        let no_history = AppConfig::parse("[generation]\nmax_history_turns = 0\n");
        assert!(matches!(no_history, Err(ChatError::Config { .. })));
        assert!(AppConfig::parse("[generation]\nmax_history_turns = 1\n").is_ok());
        assert!(AppConfig::parse("[embedding]\nprovider = \"word2vec\"\n").is_err());
        assert!(AppConfig::parse("not toml at all [").is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut config = AppConfig::default();
        config.generation.max_history_turns = Some(8);
        config.embedding.provider = ProviderKind::FastEmbed;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();
        let loaded = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("gdpr-ai.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(AppConfig::load_from(&dir.path().join("gdpr-ai.toml")).is_err());
    }

    #[test]
    fn test_answer_options_follow_generation_settings() {
        let config = AppConfig::parse("[generation]\ntimeout_secs = 5\nmax_retries = 0\n").unwrap();
        let options = config.answer_options();
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.retry.max_retries, 0);
        assert_eq!(options.max_history_turns, None);
    }
}
