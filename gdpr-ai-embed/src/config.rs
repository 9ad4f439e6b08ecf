//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Base URL of the OpenAI REST API.
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Which embedding backend produces the vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted OpenAI embeddings endpoint (or any API-compatible server).
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Local ONNX models run through fastembed.
    #[serde(rename = "fastembed")]
    FastEmbed,
    /// Deterministic feature hashing; needs no model and no network.
    Hash,
}

impl ProviderKind {
    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "text-embedding-3-small",
            Self::FastEmbed => "all-MiniLM-L6-v2",
            Self::Hash => "fnv-token-hash",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::FastEmbed => "fastembed",
            Self::Hash => "hash",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderKind {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "fastembed" | "local" => Ok(Self::FastEmbed),
            "hash" | "hashing" | "offline" => Ok(Self::Hash),
            other => Err(EmbedError::invalid_config(format!(
                "Unknown embedding provider: {other}"
            ))),
        }
    }
}

/// Configuration for embedding providers.
///
/// One struct serves every backend; fields that a backend does not use are
/// ignored by it. The API key is never serialized, so a configuration can be
/// written to disk or hashed into a cache key without leaking the secret.
#[derive(Clone, Builder, Serialize, Deserialize, PartialEq)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Which backend to use
    #[builder(default)]
    pub provider: ProviderKind,
    /// Name of the embedding model to use
    pub model_name: String,
    /// Directory where local models are downloaded and cached
    #[builder(default = r#"PathBuf::from(".gdpr-ai/models")"#)]
    pub cache_dir: PathBuf,
    /// Maximum number of texts per request or model call
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Requested output dimension (OpenAI `dimensions`, hashing bucket count)
    #[builder(default)]
    pub dimensions: Option<usize>,
    /// Base URL of an OpenAI-compatible API
    #[builder(default)]
    pub api_base: Option<String>,
    /// API key for hosted providers
    #[builder(default)]
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Request timeout for hosted providers, in seconds
    #[builder(default = "60")]
    pub timeout_secs: u64,
}

impl fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("cache_dir", &self.cache_dir)
            .field("batch_size", &self.batch_size)
            .field("normalize", &self.normalize)
            .field("dimensions", &self.dimensions)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a configuration for `provider` using the given model
    pub fn new(provider: ProviderKind, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Configuration for the OpenAI embeddings endpoint
    pub fn openai(model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_base: Some(DEFAULT_OPENAI_API_BASE.to_string()),
            ..Self::new(ProviderKind::OpenAi, model_name)
        }
    }

    /// Configuration for a local fastembed model
    pub fn fastembed(model_name: impl Into<String>) -> Self {
        Self::new(ProviderKind::FastEmbed, model_name)
    }

    /// Configuration for the offline hashing provider with `dimension` buckets
    pub fn hashing(dimension: usize) -> Self {
        Self {
            dimensions: Some(dimension),
            ..Self::new(ProviderKind::Hash, ProviderKind::Hash.default_model())
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Set the API key (builder style)
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    /// Set the API base URL (builder style)
    pub fn with_api_base(self, api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
            ..self
        }
    }

    /// Set the output dimension (builder style)
    pub fn with_dimensions(self, dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            ..self
        }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The API base URL with any trailing slash removed
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_API_BASE)
            .trim_end_matches('/')
    }

    /// Validate settings that do not depend on the environment
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model_name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "batch_size must be greater than zero",
            ));
        }
        if self.dimensions == Some(0) {
            return Err(EmbedError::invalid_config(
                "dimensions must be greater than zero",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(EmbedError::invalid_config(
                "timeout_secs must be greater than zero",
            ));
        }
        tracing::debug!("Embedding configuration valid for: {}", self.model_name);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model_name: ProviderKind::default().default_model().to_string(),
            cache_dir: PathBuf::from(".gdpr-ai/models"),
            batch_size: 32,
            normalize: true,
            dimensions: None,
            api_base: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}
