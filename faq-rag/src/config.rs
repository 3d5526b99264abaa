//! Configuration for the question-answering pipeline.
//!
//! Every component takes its configuration by value at construction time.
//! [`Settings`] gathers the whole set from the environment (optionally seeded
//! from a `.env` file) once, at process start.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default model used when a caller does not name one.
pub const DEFAULT_LLM_MODEL: &str = "cohere.command-a-03-2025";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "cohere.embed-v4.0";

/// Default cross-encoder used for reranking.
pub const DEFAULT_RERANKER_MODEL: &str = "hotchpotch/japanese-reranker-base-v2";

/// Retrieval and rerank parameters for [`RagPipeline`](crate::RagPipeline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Number of candidates fetched by vector search.
    pub top_k: usize,
    /// Number of chunks handed to the model after reranking.
    pub rerank_top_n: usize,
    /// Whether the cross-encoder stage runs at all.
    pub enable_reranking: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { top_k: 10, rerank_top_n: 5, enable_reranking: true }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of candidates fetched by vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of chunks kept after reranking.
    pub fn rerank_top_n(mut self, n: usize) -> Self {
        self.config.rerank_top_n = n;
        self
    }

    /// Enable or disable the rerank stage.
    pub fn enable_reranking(mut self, enabled: bool) -> Self {
        self.config.enable_reranking = enabled;
        self
    }

    /// Build the [`RagConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `top_k == 0` or `rerank_top_n == 0`.
    pub fn build(self) -> Result<RagConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.rerank_top_n == 0 {
            return Err(RagError::ConfigError(
                "rerank_top_n must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

/// Parameters of the answer generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Retries after a rate-limit rejection (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    /// Base backoff in seconds; attempt `n` waits `retry_delay_secs * 2^n`.
    pub retry_delay_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { default_model: DEFAULT_LLM_MODEL.to_string(), max_retries: 3, retry_delay_secs: 60 }
    }
}

impl GeneratorConfig {
    /// Check that the configuration can be used.
    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(RagError::ConfigError("default_model must not be empty".to_string()));
        }
        if self.retry_delay_secs == 0 {
            return Err(RagError::ConfigError("retry_delay must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Parameters of the cross-encoder reranker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankerConfig {
    /// Name of the cross-encoder model.
    pub model_name: String,
    /// Query/passage pairs scored per model call.
    pub batch_size: usize,
    /// Longest passage, in characters, sent for scoring; longer passages are cut.
    pub max_length: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self { model_name: DEFAULT_RERANKER_MODEL.to_string(), batch_size: 32, max_length: 512 }
    }
}

impl RerankerConfig {
    /// Check that the configuration can be used.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be > 0".to_string()));
        }
        if self.max_length == 0 {
            return Err(RagError::ConfigError("max_length must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Build the Generative AI inference endpoint for a region.
pub fn genai_endpoint_from_region(region: &str) -> String {
    format!("https://inference.generativeai.{region}.oci.oraclecloud.com")
}

/// Everything needed to wire up a pipeline against live services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Base URL of the Generative AI inference service.
    pub genai_endpoint: String,
    /// Compartment (tenant) that owns the inference calls.
    pub compartment_id: String,
    /// Bearer token sent with every inference call, if the gateway needs one.
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Connection string of the chunk store.
    #[serde(skip_serializing)]
    pub database_url: String,
    /// Base URL of the cross-encoder service, if reranking is served remotely.
    pub reranker_url: Option<String>,
    pub rag: RagConfig,
    pub generator: GeneratorConfig,
    pub reranker: RerankerConfig,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from a `.env` style file, falling back to the process
    /// environment for variables the file does not set.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                RagError::ConfigError(format!("failed to parse {}: {e}", path.display()))
            })?;
            vars.insert(key, value);
        }

        Self::from_lookup(|key| vars.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let compartment_id = get("OCI_COMPARTMENT_ID")
            .ok_or_else(|| RagError::ConfigError("OCI_COMPARTMENT_ID is not set".to_string()))?;

        let genai_endpoint = match (get("OCI_GENAI_ENDPOINT"), get("OCI_REGION")) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(region)) => genai_endpoint_from_region(&region),
            (None, None) => {
                return Err(RagError::ConfigError(
                    "either OCI_GENAI_ENDPOINT or OCI_REGION must be set".to_string(),
                ));
            }
        };

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| RagError::ConfigError("DATABASE_URL is not set".to_string()))?;

        let defaults = RagConfig::default();
        let rag = RagConfig::builder()
            .top_k(parse_var(&get, "TOP_K")?.unwrap_or(defaults.top_k))
            .rerank_top_n(parse_var(&get, "RERANK_TOP_N")?.unwrap_or(defaults.rerank_top_n))
            .enable_reranking(
                parse_var(&get, "ENABLE_RERANKING")?.unwrap_or(defaults.enable_reranking),
            )
            .build()?;

        let defaults = GeneratorConfig::default();
        let generator = GeneratorConfig {
            default_model: get("OCI_LLM_MODEL").unwrap_or(defaults.default_model),
            max_retries: parse_var(&get, "LLM_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_delay_secs: parse_var(&get, "LLM_RETRY_DELAY_SECS")?
                .unwrap_or(defaults.retry_delay_secs),
        };
        generator.validate()?;

        let defaults = RerankerConfig::default();
        let reranker = RerankerConfig {
            model_name: get("RERANKER_MODEL").unwrap_or(defaults.model_name),
            batch_size: parse_var(&get, "RERANKER_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            max_length: parse_var(&get, "RERANKER_MAX_LENGTH")?.unwrap_or(defaults.max_length),
        };
        reranker.validate()?;

        Ok(Self {
            genai_endpoint,
            compartment_id,
            auth_token: get("OCI_GENAI_AUTH_TOKEN"),
            embedding_model: get("OCI_EMBED_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            database_url,
            reranker_url: get("RERANKER_URL"),
            rag,
            generator,
            reranker,
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                RagError::ConfigError(format!("invalid value for {key} ({raw:?}): {e}"))
            })
        })
        .transpose()
}
