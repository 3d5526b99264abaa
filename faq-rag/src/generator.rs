//! Answer generation with per-family payloads and rate-limit backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use faq_rag::{AnswerGenerator, GenerationParams};
//!
//! let generator = AnswerGenerator::builder()
//!     .backend(Arc::new(backend))
//!     .compartment_id("ocid1.compartment.oc1..example")
//!     .build()?;
//!
//! let params = GenerationParams::default().with_model("xai.grok-4").with_max_tokens(2_000);
//! let answer = generator.generate("What is a relational database?", &contexts, &params).await?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::GeneratorConfig;
use crate::document::{GeneratedAnswer, RankedChunk};
use crate::error::{RagError, Result};
use crate::llm::{
    ChatBackend, ChatDetails, ChatRequest, ChatResponse, CohereChatRequest, FailureClass,
    GenericChatRequest, Message, ModelCatalog, ModelFamily, ServingMode,
};
use crate::prompt::build_prompt;

/// Caller-tunable generation parameters.
///
/// `frequency_penalty` and `top_k` only reach Cohere-family models; the
/// generic payload has no slot for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Target model; `None` uses the generator's default model.
    pub model: Option<String>,
    /// Requested output ceiling, clamped to the model family's limit.
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    /// 0 disables top-k sampling.
    pub top_k: u32,
    /// Free-text instruction appended after the question.
    pub answer_instruction: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 128_000,
            temperature: 0.3,
            top_p: 0.75,
            frequency_penalty: 0.0,
            top_k: 0,
            answer_instruction: String::new(),
        }
    }
}

impl GenerationParams {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_frequency_penalty(mut self, frequency_penalty: f32) -> Self {
        self.frequency_penalty = frequency_penalty;
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_answer_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.answer_instruction = instruction.into();
        self
    }
}

/// Something that can wait. Backoff goes through this so it can be observed.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Builds prompts from ranked chunks and dispatches them to a [`ChatBackend`].
///
/// Rate-limit rejections are retried up to `max_retries` times, waiting
/// `retry_delay * 2^attempt` before each retry. Other failures are returned
/// at once as [`RagError::GenerationError`]; running out of retries yields
/// [`RagError::RateLimitError`].
pub struct AnswerGenerator {
    backend: Arc<dyn ChatBackend>,
    compartment_id: String,
    config: GeneratorConfig,
    catalog: ModelCatalog,
    sleeper: Arc<dyn Sleeper>,
}

impl AnswerGenerator {
    /// Create a new [`AnswerGeneratorBuilder`].
    pub fn builder() -> AnswerGeneratorBuilder {
        AnswerGeneratorBuilder::default()
    }

    /// The model used when a request does not name one.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// The model catalog used for family dispatch.
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Wait before retry number `attempt + 1`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.config.retry_delay_secs)
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Generate an answer to `query` grounded in `contexts`.
    ///
    /// # Errors
    ///
    /// - [`RagError::GenerationError`] if the backend fails with anything but
    ///   a rate-limit signal, or replies without text.
    /// - [`RagError::RateLimitError`] if every attempt was throttled.
    pub async fn generate(
        &self,
        query: &str,
        contexts: &[RankedChunk],
        params: &GenerationParams,
    ) -> Result<GeneratedAnswer> {
        let model = params
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.config.default_model)
            .to_string();

        let family = self.catalog.family_of(&model);
        let max_tokens = params.max_tokens.min(family.max_tokens_ceiling());
        let prompt = build_prompt(query, contexts, &params.answer_instruction);

        let details = ChatDetails {
            compartment_id: self.compartment_id.clone(),
            serving_mode: ServingMode::OnDemand { model_id: model.clone() },
            chat_request: chat_request(family, prompt, max_tokens, params),
        };

        debug!(
            backend = self.backend.name(),
            model = %model,
            ?family,
            max_tokens,
            context_count = contexts.len(),
            "dispatching chat request"
        );

        let started = Instant::now();
        let response = self.execute_with_retry(&details).await?;
        let generation_seconds = started.elapsed().as_secs_f64();

        let text = response.text().ok_or_else(|| {
            error!(model = %model, "chat response carried no text");
            RagError::GenerationError {
                model: model.clone(),
                message: "response contained no answer text".to_string(),
            }
        })?;

        info!(model = %model, generation_seconds, answer_len = text.len(), "answer generated");

        Ok(GeneratedAnswer { text, model_id: model, generation_seconds })
    }

    async fn execute_with_retry(&self, details: &ChatDetails) -> Result<ChatResponse> {
        let model = details.model_id();
        let mut attempt: u32 = 0;

        loop {
            let error = match self.backend.chat(details).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            match self.backend.classify(&error) {
                FailureClass::Fatal => {
                    error!(model, error = %error, "chat request failed");
                    return Err(RagError::GenerationError {
                        model: model.to_string(),
                        message: error.to_string(),
                    });
                }
                FailureClass::RateLimited if attempt < self.config.max_retries => {
                    let wait = self.backoff_delay(attempt);
                    warn!(
                        model,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        wait_secs = wait.as_secs(),
                        "rate limited, retrying"
                    );
                    self.sleeper.sleep(wait).await;
                    attempt += 1;
                }
                FailureClass::RateLimited => {
                    error!(model, attempts = attempt + 1, "rate limit retries exhausted");
                    return Err(RagError::RateLimitError {
                        model: model.to_string(),
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }
}

fn chat_request(
    family: ModelFamily,
    prompt: String,
    max_tokens: u32,
    params: &GenerationParams,
) -> ChatRequest {
    match family {
        ModelFamily::Cohere => ChatRequest::Cohere(CohereChatRequest {
            message: prompt,
            max_tokens,
            temperature: params.temperature,
            frequency_penalty: params.frequency_penalty,
            top_p: params.top_p,
            top_k: params.top_k,
        }),
        ModelFamily::Generic => ChatRequest::Generic(GenericChatRequest {
            messages: vec![Message::user_text(prompt)],
            max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        }),
    }
}

/// Builder for constructing an [`AnswerGenerator`].
///
/// `backend` and `compartment_id` are required.
#[derive(Default)]
pub struct AnswerGeneratorBuilder {
    backend: Option<Arc<dyn ChatBackend>>,
    compartment_id: Option<String>,
    config: GeneratorConfig,
    catalog: ModelCatalog,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl AnswerGeneratorBuilder {
    /// Set the chat backend.
    pub fn backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the compartment (tenant) every call is billed to.
    pub fn compartment_id(mut self, compartment_id: impl Into<String>) -> Self {
        self.compartment_id = Some(compartment_id.into());
        self
    }

    /// Set default model and retry policy.
    pub fn config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the built-in model catalog.
    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the sleeper used for backoff.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Build the [`AnswerGenerator`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the backend is missing, the
    /// compartment id is blank, or the retry policy is invalid.
    pub fn build(self) -> Result<AnswerGenerator> {
        let backend =
            self.backend.ok_or_else(|| RagError::ConfigError("backend is required".to_string()))?;
        let compartment_id = self
            .compartment_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RagError::ConfigError("compartment_id is required".to_string()))?;
        self.config.validate()?;

        Ok(AnswerGenerator {
            backend,
            compartment_id,
            config: self.config,
            catalog: self.catalog,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
        })
    }
}
