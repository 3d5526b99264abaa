//! Chat backend seam, model catalog, and the two request/response shapes.
//!
//! Models fall into two families that speak different payloads:
//!
//! - [`ModelFamily::Cohere`]: a single `message` string plus sampling knobs
//!   including `frequencyPenalty` and `topK`; the reply is a flat `text`.
//! - [`ModelFamily::Generic`]: a list of role-tagged messages made of content
//!   parts; the reply is a list of `choices`, each holding a message.
//!
//! Family membership is data in a [`ModelCatalog`], not a property of the
//! model name. Unknown models are treated as generic.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request/response convention used by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Cohere,
    Generic,
}

impl ModelFamily {
    /// Largest `max_tokens` the family accepts.
    pub fn max_tokens_ceiling(self) -> u32 {
        match self {
            ModelFamily::Cohere => 4_000,
            ModelFamily::Generic => 128_000,
        }
    }
}

/// Models known out of the box.
const BUILTIN_MODELS: &[(&str, ModelFamily)] = &[
    ("cohere.command-a-03-2025", ModelFamily::Cohere),
    ("cohere.command-r-plus-08-2024", ModelFamily::Cohere),
    ("meta.llama-3.3-70b-instruct", ModelFamily::Generic),
    ("xai.grok-4-fast-non-reasoning", ModelFamily::Generic),
    ("xai.grok-4-fast-reasoning", ModelFamily::Generic),
    ("xai.grok-4", ModelFamily::Generic),
    ("google.gemini-2.5-pro", ModelFamily::Generic),
    ("google.gemini-2.5-flash", ModelFamily::Generic),
    ("google.gemini-2.5-flash-lite", ModelFamily::Generic),
    ("openai.gpt-oss-20b", ModelFamily::Generic),
    ("openai.gpt-oss-120b", ModelFamily::Generic),
];

/// Lookup table from model identifier to [`ModelFamily`].
///
/// Keys are compared case-insensitively.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    families: HashMap<String, ModelFamily>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// A catalog holding the built-in models.
    pub fn builtin() -> Self {
        let families =
            BUILTIN_MODELS.iter().map(|(id, family)| (id.to_ascii_lowercase(), *family)).collect();
        Self { families }
    }

    /// An empty catalog; every model resolves to [`ModelFamily::Generic`].
    pub fn empty() -> Self {
        Self { families: HashMap::new() }
    }

    /// Register (or re-register) a model.
    pub fn with_model(mut self, model_id: &str, family: ModelFamily) -> Self {
        self.families.insert(model_id.to_ascii_lowercase(), family);
        self
    }

    /// Family of `model_id`, defaulting to [`ModelFamily::Generic`].
    pub fn family_of(&self, model_id: &str) -> ModelFamily {
        self.families.get(&model_id.to_ascii_lowercase()).copied().unwrap_or(ModelFamily::Generic)
    }

    /// Whether `model_id` is registered.
    pub fn contains(&self, model_id: &str) -> bool {
        self.families.contains_key(&model_id.to_ascii_lowercase())
    }

    /// Registered model identifiers, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.families.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// ── Request shapes ─────────────────────────────────────────────────

/// A chat call: who pays for it, which model serves it, and the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetails {
    pub compartment_id: String,
    pub serving_mode: ServingMode,
    pub chat_request: ChatRequest,
}

impl ChatDetails {
    /// The model this call is addressed to.
    pub fn model_id(&self) -> &str {
        match &self.serving_mode {
            ServingMode::OnDemand { model_id } => model_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "servingType")]
pub enum ServingMode {
    #[serde(rename = "ON_DEMAND", rename_all = "camelCase")]
    OnDemand { model_id: String },
}

/// A chat payload in one of the two family shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "apiFormat")]
pub enum ChatRequest {
    #[serde(rename = "COHERE")]
    Cohere(CohereChatRequest),
    #[serde(rename = "GENERIC")]
    Generic(GenericChatRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohereChatRequest {
    pub message: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub top_p: f32,
    /// 0 disables top-k sampling.
    pub top_k: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericChatRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl Message {
    /// A user message with a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentPart::Text { text: text.into() }] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "TEXT")]
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

// ── Response shapes ────────────────────────────────────────────────

/// A chat reply in one of the two family shapes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "apiFormat")]
pub enum ChatResponse {
    #[serde(rename = "COHERE")]
    Cohere(CohereChatResponse),
    #[serde(rename = "GENERIC")]
    Generic(GenericChatResponse),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CohereChatResponse {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenericChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    pub message: Message,
}

impl ChatResponse {
    /// The answer text: the flat `text` field, or the text parts of the
    /// first choice joined together. `None` if the reply carries no text.
    pub fn text(&self) -> Option<String> {
        match self {
            ChatResponse::Cohere(reply) => Some(reply.text.clone()),
            ChatResponse::Generic(reply) => {
                let message = &reply.choices.first()?.message;
                let parts: Vec<&str> = message
                    .content
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(text.as_str()),
                        ContentPart::Unsupported => None,
                    })
                    .collect();
                if parts.is_empty() { None } else { Some(parts.concat()) }
            }
        }
    }
}

// ── Backend seam ───────────────────────────────────────────────────

/// A failed chat call as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Transport status, when the failure came from the service.
    pub status: Option<u16>,
    /// Service-specific error code, when the body carried one.
    pub code: Option<String>,
    pub message: String,
}

impl BackendError {
    /// An error without a status (connection failure, bad payload, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, code: None, message: message.into() }
    }

    /// An error the service answered with.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), code: None, message: message.into() }
    }

    /// Attach a service error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "{status} {code}: {}", self.message),
            (Some(status), None) => write!(f, "{status}: {}", self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

/// How a backend failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The caller exceeded its quota; retrying later may succeed.
    RateLimited,
    /// Anything else; retrying will not help.
    Fatal,
}

/// A chat service accepting [`ChatDetails`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Send one chat call.
    async fn chat(&self, details: &ChatDetails) -> Result<ChatResponse, BackendError>;

    /// Decide whether `error` is a rate-limit signal.
    ///
    /// The default treats HTTP 429 as rate limiting and everything else as
    /// fatal. Backends that signal throttling differently override this.
    fn classify(&self, error: &BackendError) -> FailureClass {
        if error.status == Some(429) { FailureClass::RateLimited } else { FailureClass::Fatal }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builtin_catalog_covers_both_families() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.models().len(), 11);
        assert_eq!(catalog.family_of("cohere.command-a-03-2025"), ModelFamily::Cohere);
        assert_eq!(catalog.family_of("COHERE.Command-R-Plus-08-2024"), ModelFamily::Cohere);
        assert_eq!(catalog.family_of("google.gemini-2.5-flash"), ModelFamily::Generic);
    }

    #[test]
    fn unknown_models_are_generic_even_with_cohere_in_the_name() {
        let catalog = ModelCatalog::builtin();
        assert!(!catalog.contains("acme.cohere-lookalike"));
        assert_eq!(catalog.family_of("acme.cohere-lookalike"), ModelFamily::Generic);

        let catalog = catalog.with_model("acme.cohere-lookalike", ModelFamily::Cohere);
        assert_eq!(catalog.family_of("acme.cohere-lookalike"), ModelFamily::Cohere);
    }

    #[test]
    fn cohere_request_wire_shape() {
        let details = ChatDetails {
            compartment_id: "ocid1.compartment".into(),
            serving_mode: ServingMode::OnDemand { model_id: "cohere.command-a-03-2025".into() },
            chat_request: ChatRequest::Cohere(CohereChatRequest {
                message: "hi".into(),
                max_tokens: 4000,
                temperature: 0.5,
                frequency_penalty: 0.0,
                top_p: 0.75,
                top_k: 0,
            }),
        };
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(
            value,
            json!({
                "compartmentId": "ocid1.compartment",
                "servingMode": { "servingType": "ON_DEMAND", "modelId": "cohere.command-a-03-2025" },
                "chatRequest": {
                    "apiFormat": "COHERE",
                    "message": "hi",
                    "maxTokens": 4000,
                    "temperature": 0.5,
                    "frequencyPenalty": 0.0,
                    "topP": 0.75,
                    "topK": 0
                }
            })
        );
        assert_eq!(details.model_id(), "cohere.command-a-03-2025");
    }

    #[test]
    fn generic_request_wire_shape() {
        let request = ChatRequest::Generic(GenericChatRequest {
            messages: vec![Message::user_text("hi")],
            max_tokens: 1000,
            temperature: 0.5,
            top_p: 0.75,
        });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "apiFormat": "GENERIC",
                "messages": [{ "role": "USER", "content": [{ "type": "TEXT", "text": "hi" }] }],
                "maxTokens": 1000,
                "temperature": 0.5,
                "topP": 0.75
            })
        );
    }

    #[test]
    fn both_response_shapes_yield_text() {
        let cohere: ChatResponse =
            serde_json::from_value(json!({ "apiFormat": "COHERE", "text": "flat answer" })).unwrap();
        assert_eq!(cohere.text().as_deref(), Some("flat answer"));

        let generic: ChatResponse = serde_json::from_value(json!({
            "apiFormat": "GENERIC",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "ASSISTANT",
                    "content": [
                        { "type": "TEXT", "text": "part one, " },
                        { "type": "IMAGE", "imageUrl": { "url": "x" } },
                        { "type": "TEXT", "text": "part two" }
                    ]
                },
                "finishReason": "stop"
            }]
        }))
        .unwrap();
        assert_eq!(generic.text().as_deref(), Some("part one, part two"));

        let empty: ChatResponse =
            serde_json::from_value(json!({ "apiFormat": "GENERIC", "choices": [] })).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn backend_error_display() {
        assert_eq!(BackendError::status(429, "slow down").to_string(), "429: slow down");
        assert_eq!(
            BackendError::status(400, "bad").with_code("InvalidParameter").to_string(),
            "400 InvalidParameter: bad"
        );
        assert_eq!(BackendError::transport("reset").to_string(), "reset");
    }
}
