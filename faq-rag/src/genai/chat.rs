use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{GenAiClient, TOO_MANY_REQUESTS};
use crate::llm::{BackendError, ChatBackend, ChatDetails, ChatResponse, FailureClass};

/// A [`ChatBackend`] calling the `chat` action of the inference service.
///
/// # Example
///
/// ```rust,ignore
/// use faq_rag::genai::{GenAiChatBackend, GenAiClient};
///
/// let client = GenAiClient::new(&settings.genai_endpoint)?;
/// let backend = GenAiChatBackend::new(client);
/// ```
#[derive(Debug, Clone)]
pub struct GenAiChatBackend {
    client: GenAiClient,
}

impl GenAiChatBackend {
    pub fn new(client: GenAiClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResult {
    chat_response: ChatResponse,
}

#[async_trait]
impl ChatBackend for GenAiChatBackend {
    fn name(&self) -> &str {
        "oci-genai"
    }

    async fn chat(&self, details: &ChatDetails) -> Result<ChatResponse, BackendError> {
        debug!(model = details.model_id(), "chat request");
        let result: ChatResult = self.client.post("chat", details).await?;
        Ok(result.chat_response)
    }

    fn classify(&self, error: &BackendError) -> FailureClass {
        if error.status == Some(429) || error.code.as_deref() == Some(TOO_MANY_REQUESTS) {
            FailureClass::RateLimited
        } else {
            FailureClass::Fatal
        }
    }
}
