use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::GenAiClient;
use crate::config::DEFAULT_EMBEDDING_MODEL;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::ServingMode;

const PROVIDER: &str = "oci-genai";

/// An [`EmbeddingProvider`] calling the `embedText` action.
///
/// Queries are embedded with input type `SEARCH_QUERY`; over-long input is
/// truncated at the end by the service.
#[derive(Debug, Clone)]
pub struct GenAiEmbeddingProvider {
    client: GenAiClient,
    compartment_id: String,
    model: String,
}

impl GenAiEmbeddingProvider {
    /// Create a provider using the default embedding model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `compartment_id` is blank.
    pub fn new(client: GenAiClient, compartment_id: impl Into<String>) -> Result<Self> {
        let compartment_id = compartment_id.into();
        if compartment_id.trim().is_empty() {
            return Err(RagError::ConfigError("compartment_id is required".to_string()));
        }
        Ok(Self { client, compartment_id, model: DEFAULT_EMBEDDING_MODEL.to_string() })
    }

    /// Set the embedding model (e.g. `cohere.embed-multilingual-v3.0`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedTextDetails<'a> {
    inputs: Vec<&'a str>,
    serving_mode: ServingMode,
    compartment_id: &'a str,
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Deserialize)]
struct EmbedTextResult {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for GenAiEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding query");

        let details = EmbedTextDetails {
            inputs: vec![text],
            serving_mode: ServingMode::OnDemand { model_id: self.model.clone() },
            compartment_id: &self.compartment_id,
            input_type: "SEARCH_QUERY",
            truncate: "END",
        };

        let result: EmbedTextResult =
            self.client.post("embedText", &details).await.map_err(|e| {
                error!(provider = PROVIDER, model = %self.model, error = %e, "embedding failed");
                RagError::EmbeddingError { provider: PROVIDER.to_string(), message: e.to_string() }
            })?;

        result.embeddings.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.to_string(),
            message: "service returned no embeddings".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_asks_for_query_embeddings() {
        let details = EmbedTextDetails {
            inputs: vec!["What is RAG?"],
            serving_mode: ServingMode::OnDemand { model_id: "cohere.embed-v4.0".into() },
            compartment_id: "ocid1.compartment.oc1..x",
            input_type: "SEARCH_QUERY",
            truncate: "END",
        };
        assert_eq!(
            serde_json::to_value(&details).unwrap(),
            json!({
                "inputs": ["What is RAG?"],
                "servingMode": {"servingType": "ON_DEMAND", "modelId": "cohere.embed-v4.0"},
                "compartmentId": "ocid1.compartment.oc1..x",
                "inputType": "SEARCH_QUERY",
                "truncate": "END"
            })
        );
    }

    #[test]
    fn blank_compartment_is_rejected() {
        let client = GenAiClient::new("https://x.example").unwrap();
        assert!(GenAiEmbeddingProvider::new(client, " ").is_err());
    }
}
