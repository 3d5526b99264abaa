//! Generative AI inference service over HTTP.
//!
//! This module is only available when the `http` feature is enabled.
//!
//! [`GenAiChatBackend`] implements [`ChatBackend`](crate::ChatBackend) and
//! [`GenAiEmbeddingProvider`] implements
//! [`EmbeddingProvider`](crate::EmbeddingProvider). Both share a
//! [`GenAiClient`] holding the endpoint and an optional bearer token.
//! Request signing, when the service requires it, is expected to happen in
//! front of this client (a signing proxy or a token issued out of band).

mod chat;
mod embedding;

pub use chat::GenAiChatBackend;
pub use embedding::GenAiEmbeddingProvider;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{RagError, Result};
use crate::llm::BackendError;

/// API version prefix of every inference action.
const API_VERSION: &str = "20231130";

/// Error code the service uses for throttling.
pub const TOO_MANY_REQUESTS: &str = "TooManyRequests";

/// Connection details shared by the chat and embedding clients.
#[derive(Debug, Clone)]
pub struct GenAiClient {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl GenAiClient {
    /// Create a client for `endpoint`, e.g.
    /// `https://inference.generativeai.ap-osaka-1.oci.oraclecloud.com`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the endpoint is not an http(s) URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(RagError::ConfigError(format!(
                "generative AI endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
        Ok(Self { http: reqwest::Client::new(), endpoint, auth_token: None })
    }

    /// Send `token` as a bearer token on every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into()).filter(|t| !t.trim().is_empty());
        self
    }

    /// Use a preconfigured `reqwest::Client` (proxies, timeouts, ...).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/{API_VERSION}/actions/{action}", self.endpoint)
    }

    /// POST `body` to `action` and decode the JSON reply.
    async fn post<B, R>(&self, action: &str, body: &B) -> std::result::Result<R, BackendError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(self.action_url(action)).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(action, error = %e, "request failed");
            BackendError::transport(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = service_error(status.as_u16(), &body);
            error!(action, status = status.as_u16(), code = ?err.code, "service error");
            return Err(err);
        }

        response.json::<R>().await.map_err(|e| {
            error!(action, error = %e, "failed to parse response");
            BackendError::transport(format!("failed to parse response: {e}"))
        })
    }
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Turn a non-success reply into a [`BackendError`].
///
/// The service answers with `{"code": ..., "message": ...}`; anything else
/// is kept verbatim as the message.
fn service_error(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(ServiceErrorBody { code, message }) => {
            let message = message.unwrap_or_else(|| body.to_string());
            let err = BackendError::status(status, message);
            match code {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        Err(_) => BackendError::status(status, body),
    }
}
