//! Cross-encoder relevance model served over HTTP.
//!
//! This module is only available when the `http` feature is enabled.
//!
//! Talks to a text-embeddings-inference style `/rerank` endpoint hosting a
//! cross-encoder such as `hotchpotch/japanese-reranker-base-v2`. The server
//! answers with `[{"index": i, "score": s}, ...]` in its own order; scores
//! are put back into passage order here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::RerankerConfig;
use crate::error::{RagError, Result};
use crate::reranker::RelevanceModel;

/// A [`RelevanceModel`] calling a remote `/rerank` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use faq_rag::{HttpCrossEncoder, Reranker, RerankerConfig};
///
/// let config = RerankerConfig::default();
/// let model = HttpCrossEncoder::new("http://localhost:8080", &config)?;
/// let reranker = Reranker::new(Arc::new(model), &config)?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpCrossEncoder {
    http: reqwest::Client,
    url: String,
    model_name: String,
    max_length: usize,
    auth_token: Option<String>,
}

impl HttpCrossEncoder {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `base_url` is not an http(s) URL
    /// or `config` is invalid.
    pub fn new(base_url: &str, config: &RerankerConfig) -> Result<Self> {
        config.validate()?;
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(RagError::ConfigError(format!(
                "reranker URL must be an http(s) URL, got '{base_url}'"
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            url: format!("{base}/rerank"),
            model_name: config.model_name.clone(),
            max_length: config.max_length,
            auth_token: None,
        })
    }

    /// Send `token` as a bearer token on every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into()).filter(|t| !t.trim().is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Longest passage, in characters, sent to the server.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn clipped<'p>(&self, passages: &[&'p str]) -> Vec<&'p str> {
        passages.iter().map(|&p| clip(p, self.max_length)).collect()
    }

    fn failure(&self, message: String) -> RagError {
        RagError::RerankerError { reranker: self.model_name.clone(), message }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

/// The first `max_chars` characters of `text`.
fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Put server scores back into passage order.
fn scores_in_order(
    scores: Vec<RerankScore>,
    expected: usize,
) -> std::result::Result<Vec<f32>, String> {
    let mut ordered: Vec<Option<f32>> = vec![None; expected];
    for RerankScore { index, score } in scores {
        match ordered.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(score),
            Some(_) => return Err(format!("duplicate score for passage {index}")),
            None => return Err(format!("score for unknown passage {index}")),
        }
    }
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| format!("no score for passage {i}")))
        .collect()
}

#[async_trait]
impl RelevanceModel for HttpCrossEncoder {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model_name, pairs = passages.len(), "scoring pairs");

        let texts = self.clipped(passages);
        let body = RerankRequest { query, texts: &texts, truncate: true };
        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(model = %self.model_name, error = %e, "rerank request failed");
            self.failure(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(model = %self.model_name, %status, "rerank service error");
            return Err(self.failure(format!("service returned {status}: {detail}")));
        }

        let scores: Vec<RerankScore> = response.json().await.map_err(|e| {
            error!(model = %self.model_name, error = %e, "failed to parse rerank response");
            self.failure(format!("failed to parse response: {e}"))
        })?;

        scores_in_order(scores, passages.len()).map_err(|message| self.failure(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(index: usize, score: f32) -> RerankScore {
        RerankScore { index, score }
    }

    #[test]
    fn scores_are_restored_to_passage_order() {
        let ordered = scores_in_order(vec![s(2, 0.9), s(0, 0.1), s(1, 0.5)], 3).unwrap();
        assert_eq!(ordered, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn missing_duplicate_or_stray_scores_are_errors() {
        assert!(scores_in_order(vec![s(0, 0.1)], 2).is_err());
        assert!(scores_in_order(vec![s(0, 0.1), s(0, 0.2)], 2).is_err());
        assert!(scores_in_order(vec![s(0, 0.1), s(5, 0.2)], 2).is_err());
    }

    #[test]
    fn clip_counts_characters_not_bytes() {
        assert_eq!(clip("データベース", 3), "データ");
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("", 4), "");
    }

    #[test]
    fn passages_are_cut_to_max_length() {
        let config = RerankerConfig { max_length: 4, ..RerankerConfig::default() };
        let model = HttpCrossEncoder::new("http://localhost:8080", &config).unwrap();
        assert_eq!(model.max_length(), 4);
        let clipped = model.clipped(&["abcdefgh", "ab", "表と行と列"]);
        assert_eq!(clipped, vec!["abcd", "ab", "表と行と"]);
    }

    #[test]
    fn url_points_at_rerank_route() {
        let model = HttpCrossEncoder::new("http://localhost:8080/", &RerankerConfig::default())
            .unwrap();
        assert_eq!(model.url(), "http://localhost:8080/rerank");
        assert_eq!(model.name(), "hotchpotch/japanese-reranker-base-v2");
        assert!(HttpCrossEncoder::new("localhost:8080", &RerankerConfig::default()).is_err());
    }
}
