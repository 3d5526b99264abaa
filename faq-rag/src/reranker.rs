//! Cross-encoder reranking with a retrieval-order fallback.
//!
//! A [`RelevanceModel`] scores `(query, passage)` pairs. [`Reranker`] sorts
//! candidates by that score and keeps the best `top_n`. When the model fails
//! for any reason the reranker does not return an error: it keeps the
//! retrieval order instead and reports that through [`RerankOutcome::Degraded`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::RerankerConfig;
use crate::document::{RankedChunk, RetrievedChunk};
use crate::error::{RagError, Result};

/// A model that scores how well a passage answers a query.
///
/// Implementations can wrap a cross-encoder served over HTTP, a local model,
/// or any other scorer. Higher scores mean more relevant.
#[async_trait]
pub trait RelevanceModel: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Score each passage against the query.
    ///
    /// Must return exactly one score per passage, in input order.
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// The result of a rerank call.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    /// The model scored every candidate. Chunks are in descending score order.
    Scored(Vec<RankedChunk>),
    /// The model failed. Chunks are in ascending distance order, unscored.
    Degraded {
        chunks: Vec<RankedChunk>,
        /// Why scoring failed.
        reason: String,
    },
}

impl RerankOutcome {
    /// Borrow the ranked chunks regardless of how they were produced.
    pub fn chunks(&self) -> &[RankedChunk] {
        match self {
            RerankOutcome::Scored(chunks) | RerankOutcome::Degraded { chunks, .. } => chunks,
        }
    }

    /// Take the ranked chunks regardless of how they were produced.
    pub fn into_chunks(self) -> Vec<RankedChunk> {
        match self {
            RerankOutcome::Scored(chunks) | RerankOutcome::Degraded { chunks, .. } => chunks,
        }
    }

    /// Whether the fallback path was taken.
    pub fn is_degraded(&self) -> bool {
        matches!(self, RerankOutcome::Degraded { .. })
    }
}

/// Reorders retrieval candidates by cross-encoder relevance.
pub struct Reranker {
    model: Arc<dyn RelevanceModel>,
    batch_size: usize,
}

impl Reranker {
    /// Create a reranker scoring pairs in batches of `config.batch_size`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid.
    pub fn new(model: Arc<dyn RelevanceModel>, config: &RerankerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { model, batch_size: config.batch_size })
    }

    /// Rerank `candidates` against `query` and keep the best `top_n`.
    ///
    /// The output holds `min(top_n, candidates.len())` chunks. Model failures
    /// never surface as errors; see [`RerankOutcome::Degraded`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RerankerError`] before any model call if `query`
    /// is blank or `top_n == 0`.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievedChunk>,
        top_n: usize,
    ) -> Result<RerankOutcome> {
        if query.trim().is_empty() {
            return Err(self.invalid("query cannot be empty"));
        }
        if top_n == 0 {
            return Err(self.invalid("top_n must be > 0"));
        }
        if candidates.is_empty() {
            return Ok(RerankOutcome::Scored(Vec::new()));
        }

        match self.score_all(query, &candidates).await {
            Ok(scores) => {
                let mut ranked: Vec<RankedChunk> = candidates
                    .into_iter()
                    .zip(scores)
                    .map(|(chunk, score)| RankedChunk::scored(chunk, f64::from(score)))
                    .collect();
                ranked.sort_by(|a, b| {
                    let a = a.relevance_score.unwrap_or(f64::NEG_INFINITY);
                    let b = b.relevance_score.unwrap_or(f64::NEG_INFINITY);
                    b.total_cmp(&a)
                });
                ranked.truncate(top_n);
                debug!(reranker = self.model.name(), kept = ranked.len(), "rerank completed");
                Ok(RerankOutcome::Scored(ranked))
            }
            Err(e) => {
                warn!(
                    reranker = self.model.name(),
                    error = %e,
                    top_n,
                    "rerank failed, keeping vector search order"
                );
                Ok(RerankOutcome::Degraded {
                    chunks: fallback(candidates, top_n),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn score_all(&self, query: &str, candidates: &[RetrievedChunk]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(self.batch_size) {
            let passages: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let batch_scores = self.model.score(query, &passages).await?;
            if batch_scores.len() != passages.len() {
                return Err(self.failure(format!(
                    "model returned {} scores for {} passages",
                    batch_scores.len(),
                    passages.len()
                )));
            }
            if let Some(bad) = batch_scores.iter().find(|s| !s.is_finite()) {
                return Err(self.failure(format!("model returned a non-finite score ({bad})")));
            }
            scores.extend(batch_scores);
        }
        Ok(scores)
    }

    fn invalid(&self, message: &str) -> RagError {
        self.failure(message.to_string())
    }

    fn failure(&self, message: String) -> RagError {
        RagError::RerankerError { reranker: self.model.name().to_string(), message }
    }
}

/// Retrieval order, truncated and unscored.
fn fallback(mut candidates: Vec<RetrievedChunk>, top_n: usize) -> Vec<RankedChunk> {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.into_iter().take(top_n).map(RankedChunk::unscored).collect()
}
