//! Data types for retrieved chunks, ranked chunks, and per-question results.

use serde::{Deserialize, Serialize};

/// A chunk returned by nearest-neighbour search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Identifier of the chunk in the store.
    pub chunk_id: i64,
    /// Identifier of the source document the chunk was cut from.
    pub document_id: i64,
    /// Display name of the source document (usually its file name).
    pub source_name: String,
    /// The chunk text.
    pub text: String,
    /// Cosine distance to the query (smaller is more similar).
    pub distance: f64,
}

/// A [`RetrievedChunk`] after the rerank stage.
///
/// `relevance_score` is `None` when the chunk was passed through without
/// scoring, either because reranking is disabled or because the relevance
/// model failed and the retrieval order was kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedChunk {
    /// The retrieved chunk.
    #[serde(flatten)]
    pub chunk: RetrievedChunk,
    /// Relevance score from the cross-encoder (higher is more relevant).
    pub relevance_score: Option<f64>,
}

impl RankedChunk {
    /// Wrap a chunk with a relevance score.
    pub fn scored(chunk: RetrievedChunk, relevance_score: f64) -> Self {
        Self { chunk, relevance_score: Some(relevance_score) }
    }

    /// Wrap a chunk without a relevance score.
    pub fn unscored(chunk: RetrievedChunk) -> Self {
        Self { chunk, relevance_score: None }
    }
}

/// An answer produced by the model backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedAnswer {
    /// The answer text.
    pub text: String,
    /// The model identifier that produced the answer.
    pub model_id: String,
    /// Wall-clock time of the dispatch, including any backoff sleeps.
    pub generation_seconds: f64,
}

/// The outcome of answering a single question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    /// The contexts handed to the model, serialised with
    /// [`format_grounding`](crate::prompt::format_grounding).
    pub grounding_text: String,
    pub search_seconds: f64,
    pub rerank_seconds: f64,
    pub generation_seconds: f64,
    pub total_seconds: f64,
    pub model_id: String,
}
