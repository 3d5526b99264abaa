//! Error types for the `faq-rag` crate.

use thiserror::Error;

/// Errors that can occur while answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// A caller supplied an argument that can never succeed (empty query,
    /// non-positive `top_k`, missing required column, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the chunk store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Retrieval failed. Wraps the embedding or store error that caused it.
    #[error("Vector search failed: {message}")]
    VectorSearchError {
        /// Context about the search that failed.
        message: String,
        /// The underlying cause.
        #[source]
        source: Box<RagError>,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// The model backend refused or failed for a reason other than throttling.
    #[error("Failed to generate answer with model {model}: {message}")]
    GenerationError {
        /// The model identifier the request was sent to.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The model backend kept throttling until the retry budget ran out.
    #[error("Rate limit exceeded for model {model} after {attempts} attempts")]
    RateLimitError {
        /// The model identifier the request was sent to.
        model: String,
        /// Total attempts made, including the first.
        attempts: u32,
    },

    /// An error raised by, or while packaging data for, the evaluator.
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`RagError`], used by callers that need to
/// branch on the kind of failure rather than on its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Retrieval,
    Rerank,
    Generation,
    RateLimit,
    Evaluation,
    Configuration,
}

impl RagError {
    /// Return the [`ErrorKind`] this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RagError::EmbeddingError { .. }
            | RagError::VectorStoreError { .. }
            | RagError::VectorSearchError { .. } => ErrorKind::Retrieval,
            RagError::RerankerError { .. } => ErrorKind::Rerank,
            RagError::GenerationError { .. } => ErrorKind::Generation,
            RagError::RateLimitError { .. } => ErrorKind::RateLimit,
            RagError::EvaluationError(_) => ErrorKind::Evaluation,
            RagError::ConfigError(_) => ErrorKind::Configuration,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
