//! Retrieval-augmented question answering over a document corpus.
//!
//! This crate provides:
//! - Vector search over pre-embedded chunks ([`VectorSearcher`], [`ChunkStore`])
//! - Cross-encoder reranking with a retrieval-order fallback ([`Reranker`])
//! - Grounded answer generation with rate-limit backoff ([`AnswerGenerator`])
//! - A pipeline answering single questions or whole question tables, with
//!   optional evaluation against reference answers ([`RagPipeline`])
//!
//! Network backends are feature-gated: `http` enables the generative AI chat
//! and embedding clients ([`genai`]) and [`HttpCrossEncoder`]; `pgvector`
//! enables [`PgVectorChunkStore`].

pub mod batch;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod generator;
pub mod inmemory;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod reranker;
pub mod searcher;
pub mod telemetry;
pub mod vectorstore;

#[cfg(feature = "http")]
pub mod cross_encoder;
#[cfg(feature = "http")]
pub mod genai;
#[cfg(feature = "pgvector")]
pub mod pgvector;

pub use batch::{
    BatchResult, BatchRow, FILTER_COLUMN, ProgressEvent, ProgressSender, QUESTION_COLUMN,
    QuestionTable, RowStatus,
};
pub use config::{GeneratorConfig, RagConfig, RagConfigBuilder, RerankerConfig, Settings};
pub use document::{GeneratedAnswer, QueryResult, RankedChunk, RetrievedChunk};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, RagError, Result};
pub use evaluation::{EvaluatedRow, EvaluationSample, EvaluationScores, Evaluator};
pub use generator::{
    AnswerGenerator, AnswerGeneratorBuilder, GenerationParams, Sleeper, TokioSleeper,
};
pub use inmemory::{InMemoryChunkStore, StoredChunk};
pub use llm::{
    BackendError, ChatBackend, ChatDetails, ChatResponse, FailureClass, ModelCatalog, ModelFamily,
};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{GroundingBlock, format_grounding, parse_grounding};
pub use reranker::{RelevanceModel, RerankOutcome, Reranker};
pub use searcher::VectorSearcher;
pub use vectorstore::ChunkStore;

#[cfg(feature = "http")]
pub use cross_encoder::HttpCrossEncoder;
#[cfg(feature = "http")]
pub use genai::{GenAiChatBackend, GenAiClient, GenAiEmbeddingProvider};
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorChunkStore;
