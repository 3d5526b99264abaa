//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use faq_rag::llm::{
    ChatChoice, CohereChatResponse, ContentPart, GenericChatResponse, Message, Role,
};
use faq_rag::{
    AnswerGenerator, BackendError, ChatBackend, ChatDetails, ChatResponse, ChunkStore,
    EmbeddingProvider, EvaluationSample, EvaluationScores, Evaluator, GeneratorConfig, RagError,
    RelevanceModel, Result, RetrievedChunk, Sleeper,
};

pub fn chunk(chunk_id: i64, source: &str, text: &str, distance: f64) -> RetrievedChunk {
    RetrievedChunk {
        chunk_id,
        document_id: chunk_id * 10,
        source_name: source.to_string(),
        text: text.to_string(),
        distance,
    }
}

/// Ten chunks at distances 0.1, 0.2, ... 1.0, named `doc{i}.pdf`.
pub fn ten_chunks() -> Vec<RetrievedChunk> {
    (1..=10)
        .map(|i| chunk(i, &format!("doc{i}.pdf"), &format!("passage {i}"), i as f64 / 10.0))
        .collect()
}

// ── Embedding ──────────────────────────────────────────────────────

/// Returns a fixed vector; fails for queries containing `fail_on`.
pub struct FixedEmbedder {
    pub fail_on: Option<String>,
}

impl FixedEmbedder {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail_on: None })
    }

    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self { fail_on: Some(marker.to_string()) })
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match &self.fail_on {
            Some(marker) if text.contains(marker.as_str()) => Err(RagError::EmbeddingError {
                provider: "fixed".to_string(),
                message: "service unavailable".to_string(),
            }),
            _ => Ok(vec![1.0, 0.0, 0.0]),
        }
    }
}

// ── Chunk store ────────────────────────────────────────────────────

/// Hands back a fixed candidate list in the order given, recording filters.
pub struct StaticStore {
    pub chunks: Vec<RetrievedChunk>,
    pub fail: bool,
    pub filters: Mutex<Vec<Option<String>>>,
}

impl StaticStore {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Arc<Self> {
        Arc::new(Self { chunks, fail: false, filters: Mutex::new(Vec::new()) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { chunks: Vec::new(), fail: true, filters: Mutex::new(Vec::new()) })
    }

    pub fn seen_filters(&self) -> Vec<Option<String>> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChunkStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn nearest(
        &self,
        _embedding: &[f32],
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>> {
        self.filters.lock().unwrap().push(filter.map(str::to_string));
        if self.fail {
            return Err(RagError::VectorStoreError {
                backend: "static".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

// ── Relevance model ────────────────────────────────────────────────

/// Scores passages with a closure over the passage text.
pub struct ClosureModel<F> {
    pub score_fn: F,
    pub calls: Mutex<Vec<usize>>,
}

impl<F> ClosureModel<F>
where
    F: Fn(&str) -> f32 + Send + Sync,
{
    pub fn new(score_fn: F) -> Arc<Self> {
        Arc::new(Self { score_fn, calls: Mutex::new(Vec::new()) })
    }

    /// Batch sizes of every call, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> RelevanceModel for ClosureModel<F>
where
    F: Fn(&str) -> f32 + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(passages.len());
        Ok(passages.iter().map(|p| (self.score_fn)(p)).collect())
    }
}

/// Always fails.
pub struct BrokenModel;

#[async_trait]
impl RelevanceModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
        Err(RagError::RerankerError {
            reranker: "broken".to_string(),
            message: "model weights not loaded".to_string(),
        })
    }
}

// ── Chat backend ───────────────────────────────────────────────────

pub fn cohere_reply(text: &str) -> ChatResponse {
    ChatResponse::Cohere(CohereChatResponse { text: text.to_string() })
}

pub fn generic_reply(text: &str) -> ChatResponse {
    ChatResponse::Generic(GenericChatResponse {
        choices: vec![ChatChoice {
            message: Message {
                role: Role::Assistant,
                content: vec![ContentPart::Text { text: text.to_string() }],
            },
        }],
    })
}

pub fn rate_limited() -> BackendError {
    BackendError::status(429, "Too many requests")
}

/// Replays scripted results and records every request.
///
/// When the script runs out, every further call answers `fallback`.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<std::result::Result<ChatResponse, BackendError>>>,
    fallback: std::result::Result<ChatResponse, BackendError>,
    pub requests: Mutex<Vec<ChatDetails>>,
}

impl ScriptedBackend {
    pub fn new(
        script: Vec<std::result::Result<ChatResponse, BackendError>>,
        fallback: std::result::Result<ChatResponse, BackendError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers `text` in the Cohere shape.
    pub fn answering(text: &str) -> Arc<Self> {
        Self::new(Vec::new(), Ok(cohere_reply(text)))
    }

    pub fn requests(&self) -> Vec<ChatDetails> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        details: &ChatDetails,
    ) -> std::result::Result<ChatResponse, BackendError> {
        self.requests.lock().unwrap().push(details.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Records requested sleeps without waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn durations(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn generator_with(
    backend: Arc<ScriptedBackend>,
    sleeper: Arc<RecordingSleeper>,
    config: GeneratorConfig,
) -> AnswerGenerator {
    AnswerGenerator::builder()
        .backend(backend)
        .compartment_id("ocid1.compartment.oc1..test")
        .config(config)
        .sleeper(sleeper)
        .build()
        .unwrap()
}

// ── Evaluator ──────────────────────────────────────────────────────

/// Scores every sample with fixed values and keeps the samples it saw.
pub struct FixedEvaluator {
    pub answer_correctness: f64,
    pub context_recall: f64,
    pub drop_one: bool,
    pub seen: Mutex<Vec<EvaluationSample>>,
}

impl FixedEvaluator {
    pub fn new(answer_correctness: f64, context_recall: f64) -> Arc<Self> {
        Arc::new(Self {
            answer_correctness,
            context_recall,
            drop_one: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn short_by_one() -> Arc<Self> {
        Arc::new(Self {
            answer_correctness: 0.5,
            context_recall: 0.5,
            drop_one: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn samples(&self) -> Vec<EvaluationSample> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for FixedEvaluator {
    async fn evaluate(&self, samples: &[EvaluationSample]) -> Result<EvaluationScores> {
        self.seen.lock().unwrap().extend_from_slice(samples);
        let n = if self.drop_one { samples.len().saturating_sub(1) } else { samples.len() };
        Ok(EvaluationScores {
            answer_correctness: vec![self.answer_correctness; n],
            context_recall: vec![self.context_recall; n],
        })
    }
}
