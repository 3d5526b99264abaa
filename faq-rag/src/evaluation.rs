//! Evaluator seam for scoring generated answers against reference answers.
//!
//! Scoring itself happens elsewhere; this crate only packages samples and
//! checks what comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::batch::BatchRow;
use crate::error::Result;

/// One question to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSample {
    pub question: String,
    pub answer: String,
    /// The contexts the answer was grounded in, one string per chunk.
    pub contexts: Vec<String>,
    pub ground_truth: String,
}

/// Per-sample metric columns, in sample order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub answer_correctness: Vec<f64>,
    pub context_recall: Vec<f64>,
}

/// A batch scorer such as an LLM-as-judge service.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score every sample. Must return one value in `[0, 1]` per sample for
    /// each metric.
    async fn evaluate(&self, samples: &[EvaluationSample]) -> Result<EvaluationScores>;
}

/// A [`BatchRow`] with its evaluation scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedRow {
    #[serde(flatten)]
    pub row: BatchRow,
    pub answer_correctness: f64,
    pub context_recall: f64,
}
