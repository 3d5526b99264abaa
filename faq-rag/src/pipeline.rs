//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] answers a question by composing a [`VectorSearcher`],
//! an optional [`Reranker`], and an [`AnswerGenerator`], and drives the same
//! flow over a [`QuestionTable`] one row at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use faq_rag::{GenerationParams, QuestionTable, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .searcher(searcher)
//!     .reranker(reranker)
//!     .generator(generator)
//!     .build()?;
//!
//! let params = GenerationParams::default();
//! let result = pipeline.process_single("What is a relational database?", None, &params).await?;
//!
//! let table = QuestionTable::from_questions([("Q1", None), ("Q2", Some("manual".into()))]);
//! let batch = pipeline.process_batch(&table, &params).await?;
//! assert_eq!(batch.succeeded + batch.failed, batch.total);
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::batch::{
    BatchResult, BatchRow, FILTER_COLUMN, ProgressEvent, ProgressSender, QUESTION_COLUMN,
    QuestionTable, RowStatus,
};
use crate::config::RagConfig;
use crate::document::{QueryResult, RankedChunk, RetrievedChunk};
use crate::error::{RagError, Result};
use crate::evaluation::{EvaluatedRow, EvaluationSample, Evaluator};
use crate::generator::{AnswerGenerator, GenerationParams};
use crate::prompt::{format_grounding, parse_grounding};
use crate::reranker::{RerankOutcome, Reranker};
use crate::searcher::{VectorSearcher, preview};

/// The RAG pipeline orchestrator.
///
/// Stages run strictly in sequence: search, rerank (optional), generate.
/// There is no retry at this level; retry lives in [`AnswerGenerator`].
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    searcher: VectorSearcher,
    reranker: Option<Reranker>,
    generator: AnswerGenerator,
    evaluator: Option<Arc<dyn Evaluator>>,
    progress: Option<ProgressSender>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Whether an evaluator was supplied.
    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Answer one question.
    ///
    /// `filter` restricts retrieval to one source category.
    ///
    /// # Errors
    ///
    /// Returns the first unrecovered error: an invalid argument or
    /// [`RagError::VectorSearchError`] from retrieval, or
    /// [`RagError::GenerationError`] / [`RagError::RateLimitError`] from
    /// generation. Rerank failures are absorbed by the reranker's fallback.
    pub async fn process_single(
        &self,
        question: &str,
        filter: Option<&str>,
        params: &GenerationParams,
    ) -> Result<QueryResult> {
        let started = Instant::now();

        // 1. Vector search
        let stage = Instant::now();
        let candidates = self.searcher.search(question, self.config.top_k, filter).await?;
        let search_seconds = stage.elapsed().as_secs_f64();

        // 2. Rerank, or pass the retrieval order through
        let stage = Instant::now();
        let contexts = self.rank(question, candidates).await?;
        let rerank_seconds = stage.elapsed().as_secs_f64();

        // 3. Generate
        let answer = self.generator.generate(question, &contexts, params).await?;

        // 4. Keep what the model saw, for audit and evaluation
        let grounding_text = format_grounding(&contexts);
        let total_seconds = started.elapsed().as_secs_f64();

        info!(
            question = %preview(question),
            context_count = contexts.len(),
            model = %answer.model_id,
            search_seconds,
            rerank_seconds,
            generation_seconds = answer.generation_seconds,
            total_seconds,
            "question answered"
        );

        Ok(QueryResult {
            question: question.to_string(),
            answer: answer.text,
            grounding_text,
            search_seconds,
            rerank_seconds,
            generation_seconds: answer.generation_seconds,
            total_seconds,
            model_id: answer.model_id,
        })
    }

    async fn rank(
        &self,
        question: &str,
        candidates: Vec<RetrievedChunk>,
    ) -> Result<Vec<RankedChunk>> {
        let top_n = self.config.rerank_top_n;
        match (&self.reranker, self.config.enable_reranking) {
            (Some(reranker), true) => {
                let outcome = reranker.rerank(question, candidates, top_n).await?;
                if let RerankOutcome::Degraded { reason, .. } = &outcome {
                    debug!(reason = %reason, "answering from vector search order");
                }
                Ok(outcome.into_chunks())
            }
            _ => Ok(candidates.into_iter().take(top_n).map(RankedChunk::unscored).collect()),
        }
    }

    /// Answer every row of `table`, one after another.
    ///
    /// A failing row is recorded with `status = failed` and its error message
    /// and processing moves on; row failures never abort the batch. A blank
    /// `filter` cell means no filter.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] before processing anything if
    /// the table has no `question` column.
    pub async fn process_batch(
        &self,
        table: &QuestionTable,
        params: &GenerationParams,
    ) -> Result<BatchResult> {
        if table.column_index(QUESTION_COLUMN).is_none() {
            return Err(RagError::InvalidArgument(format!(
                "question table must have a '{QUESTION_COLUMN}' column"
            )));
        }

        let started = Instant::now();
        let total = table.len();
        let mut rows = Vec::with_capacity(total);
        let mut succeeded = 0;
        let mut failed = 0;

        info!(total, "batch started");

        for index in 0..total {
            let question = table.cell(index, QUESTION_COLUMN).unwrap_or_default().to_string();
            let filter = normalize_filter(table.cell(index, FILTER_COLUMN)).map(str::to_string);

            self.notify(ProgressEvent::RowStarted { index, total, question: preview(&question) });

            let mut row = BatchRow {
                index,
                inputs: table.row_map(index),
                question,
                filter,
                answer: String::new(),
                grounding_text: String::new(),
                search_seconds: 0.0,
                rerank_seconds: 0.0,
                generation_seconds: 0.0,
                total_seconds: 0.0,
                model_id: None,
                status: RowStatus::Failed,
                error: None,
            };

            match self.process_single(&row.question, row.filter.as_deref(), params).await {
                Ok(result) => {
                    row.answer = result.answer;
                    row.grounding_text = result.grounding_text;
                    row.search_seconds = result.search_seconds;
                    row.rerank_seconds = result.rerank_seconds;
                    row.generation_seconds = result.generation_seconds;
                    row.total_seconds = result.total_seconds;
                    row.model_id = Some(result.model_id);
                    row.status = RowStatus::Succeeded;
                    succeeded += 1;
                    self.notify(ProgressEvent::RowSucceeded {
                        index,
                        total,
                        total_seconds: row.total_seconds,
                    });
                }
                Err(e) => {
                    error!(row = index, error = %e, kind = ?e.kind(), "question failed");
                    let message = e.to_string();
                    row.error = Some(message.clone());
                    failed += 1;
                    self.notify(ProgressEvent::RowFailed { index, total, error: message });
                }
            }

            rows.push(row);
        }

        let elapsed_seconds = started.elapsed().as_secs_f64();
        info!(total, succeeded, failed, elapsed_seconds, "batch completed");

        Ok(BatchResult { total, succeeded, failed, rows, elapsed_seconds })
    }

    /// Score batch rows against reference answers with the configured evaluator.
    ///
    /// Each row's grounding text is split back into one context string per
    /// chunk; a row without grounding contributes a single empty context.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if no evaluator was supplied.
    /// - [`RagError::InvalidArgument`] if `rows` is empty or the lengths of
    ///   `rows` and `ground_truths` differ.
    /// - [`RagError::EvaluationError`] if the evaluator fails or returns
    ///   scores that are missing or outside `[0, 1]`.
    pub async fn evaluate(
        &self,
        rows: &[BatchRow],
        ground_truths: &[String],
    ) -> Result<Vec<EvaluatedRow>> {
        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or_else(|| RagError::ConfigError("evaluator is not configured".to_string()))?;

        if rows.is_empty() {
            return Err(RagError::InvalidArgument("nothing to evaluate".to_string()));
        }
        if rows.len() != ground_truths.len() {
            return Err(RagError::InvalidArgument(format!(
                "{} rows but {} ground truths",
                rows.len(),
                ground_truths.len()
            )));
        }

        let samples: Vec<EvaluationSample> = rows
            .iter()
            .zip(ground_truths)
            .map(|(row, ground_truth)| EvaluationSample {
                question: row.question.clone(),
                answer: row.answer.clone(),
                contexts: contexts_for_evaluation(&row.grounding_text),
                ground_truth: ground_truth.clone(),
            })
            .collect();

        let scores = evaluator.evaluate(&samples).await.map_err(|e| match e {
            RagError::EvaluationError(_) => e,
            other => RagError::EvaluationError(other.to_string()),
        })?;

        check_scores("answer_correctness", &scores.answer_correctness, rows.len())?;
        check_scores("context_recall", &scores.context_recall, rows.len())?;

        info!(count = rows.len(), "evaluation completed");

        Ok(rows
            .iter()
            .zip(scores.answer_correctness.iter().zip(&scores.context_recall))
            .map(|(row, (answer_correctness, context_recall))| EvaluatedRow {
                row: row.clone(),
                answer_correctness: *answer_correctness,
                context_recall: *context_recall,
            })
            .collect())
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = progress.send(event);
        }
    }
}

/// A blank filter cell means "no filter".
fn normalize_filter(filter: Option<&str>) -> Option<&str> {
    filter.map(str::trim).filter(|f| !f.is_empty())
}

fn contexts_for_evaluation(grounding_text: &str) -> Vec<String> {
    let blocks = parse_grounding(grounding_text);
    if blocks.is_empty() {
        return vec![grounding_text.to_string()];
    }
    blocks.into_iter().map(|b| b.text).collect()
}

fn check_scores(metric: &str, scores: &[f64], expected: usize) -> Result<()> {
    if scores.len() != expected {
        return Err(RagError::EvaluationError(format!(
            "{metric}: expected {expected} scores, got {}",
            scores.len()
        )));
    }
    if let Some(bad) = scores.iter().find(|s| !(0.0..=1.0).contains(*s)) {
        return Err(RagError::EvaluationError(format!("{metric}: score {bad} is outside [0, 1]")));
    }
    Ok(())
}

/// Builder for constructing a [`RagPipeline`].
///
/// `searcher` and `generator` are required. A `reranker` is required when
/// the configuration enables reranking.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::builder().enable_reranking(false).build()?)
///     .searcher(searcher)
///     .generator(generator)
///     .evaluator(Arc::new(evaluator))  // optional
///     .progress(sender)                // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    searcher: Option<VectorSearcher>,
    reranker: Option<Reranker>,
    generator: Option<AnswerGenerator>,
    evaluator: Option<Arc<dyn Evaluator>>,
    progress: Option<ProgressSender>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the vector searcher.
    pub fn searcher(mut self, searcher: VectorSearcher) -> Self {
        self.searcher = Some(searcher);
        self
    }

    /// Set the reranker.
    pub fn reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: AnswerGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set an evaluator, enabling [`RagPipeline::evaluate`].
    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Send batch progress events to `sender`.
    pub fn progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let searcher =
            self.searcher.ok_or_else(|| RagError::ConfigError("searcher is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        if config.enable_reranking && self.reranker.is_none() {
            return Err(RagError::ConfigError(
                "reranker is required when reranking is enabled".to_string(),
            ));
        }

        Ok(RagPipeline {
            config,
            searcher,
            reranker: self.reranker,
            generator,
            evaluator: self.evaluator,
            progress: self.progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_mean_no_filter() {
        assert_eq!(normalize_filter(None), None);
        assert_eq!(normalize_filter(Some("")), None);
        assert_eq!(normalize_filter(Some("   ")), None);
        assert_eq!(normalize_filter(Some(" manual ")), Some("manual"));
    }

    #[test]
    fn empty_grounding_becomes_one_empty_context() {
        assert_eq!(contexts_for_evaluation(""), vec![String::new()]);
        assert_eq!(
            contexts_for_evaluation("[Document 1: a.pdf]\none\n\n[Document 2: b.pdf]\ntwo"),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[test]
    fn scores_must_be_complete_and_in_range() {
        assert!(check_scores("m", &[0.0, 1.0], 2).is_ok());
        assert!(check_scores("m", &[0.5], 2).is_err());
        assert!(check_scores("m", &[1.5, 0.5], 2).is_err());
        assert!(check_scores("m", &[f64::NAN, 0.5], 2).is_err());
    }
}
