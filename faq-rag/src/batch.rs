//! Batch input table, per-row outcomes, and progress events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{RagError, Result};

/// Name of the required question column.
pub const QUESTION_COLUMN: &str = "question";

/// Name of the optional source-category filter column.
pub const FILTER_COLUMN: &str = "filter";

/// A table of questions with named columns.
///
/// Cells are optional strings; a `None` cell is a missing value. Columns
/// other than `question` and `filter` are carried through to the output rows
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl QuestionTable {
    /// Create an empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { columns: columns.into_iter().map(Into::into).collect(), rows: Vec::new() }
    }

    /// Build a `question`/`filter` table from pairs.
    pub fn from_questions<I, Q>(questions: I) -> Self
    where
        I: IntoIterator<Item = (Q, Option<String>)>,
        Q: Into<String>,
    {
        let rows = questions.into_iter().map(|(q, filter)| vec![Some(q.into()), filter]).collect();
        Self { columns: vec![QUESTION_COLUMN.to_string(), FILTER_COLUMN.to_string()], rows }
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if the row width does not match
    /// the number of columns.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(RagError::InvalidArgument(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` among the columns.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The cell at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// All cells of `row`, keyed by column name.
    pub(crate) fn row_map(&self, row: usize) -> BTreeMap<String, Option<String>> {
        match self.rows.get(row) {
            Some(cells) => self.columns.iter().cloned().zip(cells.iter().cloned()).collect(),
            None => BTreeMap::new(),
        }
    }
}

/// Outcome status of one batch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    #[serde(rename = "success")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

/// One processed row of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    /// 0-based position in the input table.
    pub index: usize,
    /// Every input column, as given.
    pub inputs: BTreeMap<String, Option<String>>,
    pub question: String,
    /// The filter actually applied; blank input cells become `None`.
    pub filter: Option<String>,
    /// Empty when the row failed.
    pub answer: String,
    /// Empty when the row failed.
    pub grounding_text: String,
    pub search_seconds: f64,
    pub rerank_seconds: f64,
    pub generation_seconds: f64,
    pub total_seconds: f64,
    pub model_id: Option<String>,
    pub status: RowStatus,
    pub error: Option<String>,
}

/// Aggregate result of [`RagPipeline::process_batch`](crate::RagPipeline::process_batch).
///
/// `succeeded + failed == total == rows.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows: Vec<BatchRow>,
    pub elapsed_seconds: f64,
}

/// Progress notification emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Sent before a row is processed.
    RowStarted { index: usize, total: usize, question: String },
    RowSucceeded { index: usize, total: usize, total_seconds: f64 },
    RowFailed { index: usize, total: usize, error: String },
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressEvent::RowStarted { index, total, question } => {
                write!(f, "Processing {}/{total}: {question}", index + 1)
            }
            ProgressEvent::RowSucceeded { index, total, total_seconds } => {
                write!(f, "Finished {}/{total} in {total_seconds:.2}s", index + 1)
            }
            ProgressEvent::RowFailed { index, total, error } => {
                write!(f, "Error processing question {}/{total}: {error}", index + 1)
            }
        }
    }
}

/// Send side of the progress channel.
pub type ProgressSender = UnboundedSender<ProgressEvent>;
