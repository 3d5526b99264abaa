//! In-memory chunk store using cosine distance.
//!
//! This module provides [`InMemoryChunkStore`], a chunk store backed by a
//! `Vec` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small corpora.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::RetrievedChunk;
use crate::error::{RagError, Result};
use crate::vectorstore::ChunkStore;

/// A chunk held by [`InMemoryChunkStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub chunk_id: i64,
    pub document_id: i64,
    pub source_name: String,
    /// Source category matched by search filters.
    pub category: Option<String>,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// An in-memory chunk store ranking chunks by cosine distance.
///
/// # Example
///
/// ```rust,ignore
/// use faq_rag::{ChunkStore, InMemoryChunkStore, StoredChunk};
///
/// let store = InMemoryChunkStore::new();
/// store.insert(chunk).await?;
/// let hits = store.nearest(&query_embedding, 5, None).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryChunkStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk, replacing any chunk with the same `chunk_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the embedding dimension does
    /// not match the chunks already stored.
    pub async fn insert(&self, chunk: StoredChunk) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        if let Some(first) = chunks.first() {
            if first.embedding.len() != chunk.embedding.len() {
                return Err(RagError::VectorStoreError {
                    backend: "InMemory".to_string(),
                    message: format!(
                        "embedding has {} dimensions, store holds {}",
                        chunk.embedding.len(),
                        first.embedding.len()
                    ),
                });
            }
        }
        chunks.retain(|c| c.chunk_id != chunk.chunk_id);
        chunks.push(chunk);
        Ok(())
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Whether the store holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

/// Compute cosine distance (`1 - cosine similarity`) between two vectors.
///
/// Returns 1.0 if either vector has zero magnitude. The result is clamped to
/// `[0, 2]` to absorb rounding error.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    fn name(&self) -> &str {
        "InMemory"
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>> {
        let chunks = self.chunks.read().await;
        if let Some(first) = chunks.first() {
            if first.embedding.len() != embedding.len() {
                return Err(RagError::VectorStoreError {
                    backend: "InMemory".to_string(),
                    message: format!(
                        "query has {} dimensions, store holds {}",
                        embedding.len(),
                        first.embedding.len()
                    ),
                });
            }
        }

        let mut hits: Vec<RetrievedChunk> = chunks
            .iter()
            .filter(|c| filter.is_none_or(|f| c.category.as_deref() == Some(f)))
            .map(|c| RetrievedChunk {
                chunk_id: c.chunk_id,
                document_id: c.document_id,
                source_name: c.source_name.clone(),
                text: c.text.clone(),
                distance: cosine_distance(&c.embedding, embedding),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }
}
