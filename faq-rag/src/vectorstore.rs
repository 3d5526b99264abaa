//! Chunk store trait exposing nearest-neighbour lookup.

use async_trait::async_trait;

use crate::document::RetrievedChunk;
use crate::error::Result;

/// A persistent store of embedded chunks with nearest-neighbour search.
///
/// The index itself is opaque to this crate; a store only has to return the
/// closest chunks by cosine distance, optionally restricted to documents of
/// one source category.
///
/// # Example
///
/// ```rust,ignore
/// use faq_rag::{ChunkStore, InMemoryChunkStore};
///
/// let store = InMemoryChunkStore::new();
/// let hits = store.nearest(&query_embedding, 10, Some("manual")).await?;
/// ```
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Return up to `top_k` chunks closest to `embedding`.
    ///
    /// Results are ordered by ascending distance. When `filter` is set only
    /// chunks whose source document has that category are considered.
    async fn nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>>;
}
