//! Query-side vector search: embed the question, then ask the chunk store.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::RetrievedChunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::ChunkStore;

/// Embeds a query and runs a nearest-neighbour lookup against a [`ChunkStore`].
///
/// No retry happens here. Embedding and store failures are wrapped in
/// [`RagError::VectorSearchError`] with the original error as its source.
pub struct VectorSearcher {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ChunkStore>,
    default_top_k: usize,
}

impl VectorSearcher {
    /// Create a searcher returning `default_top_k` results from
    /// [`search_default`](Self::search_default).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `default_top_k == 0`.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ChunkStore>,
        default_top_k: usize,
    ) -> Result<Self> {
        if default_top_k == 0 {
            return Err(RagError::ConfigError("top_k must be > 0".to_string()));
        }
        Ok(Self { embedder, store, default_top_k })
    }

    /// The `top_k` used by [`search_default`](Self::search_default).
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Search with the default `top_k`.
    pub async fn search_default(
        &self,
        query: &str,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>> {
        self.search(query, self.default_top_k, filter).await
    }

    /// Return at most `top_k` chunks ordered by ascending distance.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `query` is blank or `top_k == 0`.
    /// - [`RagError::VectorSearchError`] if embedding or the store lookup fails,
    ///   or the store hands back a malformed distance.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidArgument("query cannot be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be > 0".to_string()));
        }

        let context = || format!("query='{}', top_k={top_k}, filter={filter:?}", preview(query));

        let embedding = self.embedder.embed(query).await.map_err(|e| {
            error!(provider = self.embedder.name(), error = %e, "query embedding failed");
            RagError::VectorSearchError {
                message: format!("failed to embed query ({})", context()),
                source: Box::new(e),
            }
        })?;

        if embedding.is_empty() {
            return Err(RagError::VectorSearchError {
                message: format!("embedding was empty ({})", context()),
                source: Box::new(RagError::EmbeddingError {
                    provider: self.embedder.name().to_string(),
                    message: "provider returned a zero-length vector".to_string(),
                }),
            });
        }

        let mut hits = self.store.nearest(&embedding, top_k, filter).await.map_err(|e| {
            error!(backend = self.store.name(), error = %e, "nearest search failed");
            RagError::VectorSearchError {
                message: format!("store lookup failed ({})", context()),
                source: Box::new(e),
            }
        })?;

        if let Some(bad) = hits.iter().find(|h| !h.distance.is_finite()) {
            return Err(RagError::VectorSearchError {
                message: format!("store returned a malformed distance ({})", context()),
                source: Box::new(RagError::VectorStoreError {
                    backend: self.store.name().to_string(),
                    message: format!("chunk {} has distance {}", bad.chunk_id, bad.distance),
                }),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);

        debug!(top_k, filter, hit_count = hits.len(), "vector search completed");
        Ok(hits)
    }
}

/// First 50 characters of `text`, for log lines and error messages.
pub(crate) fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(50).collect();
    if text.chars().nth(50).is_some() {
        out.push_str("...");
    }
    out
}
