//! Embedding provider trait for turning query text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a remote embedding service behind a unified async
/// interface. Query-side embedding is the only use in this crate; document
/// embeddings are written by the ingestion side.
///
/// # Example
///
/// ```rust,ignore
/// use faq_rag::EmbeddingProvider;
///
/// let embedding = provider.embed("What is a relational database?").await?;
/// assert!(!embedding.is_empty());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// A short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
