//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that turns text into fixed-dimension vectors.
///
/// The same provider instance must be used for ingestion and for query-time
/// encoding so that stored and query vectors share one space.
///
/// # Example
///
/// ```rust,ignore
/// use strata_rag::EmbeddingProvider;
///
/// let vector = provider.embed("How does vector storage work?").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, in order.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// once per text and stops at the first failure.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Dimensionality `D` of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}
