//! Vector store trait for storing and searching document embeddings.

use async_trait::async_trait;

use crate::document::{Document, SearchResult};
use crate::error::Result;
use crate::filter::FilterExpr;

/// A similarity index over [`Document`]s, organised in named collections.
///
/// Collections use cosine similarity. Upserts are last-write-wins per
/// document id.
///
/// # Example
///
/// ```rust,ignore
/// use strata_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_collection("demo_index", 768).await?;
/// store.upsert("demo_index", &documents).await?;
/// let hits = store.search("demo_index", &query_vector, 3, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection with the given dimensionality. No-op if it exists.
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a collection and all its documents.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Insert or overwrite documents keyed by their id.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()>;

    /// Number of documents stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Return at most `top_k` documents most similar to `embedding`.
    ///
    /// Results are ordered by descending score. When `filter` is set, only
    /// documents whose metadata satisfies it are considered; a filter the
    /// backend cannot evaluate fails with
    /// [`RagError::FilterRejected`](crate::RagError::FilterRejected).
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<SearchResult>>;

    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;
}
