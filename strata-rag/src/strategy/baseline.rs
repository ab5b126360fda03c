//! Baseline similarity search, the fallback target of every other strategy.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::{RetrievalResult, RetrievedDocument, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::filter::FilterExpr;
use crate::strategy::Retriever;
use crate::vectorstore::VectorStore;

/// Plain similarity search: embed the query once, search once.
///
/// This is also the fallback target of every other strategy, so its own
/// failures (provider or index unavailable) are surfaced, never retried.
pub struct BaselineRetriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl BaselineRetriever {
    pub const NAME: &'static str = "baseline";

    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self { embedding_provider, vector_store }
    }

    /// Embed `query` and return the raw index hits.
    ///
    /// # Errors
    ///
    /// Propagates the embedding provider's and vector store's errors.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        collection: &str,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<SearchResult>> {
        let embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let hits = self.vector_store.search(collection, &embedding, k, filter).await?;
        debug!(collection, k, hits = hits.len(), filtered = filter.is_some(), "vector search");
        Ok(hits)
    }
}

#[async_trait]
impl Retriever for BaselineRetriever {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn retrieve(&self, query: &str, k: usize, collection: &str) -> Result<RetrievalResult> {
        let hits = self.search(query, k, collection, None).await?;
        Ok(RetrievalResult::new(Self::NAME, hits.into_iter().map(RetrievedDocument::from_hit).collect()))
    }
}
