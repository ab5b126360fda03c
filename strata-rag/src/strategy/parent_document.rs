//! Parent-document retrieval over a two-level span hierarchy.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::docstore::ParentStore;
use crate::document::{DegradationReason, RetrievalResult, RetrievedDocument, SearchResult};
use crate::error::Result;
use crate::strategy::{BaselineRetriever, Retriever};

/// Search small child spans, return the larger parent spans they belong to.
///
/// `k * fan_out` children are fetched so that several children of the same
/// parent still leave room for `k` distinct parents. Each parent is scored
/// by its best-matching child and carries that child's metadata.
///
/// Children live in their own collection (see
/// [`IngestionPipeline::ingest_hierarchy`](crate::IngestionPipeline::ingest_hierarchy)).
/// When no child collection is set, the `collection` passed to
/// [`retrieve`](Retriever::retrieve) is searched directly.
pub struct ParentDocumentRetriever {
    baseline: Arc<BaselineRetriever>,
    parent_store: Arc<dyn ParentStore>,
    fan_out: usize,
    child_collection: Option<String>,
}

impl ParentDocumentRetriever {
    pub const NAME: &'static str = "parent_document";

    pub fn new(baseline: Arc<BaselineRetriever>, parent_store: Arc<dyn ParentStore>, fan_out: usize) -> Self {
        Self { baseline, parent_store, fan_out: fan_out.max(1), child_collection: None }
    }

    /// Search `collection` for children instead of the per-call collection.
    pub fn with_child_collection(mut self, collection: impl Into<String>) -> Self {
        self.child_collection = Some(collection.into());
        self
    }
}

#[async_trait]
impl Retriever for ParentDocumentRetriever {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn retrieve(&self, query: &str, k: usize, collection: &str) -> Result<RetrievalResult> {
        if self.parent_store.is_empty().await? {
            warn!("parent store is empty; parent retrieval unavailable");
            return Ok(RetrievalResult::unusable(Self::NAME, DegradationReason::ParentStoreEmpty));
        }

        let children = self.child_collection.as_deref().unwrap_or(collection);
        let hits = self.baseline.search(query, k.saturating_mul(self.fan_out), children, None).await?;
        if hits.is_empty() {
            return Ok(RetrievalResult::new(Self::NAME, Vec::new()));
        }
        let child_hits = hits.len();

        // Hits arrive best-first, so the first child seen per parent is its best.
        let mut parents: HashMap<String, SearchResult> = HashMap::new();
        for hit in hits {
            let Some(parent_id) = hit.document.metadata.parent_id.clone() else {
                continue;
            };
            match parents.entry(parent_id) {
                Entry::Occupied(mut best) => {
                    if hit.score > best.get().score {
                        best.insert(hit);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(hit);
                }
            }
        }

        let mut documents = Vec::with_capacity(parents.len());
        for (parent_id, best_child) in parents {
            match self.parent_store.get(&parent_id).await? {
                Some(text) => documents.push(RetrievedDocument {
                    key: parent_id,
                    text,
                    metadata: best_child.document.metadata,
                    score: best_child.score,
                }),
                None => debug!(parent_id, "matched child has no stored parent"),
            }
        }

        if documents.is_empty() {
            warn!(child_hits, "no matched child resolved to a stored parent");
            return Ok(RetrievalResult::unusable(Self::NAME, DegradationReason::ParentStoreEmpty));
        }

        let mut result = RetrievalResult::new(Self::NAME, documents);
        result.documents.truncate(k);
        debug!(child_hits, parents = result.len(), "resolved parents");
        Ok(result)
    }
}
