//! Auxiliary store holding full parent texts for parent-document retrieval.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// Key-value store of parent id → parent text.
///
/// Populated out of band (see
/// [`IngestionPipeline::ingest_hierarchy`](crate::IngestionPipeline::ingest_hierarchy));
/// read-only while queries run.
#[async_trait]
pub trait ParentStore: Send + Sync {
    /// Full text of a parent, or `None` if the id is unknown.
    async fn get(&self, parent_id: &str) -> Result<Option<String>>;

    /// Insert or overwrite parent texts.
    async fn put_many(&self, parents: Vec<(String, String)>) -> Result<()>;

    /// Number of stored parents.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no parents.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// A [`ParentStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryParentStore {
    parents: RwLock<HashMap<String, String>>,
}

impl InMemoryParentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParentStore for InMemoryParentStore {
    async fn get(&self, parent_id: &str) -> Result<Option<String>> {
        Ok(self.parents.read().await.get(parent_id).cloned())
    }

    async fn put_many(&self, parents: Vec<(String, String)>) -> Result<()> {
        self.parents.write().await.extend(parents);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.parents.read().await.len())
    }
}
