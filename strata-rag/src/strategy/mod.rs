//! Retrieval strategies.
//!
//! Every strategy implements [`Retriever`] and reads the same collection:
//!
//! - [`BaselineRetriever`]: embed the query, search once
//! - [`MultiQueryRetriever`]: LLM paraphrases, union of per-query hits
//! - [`SelfQueryRetriever`]: LLM-extracted metadata filter plus residual query
//! - [`ParentDocumentRetriever`]: search small children, return their parents
//!
//! Non-baseline strategies report failures as errors; wrap them in
//! [`Fallback`] to degrade to the baseline instead.

mod baseline;
mod fallback;
mod multi_query;
mod parent_document;
mod self_query;

use async_trait::async_trait;

use crate::document::RetrievalResult;
use crate::error::Result;

pub use baseline::BaselineRetriever;
pub use fallback::Fallback;
pub use multi_query::{MultiQueryRetriever, parse_variants};
pub use parent_document::ParentDocumentRetriever;
pub use self_query::{SelfQueryRetriever, StructuredQuery, parse_structured_query};

/// A retrieval strategy over one vector index collection.
///
/// Implementations never mutate the collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Stable strategy name, e.g. `"baseline"`.
    fn name(&self) -> &str;

    /// Return up to `k` ranked documents for `query` (the multi-query
    /// strategy may return more; see [`MultiQueryRetriever`]).
    async fn retrieve(&self, query: &str, k: usize, collection: &str) -> Result<RetrievalResult>;
}
