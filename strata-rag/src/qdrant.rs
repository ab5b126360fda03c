//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! Points are keyed by the numeric document id. The payload holds the span
//! text under `text` next to the flattened metadata fields, so filters address
//! metadata fields by their plain names.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.ensure_collection("demo_index", 768).await?;
//! store.upsert("demo_index", &documents).await?;
//! let results = store.search("demo_index", &query_embedding, 3, None).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, Filter, PointStruct, Range,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::document::{Document, SearchResult};
use crate::error::{RagError, Result};
use crate::filter::FilterExpr;
use crate::metadata::{FieldValue, Metadata};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Wraps a [`qdrant_client::Qdrant`] client and maps collections to Qdrant
/// collections with cosine distance.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given gRPC URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(|e| RagError::ConfigError(format!(
            "cannot build qdrant client for '{url}': {e}"
        )))?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn write_err(e: QdrantError) -> RagError {
        RagError::IndexWriteError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn query_err(e: QdrantError) -> RagError {
        RagError::IndexQueryError { backend: BACKEND.to_string(), message: e.to_string() }
    }
}

/// Map a search failure. Qdrant answers a bad filter with `InvalidArgument`.
fn search_err(e: QdrantError, filtered: bool) -> RagError {
    match &e {
        QdrantError::ResponseError { status } if filtered && status.code() == tonic::Code::InvalidArgument => {
            RagError::FilterRejected(format!("qdrant rejected filter: {}", status.message()))
        }
        _ => QdrantVectorStore::query_err(e),
    }
}

fn payload(document: &Document) -> Result<Payload> {
    let mut fields = match serde_json::to_value(&document.metadata) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => {
            return Err(RagError::IndexWriteError {
                backend: BACKEND.to_string(),
                message: format!("metadata of document {} is not a JSON object", document.id),
            });
        }
    };
    fields.insert("text".to_string(), Value::String(document.text.clone()));
    Payload::try_from(Value::Object(fields)).map_err(|e| RagError::IndexWriteError {
        backend: BACKEND.to_string(),
        message: format!("invalid payload for document {}: {e}", document.id),
    })
}

fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(object)) => {
            Value::Object(object.fields.into_iter().map(|(k, v)| (k, to_json(v))).collect())
        }
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}

/// Rebuild a document from a scored point. Backends do not return vectors.
fn document_from_payload(id: u64, payload: HashMap<String, QdrantValue>) -> Result<Document> {
    let mut fields: Map<String, Value> = payload.into_iter().map(|(k, v)| (k, to_json(v))).collect();
    let text = match fields.remove("text") {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    let metadata: Metadata = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        RagError::IndexQueryError {
            backend: BACKEND.to_string(),
            message: format!("point {id} has unreadable metadata: {e}"),
        }
    })?;
    Ok(Document { id, text, embedding: Vec::new(), metadata })
}

fn match_condition(field: &str, value: &FieldValue) -> Condition {
    match value {
        FieldValue::Text(s) => Condition::matches(field, s.clone()),
        FieldValue::Integer(i) => Condition::matches(field, *i),
        FieldValue::Bool(b) => Condition::matches(field, *b),
    }
}

fn range_condition(field: &str, range: Range) -> Condition {
    Condition::range(field, range)
}

/// Translate a validated [`FilterExpr`] into a native Qdrant filter.
fn to_qdrant_filter(filter: &FilterExpr) -> Filter {
    match filter {
        FilterExpr::Eq { field, value } => Filter::must([match_condition(field, value)]),
        FilterExpr::Ne { field, value } => Filter::must_not([match_condition(field, value)]),
        FilterExpr::Gt { field, value } => {
            Filter::must([range_condition(field, Range { gt: Some(*value as f64), ..Default::default() })])
        }
        FilterExpr::Gte { field, value } => {
            Filter::must([range_condition(field, Range { gte: Some(*value as f64), ..Default::default() })])
        }
        FilterExpr::Lt { field, value } => {
            Filter::must([range_condition(field, Range { lt: Some(*value as f64), ..Default::default() })])
        }
        FilterExpr::Lte { field, value } => {
            Filter::must([range_condition(field, Range { lte: Some(*value as f64), ..Default::default() })])
        }
        FilterExpr::In { field, values } => {
            Filter::should(values.iter().map(|v| match_condition(field, v)))
        }
        FilterExpr::And { filters } => {
            Filter::must(filters.iter().map(|f| Condition::from(to_qdrant_filter(f))))
        }
        FilterExpr::Or { filters } => {
            Filter::should(filters.iter().map(|f| Condition::from(to_qdrant_filter(f))))
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let exists = self.client.collection_exists(name).await.map_err(Self::write_err)?;
        if exists {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::write_err)?;

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::write_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(Self::query_err)?;
        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let points = documents
            .iter()
            .map(|document| Ok(PointStruct::new(document.id, document.embedding.clone(), payload(document)?)))
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::write_err)?;

        debug!(collection, count = documents.len(), "upserted documents to qdrant");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Self::query_err)?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<SearchResult>> {
        let mut request = SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64).with_payload(true);
        if let Some(filter) = filter {
            filter.validate()?;
            request = request.filter(to_qdrant_filter(filter));
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| search_err(e, filter.is_some()))?;

        let mut results = Vec::with_capacity(response.result.len());
        for scored in response.result {
            let id = match scored.id.and_then(|pid| pid.point_id_options) {
                Some(PointIdOptions::Num(n)) => n,
                other => {
                    warn!(collection, id = ?other, "skipping point without numeric id");
                    continue;
                }
            };
            let document = document_from_payload(id, scored.payload)?;
            results.push(SearchResult { document, score: scored.score });
        }

        Ok(results)
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}
