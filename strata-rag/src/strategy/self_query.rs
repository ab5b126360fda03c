//! Self-query retrieval: LLM-extracted metadata filters.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::completion::CompletionProvider;
use crate::document::{RetrievalResult, RetrievedDocument};
use crate::error::{RagError, Result};
use crate::filter::{AttributeInfo, FilterExpr, validate_schema};
use crate::strategy::{BaselineRetriever, Retriever};

/// The LLM's translation of a natural-language query.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    /// Residual semantic query; empty means "reuse the original query".
    pub query: String,
    /// Metadata filter, if the question implied one.
    pub filter: Option<FilterExpr>,
}

/// Self-querying: the LLM splits a question into a metadata filter and a
/// residual semantic query, which are then searched together.
///
/// The attribute schema is fixed at construction and checked against the
/// metadata layout, so a schema naming an absent field fails early as a
/// configuration error rather than on every query.
pub struct SelfQueryRetriever {
    baseline: Arc<BaselineRetriever>,
    completion: Arc<dyn CompletionProvider>,
    attributes: Vec<AttributeInfo>,
    content_description: String,
}

impl SelfQueryRetriever {
    pub const NAME: &'static str = "self_query";

    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if an attribute is not a metadata
    /// field or is declared with the wrong type.
    pub fn new(
        baseline: Arc<BaselineRetriever>,
        completion: Arc<dyn CompletionProvider>,
        content_description: impl Into<String>,
        attributes: Vec<AttributeInfo>,
    ) -> Result<Self> {
        validate_schema(&attributes)?;
        Ok(Self { baseline, completion, attributes, content_description: content_description.into() })
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    fn prompt(&self, query: &str) -> String {
        let schema = serde_json::to_string_pretty(&self.attributes).unwrap_or_default();
        format!(
            "Your goal is to structure the user's query to match the request schema below.\n\n\
             Data source: {description}\n\
             Filterable attributes:\n{schema}\n\n\
             Respond with ONLY a JSON object of the form\n\
             {{\"query\": \"<text to match semantically>\", \"filter\": <filter or null>}}\n\
             A filter is one of:\n\
             {{\"op\": \"eq\"|\"ne\", \"field\": <attribute>, \"value\": <string|integer|boolean>}}\n\
             {{\"op\": \"gt\"|\"gte\"|\"lt\"|\"lte\", \"field\": <integer attribute>, \"value\": <integer>}}\n\
             {{\"op\": \"in\", \"field\": <attribute>, \"values\": [...]}}\n\
             {{\"op\": \"and\"|\"or\", \"filters\": [<filter>, ...]}}\n\
             Only use the attributes listed above. Use null when no filter applies.\n\n\
             User query: \"{query}\"",
            description = self.content_description,
        )
    }

    fn check_declared(&self, filter: &FilterExpr) -> Result<()> {
        filter.validate()?;
        match filter.fields().into_iter().find(|f| !self.attributes.iter().any(|a| a.name == *f)) {
            Some(field) => Err(RagError::FilterRejected(format!("field '{field}' is not filterable"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Retriever for SelfQueryRetriever {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn retrieve(&self, query: &str, k: usize, collection: &str) -> Result<RetrievalResult> {
        let raw = self.completion.complete(&self.prompt(query)).await?;
        let structured = parse_structured_query(&raw, self.completion.name())?;
        if let Some(filter) = &structured.filter {
            self.check_declared(filter)?;
        }

        let semantic = if structured.query.trim().is_empty() { query } else { structured.query.as_str() };
        debug!(semantic, filter = ?structured.filter, "structured query");

        let hits = self.baseline.search(semantic, k, collection, structured.filter.as_ref()).await?;
        Ok(RetrievalResult::new(Self::NAME, hits.into_iter().map(RetrievedDocument::from_hit).collect()))
    }
}

/// Parse the LLM's JSON answer into a [`StructuredQuery`].
///
/// The first `{` through the last `}` is taken as the JSON object, so code
/// fences and chatter around it are tolerated. A missing, `null`, or
/// `"NO_FILTER"` filter means no filter.
///
/// # Errors
///
/// - [`RagError::CompletionError`] if no JSON object can be read at all
/// - [`RagError::FilterRejected`] if the filter is present but malformed
pub fn parse_structured_query(raw: &str, provider: &str) -> Result<StructuredQuery> {
    let unusable = |message: String| RagError::CompletionError { provider: provider.to_string(), message };

    let start = raw.find('{').ok_or_else(|| unusable("response has no JSON object".to_string()))?;
    let end = raw.rfind('}').filter(|end| *end > start).ok_or_else(|| {
        unusable("response has an unterminated JSON object".to_string())
    })?;
    let object: Value = serde_json::from_str(&raw[start..=end])
        .map_err(|e| unusable(format!("response is not valid JSON: {e}")))?;

    let query = object.get("query").and_then(Value::as_str).unwrap_or_default().to_string();
    let filter = match object.get("filter") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("NO_FILTER") => None,
        Some(value) => Some(
            serde_json::from_value::<FilterExpr>(value.clone())
                .map_err(|e| RagError::FilterRejected(format!("malformed filter: {e}")))?,
        ),
    };

    Ok(StructuredQuery { query, filter })
}
