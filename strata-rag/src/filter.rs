//! Structured metadata filters and the attribute schema they are checked against.
//!
//! A [`FilterExpr`] is the structured half of a self-query: the LLM emits it as
//! JSON tagged by `op`, it is validated against [`Metadata::FIELDS`], and the
//! vector store either evaluates it directly ([`FilterExpr::matches`]) or
//! translates it into native conditions.
//!
//! ```json
//! {"op": "and", "filters": [
//!     {"op": "eq", "field": "document_type", "value": "tutorial"},
//!     {"op": "lte", "field": "header_level", "value": 2}
//! ]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::metadata::{FieldType, FieldValue, Metadata};

/// A boolean expression over metadata fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpr {
    Eq { field: String, value: FieldValue },
    Ne { field: String, value: FieldValue },
    Gt { field: String, value: i64 },
    Gte { field: String, value: i64 },
    Lt { field: String, value: i64 },
    Lte { field: String, value: i64 },
    In { field: String, values: Vec<FieldValue> },
    And { filters: Vec<FilterExpr> },
    Or { filters: Vec<FilterExpr> },
}

impl FilterExpr {
    /// Shorthand for an equality condition.
    pub fn eq(field: impl Into<String>, value: FieldValue) -> Self {
        Self::Eq { field: field.into(), value }
    }

    /// Check the expression against the metadata schema.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::FilterRejected`] for unknown fields, values whose
    /// type differs from the field's type, range operators on non-integer
    /// fields, and empty `in`/`and`/`or` lists.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Eq { field, value } | Self::Ne { field, value } => {
                expect_type(field, value.field_type())
            }
            Self::Gt { field, .. }
            | Self::Gte { field, .. }
            | Self::Lt { field, .. }
            | Self::Lte { field, .. } => expect_type(field, FieldType::Integer),
            Self::In { field, values } => {
                if values.is_empty() {
                    return Err(RagError::FilterRejected(format!("'in' on '{field}' has no values")));
                }
                values.iter().try_for_each(|v| expect_type(field, v.field_type()))
            }
            Self::And { filters } | Self::Or { filters } => {
                if filters.is_empty() {
                    return Err(RagError::FilterRejected("empty boolean group".to_string()));
                }
                filters.iter().try_for_each(FilterExpr::validate)
            }
        }
    }

    /// Evaluate the expression against one metadata record.
    ///
    /// Absent optional fields never satisfy a positive condition.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { field, value } => metadata.field(field).as_ref() == Some(value),
            Self::Ne { field, value } => metadata.field(field).as_ref() != Some(value),
            Self::Gt { field, value } => integer(metadata, field).is_some_and(|v| v > *value),
            Self::Gte { field, value } => integer(metadata, field).is_some_and(|v| v >= *value),
            Self::Lt { field, value } => integer(metadata, field).is_some_and(|v| v < *value),
            Self::Lte { field, value } => integer(metadata, field).is_some_and(|v| v <= *value),
            Self::In { field, values } => {
                metadata.field(field).is_some_and(|v| values.contains(&v))
            }
            Self::And { filters } => filters.iter().all(|f| f.matches(metadata)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(metadata)),
        }
    }

    /// Every field name referenced by the expression.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Eq { field, .. }
            | Self::Ne { field, .. }
            | Self::Gt { field, .. }
            | Self::Gte { field, .. }
            | Self::Lt { field, .. }
            | Self::Lte { field, .. }
            | Self::In { field, .. } => vec![field.as_str()],
            Self::And { filters } | Self::Or { filters } => {
                filters.iter().flat_map(FilterExpr::fields).collect()
            }
        }
    }
}

fn integer(metadata: &Metadata, field: &str) -> Option<i64> {
    match metadata.field(field)? {
        FieldValue::Integer(v) => Some(v),
        _ => None,
    }
}

fn expect_type(field: &str, actual: FieldType) -> Result<()> {
    match Metadata::field_type(field) {
        None => Err(RagError::FilterRejected(format!("unknown field '{field}'"))),
        Some(expected) if expected != actual => Err(RagError::FilterRejected(format!(
            "field '{field}' is {expected:?}, got a {actual:?} value"
        ))),
        Some(_) => Ok(()),
    }
}

/// One filterable attribute declared to the self-query strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl AttributeInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), description: description.into(), field_type }
    }
}

/// The attributes exposed to the LLM by default.
pub fn default_attributes() -> Vec<AttributeInfo> {
    vec![
        AttributeInfo::new(
            "document_type",
            "Kind of documentation: one of tutorial, reference, example, conceptual, general",
            FieldType::Text,
        ),
        AttributeInfo::new(
            "category",
            "Category label: one of setup, api_docs, examples, concepts, documentation",
            FieldType::Text,
        ),
        AttributeInfo::new(
            "technical_level",
            "Reader expertise: one of beginner, intermediate, advanced",
            FieldType::Text,
        ),
        AttributeInfo::new("has_code", "Whether the passage contains code", FieldType::Bool),
        AttributeInfo::new("has_list", "Whether the passage contains a list", FieldType::Bool),
        AttributeInfo::new("is_header", "Whether the passage starts with a heading", FieldType::Bool),
        AttributeInfo::new("header_level", "Markdown heading level (1-6)", FieldType::Integer),
        AttributeInfo::new("source_file", "File the passage was read from", FieldType::Text),
        AttributeInfo::new("document_title", "Title of the source document", FieldType::Text),
        AttributeInfo::new("word_count", "Number of words in the passage", FieldType::Integer),
    ]
}

/// Check that every declared attribute exists on [`Metadata`] with the same type.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] naming the first mismatching attribute.
pub fn validate_schema(attributes: &[AttributeInfo]) -> Result<()> {
    for attribute in attributes {
        match Metadata::field_type(&attribute.name) {
            None => {
                return Err(RagError::ConfigError(format!(
                    "self-query attribute '{}' is not a metadata field",
                    attribute.name
                )));
            }
            Some(ty) if ty != attribute.field_type => {
                return Err(RagError::ConfigError(format!(
                    "self-query attribute '{}' declared as {:?} but metadata stores {ty:?}",
                    attribute.name, attribute.field_type
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
