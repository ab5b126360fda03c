//! Fixed metadata schema and the rule-based span tagger.
//!
//! Every indexed span carries a [`Metadata`] record. Classification fields are
//! derived from the span text by a fixed rule order: the first matching
//! keyword set decides `document_type`/`category`, and advanced keywords are
//! checked before beginner keywords for `technical_level`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::Span;

/// Current version of the [`Metadata`] layout.
pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// Coarse kind of documentation a span belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Tutorial,
    Reference,
    Example,
    Conceptual,
    General,
}

impl DocumentType {
    /// All variants in classification order.
    pub const ALL: [DocumentType; 5] =
        [Self::Tutorial, Self::Reference, Self::Example, Self::Conceptual, Self::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tutorial => "tutorial",
            Self::Reference => "reference",
            Self::Example => "example",
            Self::Conceptual => "conceptual",
            Self::General => "general",
        }
    }

    /// The category label that always accompanies this type.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Tutorial => "setup",
            Self::Reference => "api_docs",
            Self::Example => "examples",
            Self::Conceptual => "concepts",
            Self::General => "documentation",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected reader expertise for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl TechnicalLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for TechnicalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar type of a filterable metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Bool,
}

/// A typed scalar read from a metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Integer(_) => FieldType::Integer,
            Self::Text(_) => FieldType::Text,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Structured metadata attached to every indexed span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub schema_version: u32,
    /// Equal to the span's sequence index.
    pub chunk_id: u64,
    pub source_file: String,
    pub document_title: String,
    pub char_count: usize,
    pub word_count: usize,
    pub has_code: bool,
    pub has_list: bool,
    pub is_header: bool,
    /// Present if and only if `is_header` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_level: Option<u8>,
    pub document_type: DocumentType,
    pub category: String,
    pub technical_level: TechnicalLevel,
    /// Back-reference to the parent span for hierarchically indexed children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Metadata {
    /// Filterable fields and their scalar types.
    pub const FIELDS: &'static [(&'static str, FieldType)] = &[
        ("schema_version", FieldType::Integer),
        ("chunk_id", FieldType::Integer),
        ("source_file", FieldType::Text),
        ("document_title", FieldType::Text),
        ("char_count", FieldType::Integer),
        ("word_count", FieldType::Integer),
        ("has_code", FieldType::Bool),
        ("has_list", FieldType::Bool),
        ("is_header", FieldType::Bool),
        ("header_level", FieldType::Integer),
        ("document_type", FieldType::Text),
        ("category", FieldType::Text),
        ("technical_level", FieldType::Text),
        ("parent_id", FieldType::Text),
    ];

    /// Look up the declared type of a field.
    pub fn field_type(name: &str) -> Option<FieldType> {
        Self::FIELDS.iter().find(|(field, _)| *field == name).map(|(_, ty)| *ty)
    }

    /// Read a field as a typed scalar. Returns `None` for unknown fields and
    /// for optional fields that are absent.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "schema_version" => FieldValue::Integer(i64::from(self.schema_version)),
            "chunk_id" => FieldValue::Integer(self.chunk_id as i64),
            "source_file" => FieldValue::Text(self.source_file.clone()),
            "document_title" => FieldValue::Text(self.document_title.clone()),
            "char_count" => FieldValue::Integer(self.char_count as i64),
            "word_count" => FieldValue::Integer(self.word_count as i64),
            "has_code" => FieldValue::Bool(self.has_code),
            "has_list" => FieldValue::Bool(self.has_list),
            "is_header" => FieldValue::Bool(self.is_header),
            "header_level" => FieldValue::Integer(i64::from(self.header_level?)),
            "document_type" => FieldValue::Text(self.document_type.as_str().to_string()),
            "category" => FieldValue::Text(self.category.clone()),
            "technical_level" => FieldValue::Text(self.technical_level.as_str().to_string()),
            "parent_id" => FieldValue::Text(self.parent_id.clone()?),
            _ => return None,
        };
        Some(value)
    }
}

static TUTORIAL: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&["tutorial", "steps?", "how to", "guide", "install\\w*", "setup", "getting started"])
});
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&["api", "reference", "parameters?", "returns", "functions?", "methods?", "endpoints?"])
});
static EXAMPLE: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&["examples?", "samples?", "demo", "for instance"])
});
static CONCEPTUAL: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&["concepts?", "overview", "introduction", "what is", "architecture", "theory"])
});
static ADVANCED: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "advanced",
        "optimi[sz]\\w*",
        "performance",
        "scalab\\w*",
        "distributed",
        "internals",
        "production",
        "tuning",
    ])
});
static BEGINNER: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&["beginners?", "basics?", "introduction", "getting started", "simple", "quick ?start"])
});

static CODE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:    |\t)\S|^\s*(?:def|fn|pub fn|class|import|from \S+ import|let|const)\s")
        .expect("code pattern is valid")
});
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+\S").expect("list pattern is valid")
});
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})\s+\S").expect("header pattern is valid")
});

fn keyword_regex(words: &[&str]) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).expect("keyword pattern is valid")
}

/// Classify a span's documentation type. First matching keyword set wins.
pub fn classify_document_type(text: &str) -> DocumentType {
    if TUTORIAL.is_match(text) {
        DocumentType::Tutorial
    } else if REFERENCE.is_match(text) {
        DocumentType::Reference
    } else if EXAMPLE.is_match(text) {
        DocumentType::Example
    } else if CONCEPTUAL.is_match(text) {
        DocumentType::Conceptual
    } else {
        DocumentType::General
    }
}

/// Classify a span's technical level. Advanced keywords take precedence.
pub fn classify_technical_level(text: &str) -> TechnicalLevel {
    if ADVANCED.is_match(text) {
        TechnicalLevel::Advanced
    } else if BEGINNER.is_match(text) {
        TechnicalLevel::Beginner
    } else {
        TechnicalLevel::Intermediate
    }
}

/// Markdown header level of the span's first non-empty line, if it is one.
pub fn header_level(text: &str) -> Option<u8> {
    let first = text.lines().find(|line| !line.trim().is_empty())?;
    HEADER.captures(first.trim_start()).map(|caps| caps[1].len() as u8)
}

/// Derive the full metadata record for a span.
pub fn tag(span: &Span, source_file: &str, document_title: &str) -> Metadata {
    let text = span.text.as_str();
    let header_level = header_level(text);
    let document_type = classify_document_type(text);

    Metadata {
        schema_version: METADATA_SCHEMA_VERSION,
        chunk_id: span.index,
        source_file: source_file.to_string(),
        document_title: document_title.to_string(),
        char_count: span.char_count,
        word_count: span.word_count,
        has_code: text.contains("```") || CODE_LINE.is_match(text),
        has_list: LIST_ITEM.is_match(text),
        is_header: header_level.is_some(),
        header_level,
        document_type,
        category: document_type.category().to_string(),
        technical_level: classify_technical_level(text),
        parent_id: None,
    }
}
