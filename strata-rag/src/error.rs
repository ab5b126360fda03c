//! Error types for the `strata-rag` crate.

use thiserror::Error;

use crate::document::DegradationReason;

/// Errors that can occur while chunking, ingesting, or retrieving.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source text could not be processed (not UTF-8, bad chunking bounds).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The completion provider failed or returned an unusable response.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Writing to the vector index failed.
    #[error("Index write error ({backend}): {message}")]
    IndexWriteError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Querying the vector index failed.
    #[error("Index query error ({backend}): {message}")]
    IndexQueryError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A structured filter referenced an unknown field or was malformed.
    #[error("Filter rejected: {0}")]
    FilterRejected(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading or writing the ingestion cache failed.
    #[error("Cache error: {0}")]
    CacheError(String),
}

impl RagError {
    /// Classify this error into the reason code reported on a degraded result.
    pub fn degradation_reason(&self) -> DegradationReason {
        match self {
            Self::CompletionError { .. } => DegradationReason::LlmUnavailable,
            Self::FilterRejected(_) => DegradationReason::FilterRejected,
            _ => DegradationReason::ProviderError,
        }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
