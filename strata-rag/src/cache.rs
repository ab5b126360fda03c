//! JSON ingestion cache.
//!
//! A debugging artifact written during ingestion: a pretty-printed array of
//! `{id, text, vector, metadata}` records. The index stays authoritative; the
//! cache can be replayed into it with
//! [`IngestionPipeline::upload_cache`](crate::IngestionPipeline::upload_cache).

use std::path::Path;

use tracing::debug;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Write documents to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`RagError::CacheError`] on serialisation or I/O failure.
pub async fn write_cache(path: &Path, documents: &[Document]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            RagError::CacheError(format!("cannot create '{}': {e}", dir.display()))
        })?;
    }

    let bytes = serde_json::to_vec_pretty(documents)
        .map_err(|e| RagError::CacheError(format!("cannot serialise documents: {e}")))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| RagError::CacheError(format!("cannot write '{}': {e}", path.display())))?;

    debug!(path = %path.display(), count = documents.len(), "wrote ingestion cache");
    Ok(())
}

/// Read documents previously written by [`write_cache`].
///
/// # Errors
///
/// Returns [`RagError::CacheError`] if the file is missing or malformed.
pub async fn read_cache(path: &Path) -> Result<Vec<Document>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RagError::CacheError(format!("cannot read '{}': {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RagError::CacheError(format!("malformed cache '{}': {e}", path.display())))
}
