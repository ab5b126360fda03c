//! Ingestion pipeline.
//!
//! The [`IngestionPipeline`] turns raw text into indexed documents
//! (chunk → tag → embed → cache → upsert) by composing an
//! [`EmbeddingProvider`], a [`VectorStore`], and a [`TextSplitter`]. It also
//! populates the parent/child hierarchy used by parent-document retrieval.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_rag::{IngestionPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .cache_path("data/demo_data.json")
//!     .build()?;
//!
//! let written = pipeline.ingest_file("my_doc.txt".as_ref(), "demo_index").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::cache;
use crate::chunking::{CharacterSplitter, Chunker, TextSplitter};
use crate::config::RagConfig;
use crate::docstore::ParentStore;
use crate::document::{Document, Span};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::metadata::{self, Metadata};
use crate::vectorstore::VectorStore;

/// Counts produced by [`IngestionPipeline::ingest_hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyStats {
    /// Parents written to the parent store.
    pub parents: usize,
    /// Children written to the child collection.
    pub children: usize,
}

/// Chunks, tags, embeds, and indexes source documents.
///
/// Construct one via [`IngestionPipeline::builder()`].
pub struct IngestionPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    splitter: Arc<dyn TextSplitter>,
    cache_path: Option<PathBuf>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Create `collection` with the provider's dimensionality if it is absent.
    ///
    /// # Errors
    ///
    /// Propagates the vector store's error.
    pub async fn ensure_collection(&self, collection: &str) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.ensure_collection(collection, dimensions).await.map_err(|e| {
            error!(collection, error = %e, "failed to ensure collection");
            e
        })
    }

    /// Chunk, tag, and embed raw text without touching the index.
    ///
    /// Returns the documents [`ingest_text`](Self::ingest_text) would write,
    /// in span order. Empty text yields no documents.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for inconsistent chunking parameters
    /// - [`RagError::EmbeddingError`] if any span fails to embed or the
    ///   provider returns the wrong number or size of vectors
    pub async fn prepare(&self, raw_text: &str, source_file: &str, document_title: &str) -> Result<Vec<Document>> {
        let chunker = Chunker::new(self.config.chunk_size, self.config.chunk_overlap)
            .with_splitter(Arc::clone(&self.splitter));
        let tagged = chunker.chunk_and_tag(raw_text, source_file, document_title)?;
        if tagged.is_empty() {
            return Ok(Vec::new());
        }

        self.embed(tagged).await.map_err(|e| {
            error!(source_file, error = %e, "embedding failed during ingestion");
            e
        })
    }

    /// Ingest raw text into `collection`, returning the number of documents written.
    ///
    /// The collection is ensured even when the text yields no spans.
    /// Re-ingesting the same text with the same parameters overwrites the
    /// previous documents, since ids are span sequence indices.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for inconsistent chunking parameters
    /// - [`RagError::EmbeddingError`] if any span fails to embed (nothing is written)
    /// - [`RagError::CacheError`] if the cache artifact cannot be written
    /// - [`RagError::IndexWriteError`] if the upsert fails
    pub async fn ingest_text(
        &self,
        raw_text: &str,
        source_file: &str,
        document_title: &str,
        collection: &str,
    ) -> Result<usize> {
        let documents = self.prepare(raw_text, source_file, document_title).await?;
        if documents.is_empty() {
            self.ensure_collection(collection).await?;
            info!(source_file, collection, document_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        if let Some(path) = &self.cache_path {
            cache::write_cache(path, &documents).await?;
        }

        self.ensure_collection(collection).await?;
        self.vector_store.upsert(collection, &documents).await.map_err(|e| {
            error!(source_file, collection, error = %e, "upsert failed during ingestion");
            e
        })?;

        let document_count = documents.len();
        info!(source_file, collection, document_count, "ingested document");
        Ok(document_count)
    }

    /// Read a UTF-8 file and ingest it. The title is derived from the file stem.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if the file cannot be read or is not
    /// valid UTF-8, plus everything [`ingest_text`](Self::ingest_text) returns.
    pub async fn ingest_file(&self, path: &Path, collection: &str) -> Result<usize> {
        let raw_text = read_source(path).await?;
        let source_file = path.display().to_string();
        self.ingest_text(&raw_text, &source_file, &title_from_path(path), collection).await
    }

    /// Replay an ingestion cache into `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CacheError`] for an unreadable cache, or the
    /// vector store's error.
    pub async fn upload_cache(&self, path: &Path, collection: &str) -> Result<usize> {
        let documents = cache::read_cache(path).await?;
        self.ensure_collection(collection).await?;
        self.vector_store.upsert(collection, &documents).await?;
        info!(path = %path.display(), collection, document_count = documents.len(), "uploaded cache");
        Ok(documents.len())
    }

    /// Build the two-level hierarchy for parent-document retrieval.
    ///
    /// Splits `raw_text` into parents of `parent_chunk_size` characters, splits
    /// each parent into children of `child_chunk_size`, indexes the children
    /// into `child_collection` with a `parent_id` back-reference, and writes
    /// the parent texts into `parent_store`. Parents and children do not
    /// overlap. Child ids are numbered from 1 across the whole document.
    ///
    /// # Errors
    ///
    /// Same as [`ingest_text`](Self::ingest_text); the parent store is only
    /// written after the children have been indexed.
    pub async fn ingest_hierarchy(
        &self,
        raw_text: &str,
        source_file: &str,
        document_title: &str,
        child_collection: &str,
        parent_store: &dyn ParentStore,
    ) -> Result<HierarchyStats> {
        let parents = Chunker::new(self.config.parent_chunk_size, 0)
            .with_splitter(Arc::clone(&self.splitter))
            .spans(raw_text)?;
        let child_chunker = Chunker::new(self.config.child_chunk_size, 0)
            .with_splitter(Arc::clone(&self.splitter));

        let mut parent_entries = Vec::with_capacity(parents.len());
        let mut tagged: Vec<(Span, Metadata)> = Vec::new();
        let mut next_child = 1u64;

        for parent in parents {
            let parent_id = format!("{source_file}#{}", parent.index);
            for child in child_chunker.spans(&parent.text)? {
                let child = Span::new(next_child, child.text);
                next_child += 1;
                let mut meta = metadata::tag(&child, source_file, document_title);
                meta.parent_id = Some(parent_id.clone());
                tagged.push((child, meta));
            }
            parent_entries.push((parent_id, parent.text));
        }

        let documents = self.embed(tagged).await.map_err(|e| {
            error!(source_file, error = %e, "embedding failed during hierarchy ingestion");
            e
        })?;

        self.ensure_collection(child_collection).await?;
        self.vector_store.upsert(child_collection, &documents).await?;

        let stats = HierarchyStats { parents: parent_entries.len(), children: documents.len() };
        parent_store.put_many(parent_entries).await?;

        info!(source_file, child_collection, parents = stats.parents, children = stats.children, "ingested hierarchy");
        Ok(stats)
    }

    async fn embed(&self, tagged: Vec<(Span, Metadata)>) -> Result<Vec<Document>> {
        let texts: Vec<&str> = tagged.iter().map(|(span, _)| span.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await?;

        let expected = self.embedding_provider.dimensions();
        if embeddings.len() != tagged.len() {
            return Err(RagError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!("expected {} embeddings, got {}", tagged.len(), embeddings.len()),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(RagError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!("expected {expected} dimensions, got {}", bad.len()),
            });
        }

        Ok(tagged
            .into_iter()
            .zip(embeddings)
            .map(|((span, metadata), embedding)| Document {
                id: metadata.chunk_id,
                text: span.text,
                embedding,
                metadata,
            })
            .collect())
    }
}

/// Read a source file as UTF-8 text.
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] if the file is unreadable or not UTF-8.
pub async fn read_source(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RagError::InvalidInput(format!("cannot read '{}': {e}", path.display())))?;
    String::from_utf8(bytes)
        .map_err(|_| RagError::InvalidInput(format!("'{}' is not valid UTF-8 text", path.display())))
}

/// Human-readable title from a file stem: `vector_storage-notes.txt` → `vector storage notes`.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default()
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `embedding_provider` and `vector_store` are required. The configuration
/// defaults to [`RagConfig::default()`] and the splitter to
/// [`CharacterSplitter`].
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    splitter: Option<Arc<dyn TextSplitter>>,
    cache_path: Option<PathBuf>,
}

impl IngestionPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn splitter(mut self, splitter: Arc<dyn TextSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Write the JSON ingestion cache to `path` on every flat ingestion.
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<IngestionPipeline> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        Ok(IngestionPipeline {
            config: self.config.unwrap_or_default(),
            embedding_provider,
            vector_store,
            splitter: self.splitter.unwrap_or_else(|| Arc::new(CharacterSplitter)),
            cache_path: self.cache_path,
        })
    }
}
