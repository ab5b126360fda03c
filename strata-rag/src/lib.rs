//! # strata-rag
//!
//! Multi-strategy retrieval: ingest a document into a vector index, then run
//! several retrieval strategies against the same collection and compare their
//! results and latency.
//!
//! ## Overview
//!
//! - [`chunking`] splits text into overlapping spans and [`metadata`] tags them
//! - [`IngestionPipeline`] embeds spans and upserts them into a [`VectorStore`]
//! - [`strategy`] holds the four [`Retriever`]s and the [`Fallback`] decorator
//! - [`ComparisonHarness`] times every strategy against the baseline
//!
//! Remote backends are feature-gated: `ollama` (embedding and completion over
//! HTTP) and `qdrant` (vector index over gRPC).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_rag::*;
//!
//! let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
//! let pipeline = IngestionPipeline::builder()
//!     .embedding_provider(Arc::clone(&embedder))
//!     .vector_store(Arc::clone(&store))
//!     .build()?;
//! pipeline.ingest_text(&text, "notes.txt", "notes", "demo_index").await?;
//!
//! let baseline = Arc::new(BaselineRetriever::new(embedder, store));
//! let multi_query = MultiQueryRetriever::new(Arc::clone(&baseline), chat, 3);
//! let harness = ComparisonHarness::new(Arc::clone(&baseline))
//!     .with_strategy(Arc::new(Fallback::new(multi_query, Arc::clone(&baseline))));
//! let report = harness.compare("How does vector storage work?", 3, "demo_index").await?;
//! ```

pub mod cache;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod docstore;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod harness;
pub mod inmemory;
pub mod metadata;
pub mod pipeline;
pub mod strategy;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{CharacterSplitter, Chunker, RecursiveSplitter, TextSplitter, chunk_and_tag};
pub use completion::CompletionProvider;
pub use config::{RagConfig, RagConfigBuilder, ServiceConfig};
pub use docstore::{InMemoryParentStore, ParentStore};
pub use document::{DegradationReason, Document, RetrievalResult, RetrievedDocument, SearchResult, Span};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use filter::{AttributeInfo, FilterExpr};
pub use harness::{ComparisonHarness, ComparisonReport, ExecutionMode, StrategyRun};
pub use inmemory::InMemoryVectorStore;
pub use metadata::{DocumentType, FieldType, FieldValue, Metadata, TechnicalLevel};
pub use pipeline::{HierarchyStats, IngestionPipeline, IngestionPipelineBuilder};
pub use strategy::{
    BaselineRetriever, Fallback, MultiQueryRetriever, ParentDocumentRetriever, Retriever,
    SelfQueryRetriever,
};
pub use vectorstore::VectorStore;
