//! Deterministic in-process providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use strata_rag::{
    CompletionProvider, EmbeddingProvider, InMemoryVectorStore, IngestionPipeline, RagConfig,
    RagError, Result, VectorStore,
};

pub const DIM: usize = 64;

/// Bag-of-words embedder: each lowercase alphanumeric token adds 1.0 to a
/// bucket chosen by an FNV-1a hash. Texts sharing words score higher.
#[derive(Debug, Default)]
pub struct HashingEmbedder {
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), calls: AtomicUsize::new(0) }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIM];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let hash = token.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
            vector[(hash % DIM as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// An embedder that fails after `ok_calls` successful calls.
#[derive(Debug)]
pub struct FlakyEmbedder {
    pub ok_calls: usize,
    pub calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn failing_after(ok_calls: usize) -> Self {
        Self { ok_calls, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
            return Err(RagError::EmbeddingError {
                provider: "flaky".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(HashingEmbedder::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Answers every prompt with the same text, optionally after a delay.
#[derive(Debug)]
pub struct ScriptedCompletion {
    pub answer: String,
    pub delay: Option<Duration>,
    pub prompts: std::sync::Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), delay: None, prompts: std::sync::Mutex::new(Vec::new()) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A completion provider that is always unavailable.
#[derive(Debug, Default)]
pub struct FailingCompletion;

#[async_trait]
impl CompletionProvider for FailingCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(RagError::CompletionError {
            provider: "failing".to_string(),
            message: "service unavailable".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Ten short documents about vector databases, one paragraph each.
pub const CORPUS: [&str; 10] = [
    "Vector storage keeps embeddings in a collection indexed for similarity search.",
    "To install the database, follow these steps: download, unpack, run the setup script.",
    "The search API reference lists parameters such as limit, filter, and with_payload.",
    "Example: upsert three points and query the nearest neighbour.",
    "Conceptual overview of approximate nearest neighbour indexes and their architecture.",
    "Advanced performance tuning covers quantization and memory optimization.",
    "A simple introduction to embeddings for beginners.",
    "Payload filters restrict search results by metadata values.",
    "Collections store vectors of a fixed dimension with a cosine distance metric.",
    "Snapshots back up a collection so storage can be restored later.",
];

/// Build a store with `CORPUS` ingested into `collection`, one span per document.
pub async fn indexed_corpus(collection: &str) -> (Arc<HashingEmbedder>, Arc<InMemoryVectorStore>) {
    let embedder = Arc::new(HashingEmbedder::new());
    let store = Arc::new(InMemoryVectorStore::new());
    store.ensure_collection(collection, DIM).await.unwrap();

    let documents = CORPUS
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let span = strata_rag::Span::new(i as u64 + 1, *text);
            let metadata = strata_rag::metadata::tag(&span, "corpus.txt", "corpus");
            strata_rag::Document {
                id: span.index,
                text: span.text,
                embedding: HashingEmbedder::vector(text),
                metadata,
            }
        })
        .collect::<Vec<_>>();
    store.upsert(collection, &documents).await.unwrap();

    (embedder, store)
}

/// A pipeline over `store` with default configuration.
pub fn pipeline(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RagConfig,
) -> IngestionPipeline {
    IngestionPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(store)
        .build()
        .unwrap()
}

/// Deterministic filler text of exactly `len` characters.
pub fn filler(len: usize) -> String {
    let sentence = "Vector storage systems index embeddings for similarity search. ";
    sentence.chars().cycle().take(len).collect()
}
