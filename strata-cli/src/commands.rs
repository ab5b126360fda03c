//! Subcommand implementations: wire providers and the index from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use strata_rag::filter::default_attributes;
use strata_rag::ollama::{OllamaCompletionProvider, OllamaEmbeddingProvider};
use strata_rag::pipeline::{read_source, title_from_path};
use strata_rag::qdrant::QdrantVectorStore;
use strata_rag::{
    BaselineRetriever, ComparisonHarness, CompletionProvider, EmbeddingProvider, ExecutionMode,
    Fallback, InMemoryParentStore, IngestionPipeline, MultiQueryRetriever, ParentDocumentRetriever,
    RagConfig, Retriever, SelfQueryRetriever, ServiceConfig, VectorStore,
};
use tracing::info;

use crate::render;

const CONTENT_DESCRIPTION: &str = "Passages from technical documentation about vector search and RAG";

pub struct CompareOptions {
    pub queries: Vec<String>,
    pub k: usize,
    pub behavior_only: bool,
    pub parent_source: Option<PathBuf>,
    pub concurrent: bool,
    pub timeout: Option<Duration>,
    pub json: bool,
}

fn embedder(service: &ServiceConfig) -> Arc<dyn EmbeddingProvider> {
    Arc::new(OllamaEmbeddingProvider::from_config(service))
}

fn vector_store(service: &ServiceConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store = QdrantVectorStore::new(&service.qdrant_url)
        .with_context(|| format!("connecting to qdrant at {}", service.qdrant_url))?;
    Ok(Arc::new(store))
}

fn pipeline(
    service: &ServiceConfig,
    store: Arc<dyn VectorStore>,
    cache: Option<&Path>,
) -> anyhow::Result<IngestionPipeline> {
    let mut builder = IngestionPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(embedder(service))
        .vector_store(store);
    if let Some(cache) = cache {
        builder = builder.cache_path(cache);
    }
    Ok(builder.build()?)
}

pub async fn ingest(
    service: &ServiceConfig,
    input: &Path,
    cache: &Path,
    title: Option<String>,
    no_upload: bool,
) -> anyhow::Result<()> {
    let text = read_source(input).await?;
    let title = title.unwrap_or_else(|| title_from_path(input));
    let source_file = input.display().to_string();

    let pipeline = pipeline(service, vector_store(service)?, Some(cache))?;
    if no_upload {
        let documents = pipeline.prepare(&text, &source_file, &title).await?;
        strata_rag::cache::write_cache(cache, &documents).await?;
        println!("Wrote {} documents to {}", documents.len(), cache.display());
        return Ok(());
    }

    let written = pipeline.ingest_text(&text, &source_file, &title, &service.collection).await?;
    println!("Ingested {written} documents from {} into '{}'", input.display(), service.collection);
    println!("Cache written to {}", cache.display());
    Ok(())
}

pub async fn upload(service: &ServiceConfig, cache: &Path) -> anyhow::Result<()> {
    let pipeline = pipeline(service, vector_store(service)?, None)?;
    let written = pipeline
        .upload_cache(cache, &service.collection)
        .await
        .with_context(|| format!("uploading {}", cache.display()))?;
    println!("Uploaded {written} documents into '{}'", service.collection);
    Ok(())
}

pub async fn collections(service: &ServiceConfig) -> anyhow::Result<()> {
    let store = vector_store(service)?;
    let names = store.list_collections().await?;
    if names.is_empty() {
        println!("No collections.");
    }
    for name in names {
        let count = store.count(&name).await?;
        println!("{name}\t{count} documents");
    }
    Ok(())
}

pub async fn compare(service: &ServiceConfig, options: CompareOptions) -> anyhow::Result<()> {
    let config = RagConfig::builder().top_k(options.k.max(1)).build()?;
    let store = vector_store(service)?;
    let embedder = embedder(service);
    let chat: Arc<dyn CompletionProvider> = Arc::new(OllamaCompletionProvider::from_config(service));
    let baseline = Arc::new(BaselineRetriever::new(Arc::clone(&embedder), Arc::clone(&store)));

    if options.behavior_only {
        for (i, query) in options.queries.iter().enumerate() {
            let result = baseline.retrieve(query, options.k, &service.collection).await?;
            println!("TEST QUERY {}: '{query}'", i + 1);
            println!("[baseline] {} result(s)", result.len());
            print!("{}", render::documents(&result));
            println!(
                "{}",
                render::behavior(
                    query,
                    config.multi_query_variants,
                    config.parent_fan_out,
                    config.parent_chunk_size,
                    config.child_chunk_size,
                )
            );
        }
        println!("{}", render::summary());
        return Ok(());
    }

    let parents = Arc::new(InMemoryParentStore::new());
    let child_collection = service.child_collection();
    if let Some(source) = &options.parent_source {
        let text = read_source(source).await?;
        let stats = pipeline(service, Arc::clone(&store), None)?
            .ingest_hierarchy(
                &text,
                &source.display().to_string(),
                &title_from_path(source),
                &child_collection,
                parents.as_ref(),
            )
            .await?;
        info!(parents = stats.parents, children = stats.children, "parent store populated");
    }

    let multi_query = MultiQueryRetriever::new(Arc::clone(&baseline), Arc::clone(&chat), config.multi_query_variants)
        .with_result_cap(config.result_cap);
    let self_query =
        SelfQueryRetriever::new(Arc::clone(&baseline), chat, CONTENT_DESCRIPTION, default_attributes())?;
    let parent_document = ParentDocumentRetriever::new(Arc::clone(&baseline), parents, config.parent_fan_out)
        .with_child_collection(child_collection);

    let mode = if options.concurrent { ExecutionMode::Concurrent } else { ExecutionMode::Sequential };
    let harness = ComparisonHarness::new(Arc::clone(&baseline))
        .with_strategy(Arc::new(Fallback::new(multi_query, Arc::clone(&baseline)).with_timeout(options.timeout)))
        .with_strategy(Arc::new(Fallback::new(self_query, Arc::clone(&baseline)).with_timeout(options.timeout)))
        .with_strategy(Arc::new(Fallback::new(parent_document, Arc::clone(&baseline)).with_timeout(options.timeout)))
        .mode(mode);

    let reports = harness.compare_all(&options.queries, options.k, &service.collection).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    for (i, report) in reports.iter().enumerate() {
        println!("{}", render::report(i + 1, report));
    }
    println!("{}", render::summary());
    Ok(())
}
