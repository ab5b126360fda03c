//! Retrieval strategies and the fallback policy against the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FailingCompletion, FlakyEmbedder, HashingEmbedder, ScriptedCompletion, filler, indexed_corpus};
use strata_rag::filter::default_attributes;
use strata_rag::{
    AttributeInfo, BaselineRetriever, DegradationReason, Document, Fallback, FieldType, InMemoryParentStore,
    InMemoryVectorStore, MultiQueryRetriever, ParentDocumentRetriever, ParentStore, RagConfig, RagError,
    Retriever, SelfQueryRetriever, Span, VectorStore, metadata,
};

const COLLECTION: &str = "demo_index";

async fn baseline() -> Arc<BaselineRetriever> {
    let (embedder, store) = indexed_corpus(COLLECTION).await;
    Arc::new(BaselineRetriever::new(embedder, store))
}

fn keys(result: &strata_rag::RetrievalResult) -> Vec<&str> {
    result.documents.iter().map(|d| d.key.as_str()).collect()
}

#[tokio::test]
async fn baseline_returns_at_most_k_ranked_documents() {
    let baseline = baseline().await;
    let result = baseline.retrieve("vector storage", 3, COLLECTION).await.unwrap();

    assert_eq!(result.strategy, "baseline");
    assert_eq!(result.len(), 3);
    assert!(!result.degraded);
    assert!(result.reason.is_none());
    for pair in result.documents.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn baseline_failure_is_surfaced() {
    let store = Arc::new(InMemoryVectorStore::new());
    let baseline = BaselineRetriever::new(Arc::new(HashingEmbedder::new()), store);
    let err = baseline.retrieve("vector storage", 3, "missing").await.unwrap_err();
    assert!(matches!(err, RagError::IndexQueryError { .. }));
}

#[tokio::test]
async fn failing_llm_degrades_to_identical_baseline_results() {
    let baseline = baseline().await;
    let expected = baseline.retrieve("vector storage", 3, COLLECTION).await.unwrap();

    let multi_query = Fallback::new(
        MultiQueryRetriever::new(Arc::clone(&baseline), Arc::new(FailingCompletion), 3),
        Arc::clone(&baseline),
    );
    let self_query = Fallback::new(
        SelfQueryRetriever::new(
            Arc::clone(&baseline),
            Arc::new(FailingCompletion),
            "Vector database documentation",
            default_attributes(),
        )
        .unwrap(),
        Arc::clone(&baseline),
    );

    for strategy in [&multi_query as &dyn Retriever, &self_query] {
        let result = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();
        assert_eq!(result.strategy, strategy.name());
        assert!(result.degraded);
        assert_eq!(result.reason, Some(DegradationReason::LlmUnavailable));
        assert_eq!(result.documents, expected.documents);
    }
}

#[tokio::test]
async fn unusable_paraphrases_degrade_as_llm_unavailable() {
    let baseline = baseline().await;
    let strategy = Fallback::new(
        MultiQueryRetriever::new(Arc::clone(&baseline), Arc::new(ScriptedCompletion::new("   ")), 3),
        Arc::clone(&baseline),
    );
    let result = strategy.retrieve("vector storage", 2, COLLECTION).await.unwrap();
    assert_eq!(result.reason, Some(DegradationReason::LlmUnavailable));
    assert_eq!(result.len(), 2);
}

#[tokio::test]
async fn multi_query_union_never_shrinks() {
    let baseline = baseline().await;
    let completion = Arc::new(ScriptedCompletion::new(
        r#"["How are embeddings stored in a collection?", "snapshots restore storage", "payload filters"]"#,
    ));
    let strategy = MultiQueryRetriever::new(Arc::clone(&baseline), completion.clone(), 3);

    let base = baseline.retrieve("vector storage", 3, COLLECTION).await.unwrap();
    let merged = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();

    assert!(base.len() <= 3);
    assert!(!merged.degraded);
    assert!(merged.len() >= base.len());
    for key in keys(&base) {
        assert!(keys(&merged).contains(&key), "baseline hit {key} missing from union");
    }
    for pair in merged.documents.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(completion.prompts.lock().unwrap()[0].contains("vector storage"));
}

#[tokio::test]
async fn multi_query_keeps_best_score_per_document() {
    let baseline = baseline().await;
    let strategy = MultiQueryRetriever::new(
        Arc::clone(&baseline),
        Arc::new(ScriptedCompletion::new(r#"["Vector storage keeps embeddings in a collection"]"#)),
        1,
    );
    let merged = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();

    let mut seen: Vec<&str> = keys(&merged);
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), merged.len());

    let paraphrase = baseline.search("Vector storage keeps embeddings in a collection", 3, COLLECTION, None).await.unwrap();
    let best = paraphrase.iter().find(|h| h.document.id == 1).unwrap().score;
    let doc = merged.documents.iter().find(|d| d.key == "1").unwrap();
    assert!(doc.score >= best);
}

#[tokio::test]
async fn multi_query_result_cap_truncates_union() {
    let baseline = baseline().await;
    let strategy = MultiQueryRetriever::new(
        Arc::clone(&baseline),
        Arc::new(ScriptedCompletion::new(r#"["install setup steps", "advanced performance tuning"]"#)),
        2,
    )
    .with_result_cap(Some(2));
    let result = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();
    assert_eq!(result.len(), 2);
}

#[tokio::test]
async fn self_query_applies_generated_filter() {
    let baseline = baseline().await;
    let completion = ScriptedCompletion::new(
        r#"{"query": "install", "filter": {"op": "eq", "field": "document_type", "value": "tutorial"}}"#,
    );
    let strategy = SelfQueryRetriever::new(
        Arc::clone(&baseline),
        Arc::new(completion),
        "Vector database documentation",
        default_attributes(),
    )
    .unwrap();

    let result = strategy.retrieve("tutorials about installing", 3, COLLECTION).await.unwrap();
    assert!(!result.degraded);
    assert!(!result.is_empty());
    assert!(result.documents.iter().all(|d| d.metadata.document_type.as_str() == "tutorial"));
}

#[tokio::test]
async fn self_query_rejected_filter_falls_back() {
    let baseline = baseline().await;
    let completion = ScriptedCompletion::new(
        r#"{"query": "storage", "filter": {"op": "eq", "field": "author", "value": "ada"}}"#,
    );
    let strategy = Fallback::new(
        SelfQueryRetriever::new(Arc::clone(&baseline), Arc::new(completion), "docs", default_attributes())
            .unwrap(),
        Arc::clone(&baseline),
    );

    let result = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();
    let expected = baseline.retrieve("vector storage", 3, COLLECTION).await.unwrap();
    assert_eq!(result.reason, Some(DegradationReason::FilterRejected));
    assert_eq!(result.documents, expected.documents);
}

#[tokio::test]
async fn self_query_schema_with_absent_field_is_config_error() {
    let baseline = baseline().await;
    let attributes = vec![AttributeInfo::new("author", "Who wrote the span", FieldType::Text)];
    let err = SelfQueryRetriever::new(baseline, Arc::new(FailingCompletion), "docs", attributes).err().unwrap();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[tokio::test]
async fn inner_provider_error_degrades_as_provider_error() {
    // The flaky embedder answers the original query, then fails on the paraphrases.
    let (_, store) = indexed_corpus(COLLECTION).await;
    let flaky = Arc::new(BaselineRetriever::new(Arc::new(FlakyEmbedder::failing_after(1)), store.clone()));
    let healthy = Arc::new(BaselineRetriever::new(Arc::new(HashingEmbedder::new()), store));
    let strategy = Fallback::new(
        MultiQueryRetriever::new(flaky, Arc::new(ScriptedCompletion::new(r#"["a", "b"]"#)), 2),
        healthy,
    );

    let result = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();
    assert_eq!(result.reason, Some(DegradationReason::ProviderError));
    assert_eq!(result.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_strategy_times_out() {
    let baseline = baseline().await;
    let slow = ScriptedCompletion::new(r#"["a"]"#).with_delay(Duration::from_secs(60));
    let strategy = Fallback::new(MultiQueryRetriever::new(Arc::clone(&baseline), Arc::new(slow), 1), Arc::clone(&baseline))
        .with_timeout(Some(Duration::from_secs(5)));

    let result = strategy.retrieve("vector storage", 3, COLLECTION).await.unwrap();
    assert!(result.degraded);
    assert_eq!(result.reason, Some(DegradationReason::Timeout));
    assert_eq!(result.strategy, "multi_query");
}

fn child(id: u64, parent_id: &str, embedding: Vec<f32>) -> Document {
    let span = Span::new(id, format!("child {id} of {parent_id}"));
    let mut metadata = metadata::tag(&span, "notes.txt", "notes");
    metadata.parent_id = Some(parent_id.to_string());
    Document { id, text: span.text, embedding, metadata }
}

async fn child_index() -> (Arc<BaselineRetriever>, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    store.ensure_collection("children", 2).await.unwrap();
    store
        .upsert(
            "children",
            &[
                child(1, "p1", vec![1.0, 0.0]),
                child(2, "p1", vec![0.9, 0.1]),
                child(3, "p2", vec![0.5, 0.5]),
                child(4, "p3", vec![0.0, 1.0]),
            ],
        )
        .await
        .unwrap();
    let embedder = Arc::new(StaticEmbedder(vec![1.0, 0.0]));
    (Arc::new(BaselineRetriever::new(embedder, store.clone())), store)
}

/// Embeds every text to the same vector.
struct StaticEmbedder(Vec<f32>);

#[async_trait::async_trait]
impl strata_rag::EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, _text: &str) -> strata_rag::Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn dimensions(&self) -> usize {
        self.0.len()
    }
}

#[tokio::test]
async fn parent_document_dedups_by_best_child() {
    let (baseline, _) = child_index().await;
    let parents = Arc::new(InMemoryParentStore::new());
    parents
        .put_many(vec![
            ("p1".into(), "parent one full text".into()),
            ("p2".into(), "parent two full text".into()),
            ("p3".into(), "parent three full text".into()),
        ])
        .await
        .unwrap();
    let strategy = ParentDocumentRetriever::new(baseline, parents, 3);

    let result = strategy.retrieve("anything", 2, "children").await.unwrap();

    assert!(!result.degraded);
    assert_eq!(keys(&result), vec!["p1", "p2"]);
    assert_eq!(result.documents[0].text, "parent one full text");
    assert!((result.documents[0].score - 1.0).abs() < 1e-6);
    assert_eq!(result.documents[0].metadata.chunk_id, 1);
}

#[tokio::test]
async fn parent_document_drops_unresolved_parents() {
    let (baseline, _) = child_index().await;
    let parents = Arc::new(InMemoryParentStore::new());
    parents.put_many(vec![("p3".into(), "parent three".into())]).await.unwrap();
    let strategy = ParentDocumentRetriever::new(baseline, parents, 3);

    let result = strategy.retrieve("anything", 3, "children").await.unwrap();
    assert_eq!(keys(&result), vec!["p3"]);
    assert!(!result.degraded);
}

#[tokio::test]
async fn empty_parent_store_reports_parent_store_empty() {
    let (baseline, _) = child_index().await;
    let strategy = Fallback::new(
        ParentDocumentRetriever::new(Arc::clone(&baseline), Arc::new(InMemoryParentStore::new()), 3),
        baseline,
    );

    let result = strategy.retrieve("anything", 2, "children").await.unwrap();
    assert!(result.is_empty());
    assert!(result.degraded);
    assert_eq!(result.reason, Some(DegradationReason::ParentStoreEmpty));
    assert_eq!(result.strategy, "parent_document");
}

#[tokio::test]
async fn out_of_sync_parent_store_reports_parent_store_empty() {
    let (baseline, _) = child_index().await;
    let parents = Arc::new(InMemoryParentStore::new());
    parents.put_many(vec![("other".into(), "unrelated".into())]).await.unwrap();
    let strategy = ParentDocumentRetriever::new(baseline, parents, 3);

    let result = strategy.retrieve("anything", 2, "children").await.unwrap();
    assert!(result.is_empty());
    assert_eq!(result.reason, Some(DegradationReason::ParentStoreEmpty));
}

#[tokio::test]
async fn parent_document_over_ingested_hierarchy() {
    let embedder = Arc::new(HashingEmbedder::new());
    let store = Arc::new(InMemoryVectorStore::new());
    let parents = Arc::new(InMemoryParentStore::new());
    let pipeline = common::pipeline(embedder.clone(), store.clone(), RagConfig::default());
    pipeline
        .ingest_hierarchy(&filler(5000), "notes.txt", "notes", "demo_index_children", parents.as_ref())
        .await
        .unwrap();

    let baseline = Arc::new(BaselineRetriever::new(embedder, store));
    let strategy = ParentDocumentRetriever::new(baseline, parents, 3).with_child_collection("demo_index_children");
    let result = strategy.retrieve("vector storage", 2, "demo_index").await.unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.documents.iter().all(|d| d.text.chars().count() <= 2000 && d.key.starts_with("notes.txt#")));
}

#[tokio::test]
async fn end_to_end_three_thousand_chars() {
    let embedder = Arc::new(HashingEmbedder::new());
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = common::pipeline(embedder.clone(), store.clone(), RagConfig::default());

    let written = pipeline.ingest_text(&filler(3000), "notes.txt", "notes", COLLECTION).await.unwrap();
    assert!((6..=7).contains(&written));

    let baseline = BaselineRetriever::new(embedder, store);
    let result = baseline.retrieve("How does vector storage work?", 2, COLLECTION).await.unwrap();
    assert_eq!(result.len(), 2);
    assert!(result.documents[0].score >= result.documents[1].score);
}
