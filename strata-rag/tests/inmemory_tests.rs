//! Property tests for in-memory vector store search ordering and filtering.

use std::collections::HashMap;

use proptest::prelude::*;
use strata_rag::document::{Document, Span};
use strata_rag::filter::FilterExpr;
use strata_rag::inmemory::InMemoryVectorStore;
use strata_rag::metadata::{self, FieldValue};
use strata_rag::vectorstore::VectorStore;
use strata_rag::RagError;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a tagged document with a normalized embedding.
fn arb_document(dim: usize) -> impl Strategy<Value = Document> {
    (1u64..200, "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(|(id, text, embedding)| {
        let span = Span::new(id, text);
        let metadata = metadata::tag(&span, "prop.txt", "prop");
        Document { id, text: span.text, embedding, metadata }
    })
}

fn dedup(documents: &[Document]) -> Vec<Document> {
    let mut unique: HashMap<u64, Document> = HashMap::new();
    for document in documents {
        unique.entry(document.id).or_insert_with(|| document.clone());
    }
    unique.into_values().collect()
}

/// Searching returns at most `top_k` results in descending score order, with
/// equal scores ordered by ascending document id.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            documents in proptest::collection::vec(arb_document(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_collection("test", DIM).await.unwrap();

                let unique = dedup(&documents);
                let count = unique.len();
                store.upsert("test", &unique).await.unwrap();
                (store.search("test", &query, top_k, None).await.unwrap(), count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
                if window[0].score == window[1].score {
                    prop_assert!(window[0].document.id < window[1].document.id);
                }
            }
        }

        #[test]
        fn filtered_results_all_match(
            documents in proptest::collection::vec(arb_document(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            has_list in any::<bool>(),
        ) {
            let filter = FilterExpr::eq("has_list", FieldValue::Bool(has_list));
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, expected) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.ensure_collection("test", DIM).await.unwrap();
                let unique = dedup(&documents);
                let expected = unique.iter().filter(|d| filter.matches(&d.metadata)).count();
                store.upsert("test", &unique).await.unwrap();
                (store.search("test", &query, 50, Some(&filter)).await.unwrap(), expected)
            });

            prop_assert_eq!(results.len(), expected);
            for hit in &results {
                prop_assert_eq!(hit.document.metadata.has_list, has_list);
            }
        }
    }
}

fn document(id: u64, embedding: Vec<f32>) -> Document {
    let span = Span::new(id, format!("document {id}"));
    let metadata = metadata::tag(&span, "unit.txt", "unit");
    Document { id, text: span.text, embedding, metadata }
}

#[tokio::test]
async fn ties_break_by_ascending_id() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("ties", 2).await.unwrap();
    let docs = vec![document(9, vec![1.0, 0.0]), document(3, vec![1.0, 0.0]), document(5, vec![0.0, 1.0])];
    store.upsert("ties", &docs).await.unwrap();

    let hits = store.search("ties", &[1.0, 0.0], 3, None).await.unwrap();
    let ids: Vec<u64> = hits.iter().map(|h| h.document.id).collect();
    assert_eq!(ids, vec![3, 9, 5]);
}

#[tokio::test]
async fn upsert_is_last_write_wins() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("c", 2).await.unwrap();
    store.upsert("c", &[document(1, vec![1.0, 0.0])]).await.unwrap();
    store.upsert("c", &[document(1, vec![0.0, 1.0])]).await.unwrap();

    assert_eq!(store.count("c").await.unwrap(), 1);
    let hits = store.search("c", &[0.0, 1.0], 1, None).await.unwrap();
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn missing_collection_and_bad_dimensions_are_index_errors() {
    let store = InMemoryVectorStore::new();
    let err = store.upsert("nope", &[document(1, vec![1.0])]).await.unwrap_err();
    assert!(matches!(err, RagError::IndexWriteError { .. }));
    let err = store.search("nope", &[1.0], 1, None).await.unwrap_err();
    assert!(matches!(err, RagError::IndexQueryError { .. }));

    store.ensure_collection("c", 2).await.unwrap();
    let err = store.upsert("c", &[document(1, vec![1.0, 0.0, 0.0])]).await.unwrap_err();
    assert!(matches!(err, RagError::IndexWriteError { .. }));
    let err = store.search("c", &[1.0], 1, None).await.unwrap_err();
    assert!(matches!(err, RagError::IndexQueryError { .. }));
}

#[tokio::test]
async fn unknown_filter_field_is_rejected() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("c", 2).await.unwrap();
    let filter = FilterExpr::eq("author", FieldValue::Text("ada".into()));
    let err = store.search("c", &[1.0, 0.0], 1, Some(&filter)).await.unwrap_err();
    assert!(matches!(err, RagError::FilterRejected(_)));
}

#[tokio::test]
async fn collections_are_listed_and_deleted() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("b", 2).await.unwrap();
    store.ensure_collection("a", 2).await.unwrap();
    store.ensure_collection("a", 8).await.unwrap();
    assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);

    store.delete_collection("a").await.unwrap();
    assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
}
