//! Property tests for span splitting and metadata tagging.

use proptest::prelude::*;
use strata_rag::chunking::{CharacterSplitter, Chunker, RecursiveSplitter, TextSplitter, chunk_and_tag};
use strata_rag::metadata::{DocumentType, TechnicalLevel};

/// Text drawn from prose, markdown headers, list items, and code-ish lines.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[A-Za-z ,.]{0,80}",
            "#{1,6} [A-Za-z ]{1,20}",
            "- [a-z ]{1,30}",
            "    let [a-z]{1,8} = [0-9]{1,3};",
            Just("This tutorial covers advanced performance tuning.".to_string()),
            Just("Ünïcödé text · with wide chars ✓".to_string()),
        ],
        0..30,
    )
    .prop_map(|lines| lines.join("\n"))
}

fn arb_bounds() -> impl Strategy<Value = (usize, usize)> {
    (1usize..200).prop_flat_map(|max| (Just(max), 0..max))
}

/// `chunk_and_tag` is a pure function of its inputs.
mod prop_chunking_determinism {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn same_input_same_spans_and_metadata(text in arb_text(), (max, overlap) in arb_bounds()) {
            let first = chunk_and_tag(&text, "doc.md", "Doc", max, overlap).unwrap();
            let second = chunk_and_tag(&text, "doc.md", "Doc", max, overlap).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn spans_are_bounded_and_numbered(text in arb_text(), (max, overlap) in arb_bounds()) {
            let tagged = chunk_and_tag(&text, "doc.md", "Doc", max, overlap).unwrap();
            for (i, (span, meta)) in tagged.iter().enumerate() {
                prop_assert!(span.char_count <= max);
                prop_assert_eq!(span.index, i as u64 + 1);
                prop_assert_eq!(meta.chunk_id, span.index);
            }
        }

        #[test]
        fn character_windows_overlap_exactly(text in arb_text(), (max, overlap) in arb_bounds()) {
            let spans = CharacterSplitter.split(&text, max, overlap);
            for pair in spans.windows(2) {
                let tail: String = {
                    let chars: Vec<char> = pair[0].chars().collect();
                    chars[chars.len() - overlap..].iter().collect()
                };
                let head: String = pair[1].chars().take(overlap).collect();
                prop_assert_eq!(tail, head);
            }
        }

        #[test]
        fn recursive_spans_respect_max_size(text in arb_text(), (max, overlap) in arb_bounds()) {
            for span in RecursiveSplitter.split(&text, max, overlap) {
                prop_assert!(span.chars().count() <= max);
                prop_assert!(!span.trim().is_empty());
            }
        }
    }
}

/// Every span gets exactly one type and level; `header_level` is present iff `is_header`.
mod prop_classification_totality {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn classification_is_total(text in arb_text()) {
            for (_, meta) in chunk_and_tag(&text, "doc.md", "Doc", 120, 20).unwrap() {
                prop_assert!(DocumentType::ALL.contains(&meta.document_type));
                prop_assert_eq!(meta.category.as_str(), meta.document_type.category());
                prop_assert!(matches!(
                    meta.technical_level,
                    TechnicalLevel::Beginner | TechnicalLevel::Intermediate | TechnicalLevel::Advanced
                ));
                prop_assert_eq!(meta.header_level.is_some(), meta.is_header);
            }
        }
    }
}

#[test]
fn three_thousand_chars_make_seven_spans() {
    let text: String = "abcdefghij".repeat(300);
    let spans = Chunker::new(500, 50).spans(&text).unwrap();
    assert_eq!(spans.len(), 7);
    assert!(spans.iter().all(|s| s.char_count <= 500));
    assert_eq!(spans.last().unwrap().char_count, 300);
}

#[test]
fn overlap_not_below_max_is_invalid_input() {
    let err = chunk_and_tag("text", "doc.md", "Doc", 10, 10).unwrap_err();
    assert!(matches!(err, strata_rag::RagError::InvalidInput(_)));
}
