//! Multi-query retrieval through LLM query expansion.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::completion::CompletionProvider;
use crate::config::MAX_MULTI_QUERY_VARIANTS;
use crate::document::{RetrievalResult, RetrievedDocument};
use crate::error::{RagError, Result};
use crate::strategy::{BaselineRetriever, Retriever};

/// Query expansion: ask the LLM for paraphrases, search each, merge the union.
///
/// The original query and every paraphrase are searched concurrently with the
/// same `k`. Hits are merged by document key keeping the highest score, so
/// the result can hold more than `k` documents unless a result cap is set.
pub struct MultiQueryRetriever {
    baseline: Arc<BaselineRetriever>,
    completion: Arc<dyn CompletionProvider>,
    variants: usize,
    result_cap: Option<usize>,
}

impl MultiQueryRetriever {
    pub const NAME: &'static str = "multi_query";

    /// Create a retriever asking for `variants` paraphrases (clamped to 1..=5).
    pub fn new(
        baseline: Arc<BaselineRetriever>,
        completion: Arc<dyn CompletionProvider>,
        variants: usize,
    ) -> Self {
        Self {
            baseline,
            completion,
            variants: variants.clamp(1, MAX_MULTI_QUERY_VARIANTS),
            result_cap: None,
        }
    }

    /// Truncate the merged result to at most `cap` documents.
    pub fn with_result_cap(mut self, cap: Option<usize>) -> Self {
        self.result_cap = cap;
        self
    }

    fn prompt(&self, query: &str) -> String {
        format!(
            "You are an AI language model assistant. Generate {n} different versions of the \
             given user question to retrieve relevant documents from a vector database. By \
             generating multiple perspectives on the user question, help the user overcome \
             limitations of distance-based similarity search.\n\n\
             Respond with ONLY a JSON array of {n} strings. No explanation.\n\n\
             Original question: \"{query}\"",
            n = self.variants
        )
    }
}

#[async_trait]
impl Retriever for MultiQueryRetriever {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn retrieve(&self, query: &str, k: usize, collection: &str) -> Result<RetrievalResult> {
        let raw = self.completion.complete(&self.prompt(query)).await?;
        let variants = parse_variants(&raw, query, self.variants);
        if variants.is_empty() {
            warn!(provider = self.completion.name(), "no usable paraphrases in completion");
            return Err(RagError::CompletionError {
                provider: self.completion.name().to_string(),
                message: "response contained no usable paraphrases".to_string(),
            });
        }
        debug!(?variants, "expanded query");

        let queries: Vec<&str> =
            std::iter::once(query).chain(variants.iter().map(String::as_str)).collect();
        let runs = try_join_all(
            queries.iter().map(|q| self.baseline.search(q, k, collection, None)),
        )
        .await?;

        let mut merged: HashMap<u64, RetrievedDocument> = HashMap::new();
        for hit in runs.into_iter().flatten() {
            match merged.entry(hit.document.id) {
                Entry::Occupied(mut best) => {
                    if hit.score > best.get().score {
                        best.get_mut().score = hit.score;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(RetrievedDocument::from_hit(hit));
                }
            }
        }

        let mut result = RetrievalResult::new(Self::NAME, merged.into_values().collect());
        if let Some(cap) = self.result_cap {
            result.documents.truncate(cap);
        }
        debug!(queries = queries.len(), merged = result.len(), "merged multi-query hits");
        Ok(result)
    }
}

/// Extract up to `limit` paraphrases from an LLM answer.
///
/// Accepts a JSON array of strings anywhere in the text; otherwise treats
/// each line as a candidate, stripping list markers and quotes and skipping
/// preamble lines ending in `:`. Blank entries, duplicates, and copies of the
/// original query are dropped.
pub fn parse_variants(raw: &str, original: &str, limit: usize) -> Vec<String> {
    let candidates: Vec<String> = match json_array(raw) {
        Some(items) => items,
        None => raw
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.ends_with(':'))
            .map(str::to_string)
            .collect(),
    };

    let mut seen = vec![original.trim().to_lowercase()];
    let mut variants = Vec::new();
    for candidate in candidates {
        let candidate = candidate.trim().trim_matches('"').trim().to_string();
        let folded = candidate.to_lowercase();
        if candidate.is_empty() || seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        variants.push(candidate);
        if variants.len() == limit {
            break;
        }
    }
    variants
}

fn json_array(raw: &str) -> Option<Vec<String>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let raw = r#"Sure! ["How are embeddings stored?", "Vector database storage"]"#;
        assert_eq!(
            parse_variants(raw, "vector storage", 3),
            vec!["How are embeddings stored?", "Vector database storage"]
        );
    }

    #[test]
    fn parses_numbered_lines() {
        let raw = "Here are three alternatives:\n1. How do vector databases store embeddings?\n\
                   2) What is the embedding storage process?\n- Embedding persistence mechanisms\n";
        assert_eq!(
            parse_variants(raw, "How does vector storage work?", 3),
            vec![
                "How do vector databases store embeddings?",
                "What is the embedding storage process?",
                "Embedding persistence mechanisms",
            ]
        );
    }

    #[test]
    fn drops_duplicates_and_original() {
        let raw = "[\"vector storage\", \"Disk layout\", \"disk layout\", \"  \"]";
        assert_eq!(parse_variants(raw, "Vector Storage", 5), vec!["Disk layout"]);
    }

    #[test]
    fn truncates_to_limit() {
        let raw = r#"["a", "b", "c", "d"]"#;
        assert_eq!(parse_variants(raw, "q", 2), vec!["a", "b"]);
    }

    #[test]
    fn blank_answer_yields_no_variants() {
        assert!(parse_variants("", "q", 3).is_empty());
        assert!(parse_variants("\n\n", "q", 3).is_empty());
    }
}
