//! Text splitting and span tagging.
//!
//! This module provides the [`TextSplitter`] trait with two implementations:
//!
//! - [`CharacterSplitter`]: fixed windows by character count with exact overlap
//! - [`RecursiveSplitter`]: splits by paragraphs, lines, sentences, then words
//!
//! and the [`Chunker`], which turns raw text into ordered, tagged spans.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::document::Span;
use crate::error::{RagError, Result};
use crate::metadata::{self, Metadata};

/// A pure function from `(text, max_size, overlap)` to ordered text spans.
///
/// Sizes are measured in characters. Implementations must be deterministic
/// and never return a span longer than `max_size`.
pub trait TextSplitter: Send + Sync {
    /// Split `text` into spans of at most `max_size` characters.
    fn split(&self, text: &str, max_size: usize, overlap: usize) -> Vec<String>;
}

/// Splits text into fixed windows of `max_size` characters.
///
/// Consecutive windows share exactly `overlap` characters; the final window
/// may be shorter. A window is never emitted if it would lie entirely inside
/// the previous one.
///
/// # Example
///
/// ```rust,ignore
/// use strata_rag::{CharacterSplitter, TextSplitter};
///
/// let spans = CharacterSplitter.split(&text, 500, 50);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterSplitter;

impl TextSplitter for CharacterSplitter {
    fn split(&self, text: &str, max_size: usize, overlap: usize) -> Vec<String> {
        if text.is_empty() || max_size == 0 {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let char_len = bounds.len();
        bounds.push(text.len());

        let step = max_size.saturating_sub(overlap).max(1);
        let mut spans = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + max_size).min(char_len);
            spans.push(text[bounds[start]..bounds[end]].to_string());
            if end == char_len {
                break;
            }
            start += step;
        }

        spans
    }
}

/// Splits text hierarchically: paragraphs → lines → sentences → words.
///
/// Pieces that still exceed `max_size` after the last separator are cut with
/// [`CharacterSplitter`]. Pieces are merged greedily up to `max_size`, and up
/// to `overlap` characters of trailing pieces are carried into the next span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveSplitter;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

impl TextSplitter for RecursiveSplitter {
    fn split(&self, text: &str, max_size: usize, overlap: usize) -> Vec<String> {
        if text.is_empty() || max_size == 0 {
            return Vec::new();
        }
        split_recursive(text, max_size, overlap, &SEPARATORS)
            .into_iter()
            .filter(|span| !span.trim().is_empty())
            .collect()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_recursive(text: &str, max_size: usize, overlap: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= max_size {
        return vec![text.to_string()];
    }

    let Some((separator, remaining)) = separators.split_first() else {
        return CharacterSplitter.split(text, max_size, overlap);
    };
    if !text.contains(separator) {
        return split_recursive(text, max_size, overlap, remaining);
    }

    let mut pieces = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) > max_size {
            pieces.extend(split_recursive(piece, max_size, overlap, remaining));
        } else {
            pieces.push(piece.to_string());
        }
    }

    merge_with_overlap(pieces, max_size, overlap)
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Greedily pack pieces (each at most `max_size`) into spans, carrying a tail
/// of at most `overlap` characters from one span into the next.
fn merge_with_overlap(pieces: Vec<String>, max_size: usize, overlap: usize) -> Vec<String> {
    let mut spans = Vec::new();
    let mut window: VecDeque<(String, usize)> = VecDeque::new();
    let mut window_len = 0;

    for piece in pieces {
        let len = char_len(&piece);
        if !window.is_empty() && window_len + len > max_size {
            spans.push(window.iter().map(|(p, _)| p.as_str()).collect::<String>());
            while window_len > overlap || (window_len > 0 && window_len + len > max_size) {
                match window.pop_front() {
                    Some((_, dropped)) => window_len -= dropped,
                    None => break,
                }
            }
        }
        window_len += len;
        window.push_back((piece, len));
    }

    if !window.is_empty() {
        spans.push(window.iter().map(|(p, _)| p.as_str()).collect::<String>());
    }

    spans
}

/// Turns raw text into ordered `(Span, Metadata)` pairs.
///
/// Uses [`CharacterSplitter`] unless another splitter is supplied.
///
/// # Example
///
/// ```rust,ignore
/// use strata_rag::Chunker;
///
/// let tagged = Chunker::new(500, 50).chunk_and_tag(&text, "my_doc.txt", "My Doc")?;
/// ```
#[derive(Clone)]
pub struct Chunker {
    splitter: Arc<dyn TextSplitter>,
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker producing spans of at most `max_size` characters.
    pub fn new(max_size: usize, overlap: usize) -> Self {
        Self { splitter: Arc::new(CharacterSplitter), max_size, overlap }
    }

    /// Replace the text splitter.
    pub fn with_splitter(mut self, splitter: Arc<dyn TextSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split raw text into spans numbered from 1.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `max_size == 0` or
    /// `overlap >= max_size`.
    pub fn spans(&self, raw_text: &str) -> Result<Vec<Span>> {
        if self.max_size == 0 {
            return Err(RagError::InvalidInput("max_size must be greater than zero".to_string()));
        }
        if self.overlap >= self.max_size {
            return Err(RagError::InvalidInput(format!(
                "overlap ({}) must be less than max_size ({})",
                self.overlap, self.max_size
            )));
        }

        Ok(self
            .splitter
            .split(raw_text, self.max_size, self.overlap)
            .into_iter()
            .zip(1u64..)
            .map(|(text, index)| Span::new(index, text))
            .collect())
    }

    /// Split raw text and tag every span with its metadata.
    ///
    /// # Errors
    ///
    /// Same as [`spans`](Self::spans).
    pub fn chunk_and_tag(
        &self,
        raw_text: &str,
        source_file: &str,
        document_title: &str,
    ) -> Result<Vec<(Span, Metadata)>> {
        Ok(self
            .spans(raw_text)?
            .into_iter()
            .map(|span| {
                let meta = metadata::tag(&span, source_file, document_title);
                (span, meta)
            })
            .collect())
    }
}

/// Split raw text with [`CharacterSplitter`] and tag every span.
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] for inconsistent size parameters.
pub fn chunk_and_tag(
    raw_text: &str,
    source_file: &str,
    document_title: &str,
    max_size: usize,
    overlap: usize,
) -> Result<Vec<(Span, Metadata)>> {
    Chunker::new(max_size, overlap).chunk_and_tag(raw_text, source_file, document_title)
}
