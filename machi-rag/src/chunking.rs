//! Text chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: fixed character windows with configurable overlap
//! - [`RecursiveChunker`]: splits by paragraphs, lines, then sentences, merging
//!   pieces up to the chunk size
//!
//! All sizes count characters (Unicode scalar values), never bytes.

use std::ops::Range;
use std::sync::Arc;

use crate::config::{ChunkingStrategy, RagConfig, validate_chunking};
use crate::document::Chunk;
use crate::error::Result;

/// A strategy for splitting corpus text into chunks.
pub trait Chunker: Send + Sync {
    /// Split text into chunks in document order.
    ///
    /// Returns an empty `Vec` for empty text.
    fn split(&self, text: &str) -> Vec<Chunk>;
}

/// Split `text` into fixed windows of `chunk_size` characters, each window
/// starting `chunk_size - chunk_overlap` characters after the previous one.
///
/// The last window ends at the end of the text and may be shorter than
/// `chunk_size`. No window is emitted once one has reached the end, so the
/// tail is never re-read by a window contained in its predecessor.
///
/// # Errors
///
/// Returns [`RagError::Config`](crate::RagError::Config) if `chunk_size == 0`
/// or `chunk_overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(FixedSizeChunker::new(chunk_size, chunk_overlap)?.split(text))
}

/// Build the chunker selected by `config`.
pub fn chunker_for(config: &RagConfig) -> Result<Arc<dyn Chunker>> {
    Ok(match config.chunking {
        ChunkingStrategy::Fixed => {
            Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?)
        }
        ChunkingStrategy::Recursive => {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?)
        }
    })
}

/// Splits text into fixed-size character windows with overlap.
///
/// # Example
///
/// ```rust
/// use machi_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(4, 1).unwrap();
/// let texts: Vec<String> = chunker.split("abcdefghij").into_iter().map(|c| c.text).collect();
/// assert_eq!(texts, ["abcd", "defg", "ghij"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if `chunk_size == 0`
    /// or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn split(&self, text: &str) -> Vec<Chunk> {
        let spans = fixed_spans(text, 0..text.len(), self.chunk_size, self.chunk_overlap);
        spans_to_chunks(text, spans)
    }
}

/// Splits text hierarchically: paragraphs → lines → sentences → clauses → words.
///
/// Pieces are merged greedily up to `chunk_size` characters. When a merged
/// chunk is emitted, its trailing pieces totalling at most `chunk_overlap`
/// characters seed the next chunk. A piece that still exceeds `chunk_size`
/// after every separator has been tried is cut with fixed windows.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

const SEPARATORS: [&str; 6] = ["\n\n", "\n", "。", ". ", "、", " "];

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Same as [`FixedSizeChunker::new`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    fn split_span(&self, text: &str, span: Range<usize>, separators: &[&str]) -> Vec<Range<usize>> {
        if char_len(text, &span) <= self.chunk_size {
            return vec![span];
        }
        let Some((separator, remaining)) = separators.split_first() else {
            return fixed_spans(text, span, self.chunk_size, self.chunk_overlap);
        };

        let segments = split_keeping_separator(text, span.clone(), separator);
        if segments.len() <= 1 {
            return self.split_span(text, span, remaining);
        }

        let mut pieces = Vec::new();
        // Contiguous segments of the chunk being assembled, with their char lengths.
        let mut window: Vec<(Range<usize>, usize)> = Vec::new();
        let mut window_len = 0;

        for segment in segments {
            let segment_len = char_len(text, &segment);

            if segment_len > self.chunk_size {
                if let Some(merged) = merge(&window) {
                    pieces.push(merged);
                }
                window.clear();
                window_len = 0;
                pieces.extend(self.split_span(text, segment, remaining));
                continue;
            }

            if !window.is_empty() && window_len + segment_len > self.chunk_size {
                if let Some(merged) = merge(&window) {
                    pieces.push(merged);
                }
                while !window.is_empty()
                    && (window_len > self.chunk_overlap || window_len + segment_len > self.chunk_size)
                {
                    let (_, len) = window.remove(0);
                    window_len -= len;
                }
            }

            window.push((segment, segment_len));
            window_len += segment_len;
        }

        if let Some(merged) = merge(&window) {
            pieces.push(merged);
        }
        pieces
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let spans = self.split_span(text, 0..text.len(), &SEPARATORS);
        spans_to_chunks(text, spans)
    }
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}

/// Join a run of contiguous segments into one span.
fn merge(window: &[(Range<usize>, usize)]) -> Option<Range<usize>> {
    let first = window.first()?;
    let last = window.last()?;
    Some(first.0.start..last.0.end)
}

/// Split a span at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator(text: &str, span: Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let mut result = Vec::new();
    let mut start = span.start;

    while let Some(pos) = text[start..span.end].find(separator) {
        let end = start + pos + separator.len();
        result.push(start..end);
        start = end;
    }

    if start < span.end {
        result.push(start..span.end);
    }

    result
}

/// Byte ranges of fixed character windows over `span`.
fn fixed_spans(
    text: &str,
    span: Range<usize>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Range<usize>> {
    if span.is_empty() {
        return Vec::new();
    }

    let base = span.start;
    let mut boundaries: Vec<usize> =
        text[span.clone()].char_indices().map(|(offset, _)| base + offset).collect();
    boundaries.push(span.end);
    let char_count = boundaries.len() - 1;
    let step = chunk_size - chunk_overlap;

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        spans.push(boundaries[start]..boundaries[end]);
        if end == char_count {
            break;
        }
        start += step;
    }
    spans
}

/// Materialize spans (in non-decreasing start order) as numbered chunks.
fn spans_to_chunks(text: &str, spans: Vec<Range<usize>>) -> Vec<Chunk> {
    let mut cursor_byte = 0;
    let mut cursor_char = 0;

    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            cursor_char += text[cursor_byte..span.start].chars().count();
            cursor_byte = span.start;
            Chunk { index, start: cursor_char, text: text[span].to_string() }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 10, 2).unwrap().is_empty());
        assert!(RecursiveChunker::new(10, 2).unwrap().split("").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("abc", 10, 2).unwrap();
        assert_eq!(texts(&chunks), ["abc"]);
        assert_eq!(chunks[0].start, 0);
    }

    #[test]
    fn windows_advance_by_size_minus_overlap() {
        let chunks = split_text("abcdefghij", 4, 2).unwrap();
        assert_eq!(texts(&chunks), ["abcd", "cdef", "efgh", "ghij"]);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, [0, 2, 4, 6]);
    }

    #[test]
    fn final_window_may_be_short() {
        let chunks = split_text("abcdefghijk", 4, 1).unwrap();
        assert_eq!(texts(&chunks), ["abcd", "defg", "ghij", "jk"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = split_text("今日はゴミ出しの日です", 5, 1).unwrap();
        assert_eq!(texts(&chunks), ["今日はゴミ", "ミ出しの日", "日です"]);
        assert_eq!(chunks[2].start, 8);
    }

    #[test]
    fn invalid_parameters_are_configuration_errors() {
        assert!(matches!(split_text("abc", 0, 0), Err(RagError::Config(_))));
        assert!(matches!(split_text("abc", 3, 3), Err(RagError::Config(_))));
        assert!(matches!(RecursiveChunker::new(3, 5), Err(RagError::Config(_))));
    }

    #[test]
    fn recursive_prefers_paragraph_boundaries() {
        let text = "第一段落です。\n\n第二段落です。\n\n第三段落です。";
        let chunks = RecursiveChunker::new(12, 0).unwrap().split(text);
        assert_eq!(texts(&chunks), ["第一段落です。\n\n", "第二段落です。\n\n", "第三段落です。"]);
        assert_eq!(chunks[1].start, 9);
    }

    #[test]
    fn recursive_falls_back_to_sentences_then_windows() {
        let text = format!("ごみは朝八時までに出してください。資源ごみは第二水曜日です。{}", "あ".repeat(25));
        let chunks = RecursiveChunker::new(20, 0).unwrap().split(&text);
        assert!(chunks.iter().all(|c| c.char_len() <= 20));
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].text, "ごみは朝八時までに出してください。");
        assert_eq!(chunks[3].text, "あ".repeat(5));
        assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<String>(), text);
    }

    #[test]
    fn recursive_carries_trailing_pieces_as_overlap() {
        let text = "aa bb cc dd ee";
        let chunks = RecursiveChunker::new(6, 3).unwrap().split(text);
        assert_eq!(texts(&chunks), ["aa bb ", "bb cc ", "cc dd ", "dd ee"]);
    }

    #[test]
    fn chunker_for_respects_strategy() {
        let config = RagConfig::builder()
            .chunk_size(6)
            .chunk_overlap(0)
            .chunking(ChunkingStrategy::Recursive)
            .build()
            .unwrap();
        let chunks = chunker_for(&config).unwrap().split("aa bb cc");
        assert_eq!(texts(&chunks), ["aa bb ", "cc"]);
    }
}
