//! Data types for documents, chunks, and retrieval results.

use serde::{Deserialize, Serialize};

/// Raw extracted text of one source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Identifier of the source, usually the file name.
    pub source: String,
    /// The extracted text.
    pub text: String,
}

/// A contiguous segment of corpus text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the order it was produced.
    pub index: usize,
    /// Character offset of the chunk's first character in the split text.
    pub start: usize,
    /// The text content of the chunk.
    pub text: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Chunks ranked by descending similarity for one question.
pub type RetrievalResult = Vec<SearchResult>;
