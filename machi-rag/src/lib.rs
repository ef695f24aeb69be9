//! Retrieval-augmented question answering over a municipal life-information corpus.
//!
//! The crate splits corpus text into overlapping chunks, embeds them into a
//! persistent [`VectorIndex`], and answers questions by retrieving the most
//! similar chunks and asking a generative model to answer from them.
//!
//! - [`IngestionOrchestrator`] loads the stored index or builds and saves one
//! - [`RagEngine`] is the ready handle exposing [`RagEngine::answer_question`]
//! - [`EmbeddingProvider`] and [`GenerativeModel`] abstract the remote services;
//!   the `gemini` feature (default) provides implementations for Gemini
//! - [`reply::route`] dispatches chat keywords to canned replies

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod prompt;
pub mod reply;
pub mod retriever;
pub mod store;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, chunker_for, split_text};
pub use config::{ChunkingStrategy, RagConfig, RagConfigBuilder};
pub use corpus::{CorpusSource, DirectoryCorpus, StaticCorpus};
pub use document::{Chunk, Document, RetrievalResult, SearchResult};
pub use embedding::EmbeddingProvider;
pub use engine::{Answer, IndexOrigin, IngestionOrchestrator, IngestionOrchestratorBuilder, RagEngine};
pub use error::{RagError, Result};
pub use generation::GenerativeModel;
pub use index::{IndexEntry, IndexManifest, IndexSource, VectorIndex};
pub use prompt::{AnswerComposer, PromptTemplate};
pub use reply::Reply;
pub use retriever::Retriever;
pub use store::{FileIndexStore, IndexStore};
