//! Exact nearest-neighbor vector index.
//!
//! A [`VectorIndex`] holds every chunk with exactly one embedding and is
//! immutable once built or loaded. Queries rank all entries by cosine
//! similarity; ties keep chunk insertion order, so results are reproducible
//! for the same build input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ChunkingStrategy;
use crate::document::{Chunk, RetrievalResult, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Version of the persisted index layout.
pub const FORMAT_VERSION: u32 = 1;

/// Describes how an index was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Layout version, see [`FORMAT_VERSION`].
    pub format_version: u32,
    /// Embedding model that produced every vector in the index.
    pub embedding_model: String,
    /// Length of every embedding vector.
    pub dimensions: usize,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// When the index was built.
    pub created_at: DateTime<Utc>,
    /// Chunking parameters and corpus fingerprint, when built by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<IndexSource>,
}

/// Corpus-side provenance of an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSource {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Strategy the chunks were cut with.
    pub chunking: ChunkingStrategy,
    /// Hex SHA-256 of the corpus text the chunks were cut from.
    pub corpus_sha256: String,
}

/// One indexed chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// Embedding of the chunk text, `dimensions` long and finite.
    pub embedding: Vec<f32>,
}

/// An in-memory index of chunk embeddings supporting k-nearest-neighbor queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk and build an index over them.
    ///
    /// Chunks are sent to [`EmbeddingProvider::embed_batch`] in groups of
    /// `batch_size`. The whole build fails on the first failed batch; nothing
    /// is returned that covers only part of `chunks`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if `batch_size == 0`
    /// - [`RagError::Embedding`] if the provider fails, returns the wrong
    ///   number of vectors, returns vectors of inconsistent length, or returns
    ///   NaN or infinite components
    pub async fn build(
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }

        let model = embedder.model_id().to_string();
        let mut entries = Vec::with_capacity(chunks.len());
        let mut dimensions: Option<usize> = None;

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts).await.map_err(|e| {
                error!(model = %model, error = %e, "embedding failed during index build");
                e
            })?;

            if embeddings.len() != batch.len() {
                error!(model = %model, expected = batch.len(), got = embeddings.len(), "embedding count mismatch");
                return Err(RagError::embedding(
                    &model,
                    format!("expected {} embeddings, got {}", batch.len(), embeddings.len()),
                ));
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let expected = *dimensions.get_or_insert(embedding.len());
                if expected == 0 || embedding.len() != expected {
                    return Err(RagError::embedding(
                        &model,
                        format!(
                            "chunk {} has an embedding of length {}, expected {expected}",
                            chunk.index,
                            embedding.len()
                        ),
                    ));
                }
                if embedding.iter().any(|x| !x.is_finite()) {
                    error!(model = %model, chunk = chunk.index, "embedding contains non-finite values");
                    return Err(RagError::embedding(
                        &model,
                        format!("chunk {} has an embedding with non-finite values", chunk.index),
                    ));
                }
                entries.push(IndexEntry { chunk: chunk.clone(), embedding });
            }

            debug!(embedded = entries.len(), total = chunks.len(), "embedded batch");
        }

        let dimensions = dimensions.unwrap_or_else(|| embedder.dimensions());
        if entries.is_empty() {
            warn!(model = %model, "building an empty index");
        }
        info!(model = %model, chunk_count = entries.len(), dimensions, "built vector index");

        Ok(Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                embedding_model: model,
                dimensions,
                chunk_count: entries.len(),
                created_at: Utc::now(),
                source: None,
            },
            entries,
        })
    }

    /// Attach corpus provenance to the manifest.
    pub fn with_source(mut self, source: IndexSource) -> Self {
        self.manifest.source = Some(source);
        self
    }

    /// Return up to `k` chunks ranked by descending cosine similarity to `embedding`.
    ///
    /// Returns every chunk when the index holds fewer than `k`, and an empty
    /// result when `k == 0` or the index is empty.
    pub fn query(&self, embedding: &[f32], k: usize) -> RetrievalResult {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }
        if embedding.len() != self.manifest.dimensions {
            warn!(
                index_dimensions = self.manifest.dimensions,
                query_dimensions = embedding.len(),
                "query embedding dimensionality differs from the index"
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&entry.embedding, embedding)))
            .collect();

        // `sort_by` is stable: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.entries[i].chunk.clone(), score })
            .collect()
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the structural invariants of a deserialized index.
    pub(crate) fn check_integrity(&self) -> std::result::Result<(), String> {
        if self.manifest.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported index format version {} (expected {FORMAT_VERSION})",
                self.manifest.format_version
            ));
        }
        if self.manifest.chunk_count != self.entries.len() {
            return Err(format!(
                "manifest lists {} chunks but {} entries are present",
                self.manifest.chunk_count,
                self.entries.len()
            ));
        }
        if let Some(entry) =
            self.entries.iter().find(|e| e.embedding.len() != self.manifest.dimensions)
        {
            return Err(format!(
                "chunk {} has an embedding of length {}, expected {}",
                entry.chunk.index,
                entry.embedding.len(),
                self.manifest.dimensions
            ));
        }
        if let Some(entry) = self.entries.iter().find(|e| e.embedding.iter().any(|x| !x.is_finite())) {
            return Err(format!("chunk {} has an embedding with non-finite values", entry.chunk.index));
        }
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
