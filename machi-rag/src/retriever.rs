//! Question-to-chunks retrieval.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Embeds questions and looks them up in a shared [`VectorIndex`].
///
/// The embedder must be the one (or equivalent to the one) the index was
/// built with; a mismatch is not detected here beyond a dimensionality
/// warning from [`VectorIndex::query`].
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embedder }
    }

    /// Return the `k` chunks most similar to `question`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the question cannot be embedded or
    /// its embedding has NaN or infinite components. The call is not retried.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult> {
        let query_embedding = self.embedder.embed_query(question).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            e
        })?;

        if query_embedding.iter().any(|x| !x.is_finite()) {
            error!(model = self.embedder.model_id(), "question embedding contains non-finite values");
            return Err(RagError::embedding(
                self.embedder.model_id(),
                "question embedding contains non-finite values",
            ));
        }

        let results = self.index.query(&query_embedding, k);
        debug!(k, result_count = results.len(), top_score = results.first().map(|r| r.score), "retrieved chunks");
        Ok(results)
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;
    use async_trait::async_trait;

    /// Embeds "east" as a unit vector and anything else as NaN.
    struct Compass;

    #[async_trait]
    impl EmbeddingProvider for Compass {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text == "east" { vec![1.0, 0.0] } else { vec![f32::NAN, 0.0] })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            "compass"
        }
    }

    async fn retriever() -> Retriever {
        let chunks = vec![Chunk { index: 0, start: 0, text: "east".to_string() }];
        let index = VectorIndex::build(&chunks, &Compass, 4).await.unwrap();
        Retriever::new(Arc::new(index), Arc::new(Compass))
    }

    #[tokio::test]
    async fn retrieves_matching_chunk() {
        let results = retriever().await.retrieve("east", 3).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn non_finite_question_embedding_is_an_embedding_error() {
        let err = retriever().await.retrieve("somewhere", 3).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }
}
