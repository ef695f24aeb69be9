//! Generative model trait.

use async_trait::async_trait;

use crate::error::Result;

/// A text-in, text-out language model.
///
/// Implementations return [`RagError::Generation`](crate::RagError::Generation)
/// when the call fails or the response carries no usable text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier of the model, used in logs.
    fn model_id(&self) -> &str;
}
