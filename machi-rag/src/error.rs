//! Error types for the `machi-rag` crate.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while building, loading, or querying the answering engine.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid engine parameters, detected before any service call is made.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The embedding service failed or returned an unusable response.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generative model failed or returned no usable text.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading or writing the persisted index failed.
    #[error("Storage error ({}): {message}", path.display())]
    Storage {
        /// The storage location involved.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The corpus source could not supply text.
    #[error("Corpus error: {0}")]
    Corpus(String),
}

impl RagError {
    pub(crate) fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn storage(path: &Path, message: impl Into<String>) -> Self {
        Self::Storage { path: path.to_path_buf(), message: message.into() }
    }
}

/// A convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, RagError>;
