//! Startup orchestration and the ready-to-serve answering engine.
//!
//! [`IngestionOrchestrator::start`] is the only way to obtain a [`RagEngine`]:
//! it loads the stored index or, when none exists, reads the corpus, chunks
//! it, builds the index and persists it. Any failure on that path is
//! returned to the caller, so an engine never exists without a complete
//! index.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use machi_rag::{DirectoryCorpus, FileIndexStore, IngestionOrchestrator, RagConfig};
//!
//! let engine = IngestionOrchestrator::builder()
//!     .config(RagConfig::default())
//!     .store(Arc::new(FileIndexStore::new("vector_store")))
//!     .corpus(Arc::new(DirectoryCorpus::new("corpus")))
//!     .embedding_provider(embedder)
//!     .model(model)
//!     .build()?
//!     .start()
//!     .await?;
//!
//! let answer = engine.answer_question("粗大ごみの出し方は？").await?;
//! ```

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::chunking::chunker_for;
use crate::config::RagConfig;
use crate::corpus::CorpusSource;
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;
use crate::index::{IndexSource, VectorIndex};
use crate::prompt::{AnswerComposer, PromptTemplate};
use crate::retriever::Retriever;
use crate::store::IndexStore;

/// Where the serving index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Read from the index store.
    Loaded,
    /// Built from the corpus during this startup and saved.
    Built,
}

/// Brings the engine from "no index" to ready.
pub struct IngestionOrchestrator {
    config: RagConfig,
    store: Arc<dyn IndexStore>,
    corpus: Arc<dyn CorpusSource>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn GenerativeModel>,
    template: PromptTemplate,
}

impl IngestionOrchestrator {
    /// Create a new [`IngestionOrchestratorBuilder`].
    pub fn builder() -> IngestionOrchestratorBuilder {
        IngestionOrchestratorBuilder::default()
    }

    /// Load the stored index, or build and persist one, and return the ready engine.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] for invalid chunking parameters, before any service call
    /// - [`RagError::Storage`] if the stored index is unreadable or saving fails
    /// - [`RagError::Corpus`] if the corpus cannot be read
    /// - [`RagError::Embedding`] if any chunk fails to embed
    ///
    /// On error nothing is saved to the store.
    ///
    /// Store and corpus I/O runs on Tokio's blocking pool, so this must be
    /// awaited inside a Tokio runtime.
    pub async fn start(self) -> Result<RagEngine> {
        self.config.validate()?;

        let store = Arc::clone(&self.store);
        let stored = blocking(move || store.load(), |message| {
            RagError::storage(self.store.location(), message)
        })
        .await?;

        let (index, origin) = match stored {
            Some(index) => {
                self.check_stored(&index);
                (index, IndexOrigin::Loaded)
            }
            None => {
                info!(location = %self.store.location().display(), "no stored index; building from corpus");
                (self.build_and_save().await?, IndexOrigin::Built)
            }
        };

        info!(?origin, chunk_count = index.len(), top_k = self.config.top_k, "engine ready");

        let index = Arc::new(index);
        Ok(RagEngine {
            retriever: Retriever::new(index, self.embedding_provider),
            composer: AnswerComposer::new(self.model).with_template(self.template),
            top_k: self.config.top_k,
            origin,
        })
    }

    async fn build_and_save(&self) -> Result<VectorIndex> {
        let chunker = chunker_for(&self.config)?;
        let corpus = Arc::clone(&self.corpus);
        let text = blocking(move || corpus.concatenated_text(), RagError::Corpus).await?;
        let chunks = chunker.split(&text);
        info!(
            corpus_chars = text.chars().count(),
            chunk_count = chunks.len(),
            chunk_size = self.config.chunk_size,
            chunk_overlap = self.config.chunk_overlap,
            "chunked corpus"
        );

        let source = IndexSource {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            chunking: self.config.chunking,
            corpus_sha256: format!("{:x}", Sha256::digest(text.as_bytes())),
        };
        let index = VectorIndex::build(
            &chunks,
            self.embedding_provider.as_ref(),
            self.config.embed_batch_size,
        )
        .await?
        .with_source(source);

        let store = Arc::clone(&self.store);
        blocking(
            move || store.save(&index).map(|()| index),
            |message| RagError::storage(self.store.location(), message),
        )
        .await
    }

    /// Warn when a stored index was produced under different settings.
    fn check_stored(&self, index: &VectorIndex) {
        let manifest = index.manifest();
        let provider = &self.embedding_provider;
        if manifest.embedding_model != provider.model_id()
            || manifest.dimensions != provider.dimensions()
        {
            warn!(
                stored_model = %manifest.embedding_model,
                stored_dimensions = manifest.dimensions,
                configured_model = provider.model_id(),
                configured_dimensions = provider.dimensions(),
                "stored index was built with a different embedding model; remove it to rebuild"
            );
        }
        if let Some(source) = &manifest.source {
            if source.chunk_size != self.config.chunk_size
                || source.chunk_overlap != self.config.chunk_overlap
                || source.chunking != self.config.chunking
            {
                warn!(
                    stored_chunk_size = source.chunk_size,
                    stored_chunk_overlap = source.chunk_overlap,
                    "stored index was chunked with different settings; remove it to rebuild"
                );
            }
        }
    }
}

/// Run blocking file work off the async worker threads.
///
/// A panic in `work` is resumed on the caller; a task cancelled by runtime
/// shutdown is reported through `cancelled`.
async fn blocking<T, F>(work: F, cancelled: impl FnOnce(String) -> RagError) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(cancelled(format!("blocking task did not complete: {e}"))),
    }
}

/// Builder for constructing an [`IngestionOrchestrator`].
///
/// All fields except `config` and `template` are required.
#[derive(Default)]
pub struct IngestionOrchestratorBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn IndexStore>>,
    corpus: Option<Arc<dyn CorpusSource>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    model: Option<Arc<dyn GenerativeModel>>,
    template: Option<PromptTemplate>,
}

impl IngestionOrchestratorBuilder {
    /// Set the engine configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set where the index is loaded from and saved to.
    pub fn store(mut self, store: Arc<dyn IndexStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the corpus read when no stored index exists.
    pub fn corpus(mut self, corpus: Arc<dyn CorpusSource>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Set the embedding provider used for both indexing and questions.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generative model that writes answers.
    pub fn model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Override the prompt template.
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Build the [`IngestionOrchestrator`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<IngestionOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let store =
            self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let corpus =
            self.corpus.ok_or_else(|| RagError::Config("corpus is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let model =
            self.model.ok_or_else(|| RagError::Config("model is required".to_string()))?;

        Ok(IngestionOrchestrator {
            config,
            store,
            corpus,
            embedding_provider,
            model,
            template: self.template.unwrap_or_default(),
        })
    }
}

/// An answer together with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The model output, verbatim.
    pub text: String,
    /// Chunks placed in the prompt, ranked by descending similarity.
    pub retrieval: RetrievalResult,
}

/// The ready engine: an immutable index shared by every question.
///
/// Cloning is cheap; clones share the same index, so one engine can be
/// handed to any number of concurrent request handlers.
#[derive(Clone)]
pub struct RagEngine {
    retriever: Retriever,
    composer: AnswerComposer,
    top_k: usize,
    origin: IndexOrigin,
}

impl RagEngine {
    /// Answer `question` from the indexed corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the question cannot be embedded or
    /// [`RagError::Generation`] if the model call fails. Nothing is retried.
    pub async fn answer_question(&self, question: &str) -> Result<String> {
        Ok(self.ask(question).await?.text)
    }

    /// Like [`answer_question`](Self::answer_question), also returning the retrieved chunks.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let retrieval = self.retriever.retrieve(question, self.top_k).await?;
        let text = self.composer.answer(question, &retrieval).await?;
        Ok(Answer { text, retrieval })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        self.retriever.index()
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}
