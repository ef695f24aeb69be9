//! Deterministic stand-ins for the remote services.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use machi_rag::{CorpusSource, Document, EmbeddingProvider, GenerativeModel, RagError, Result};

/// Counts occurrences of a fixed vocabulary, one dimension per term.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self { vocabulary: vocabulary.to_vec(), calls: AtomicUsize::new(0) }
    }

    pub fn municipal() -> Self {
        Self::new(&["ゴミ", "今日", "図書館", "燃える", "日"])
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vocabulary.iter().map(|term| text.matches(term).count() as f32).collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn model_id(&self) -> &str {
        "keyword-test"
    }
}

/// Fails every call, or only question embeddings when `queries_only` is set.
pub struct FailingEmbedder {
    pub queries_only: bool,
    inner: KeywordEmbedder,
}

impl FailingEmbedder {
    pub fn always() -> Self {
        Self { queries_only: false, inner: KeywordEmbedder::municipal() }
    }

    pub fn on_queries() -> Self {
        Self { queries_only: true, inner: KeywordEmbedder::municipal() }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.queries_only {
            return self.inner.embed(text).await;
        }
        Err(RagError::Embedding { provider: "failing".into(), message: "quota exceeded".into() })
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding { provider: "failing".into(), message: "quota exceeded".into() })
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Records every prompt and answers with a fixed reply, or fails.
pub struct RecordingModel {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { reply: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for RecordingModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or_else(|| RagError::Generation {
            provider: "recording".into(),
            message: "service unavailable".into(),
        })
    }

    fn model_id(&self) -> &str {
        "recording-test"
    }
}

/// A corpus whose acquisition always fails.
pub struct UnreadableCorpus;

impl CorpusSource for UnreadableCorpus {
    fn documents(&self) -> Result<Vec<Document>> {
        Err(RagError::Corpus("corpus should not be read".into()))
    }
}

pub fn municipal_documents() -> Vec<Document> {
    vec![
        Document {
            source: "gomi.txt".into(),
            text: "燃えるごみは火曜日と金曜日に出してください。".into(),
        },
        Document { source: "today.txt".into(), text: "今日はゴミ出しの日です".into() },
        Document { source: "library.txt".into(), text: "図書館は月曜日が休館です。".into() },
    ]
}
