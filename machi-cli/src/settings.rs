use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, ValueEnum};
use machi_rag::gemini::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL, GeminiClient, GeminiEmbeddingProvider, GeminiModel,
    GenerationConfig,
};
use machi_rag::{
    ChunkingStrategy, DirectoryCorpus, FileIndexStore, IngestionOrchestrator, PromptTemplate,
    RagConfig, RagEngine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Chunking {
    /// Fixed character windows
    Fixed,
    /// Split on paragraph, line and sentence boundaries first
    Recursive,
}

impl From<Chunking> for ChunkingStrategy {
    fn from(value: Chunking) -> Self {
        match value {
            Chunking::Fixed => ChunkingStrategy::Fixed,
            Chunking::Recursive => ChunkingStrategy::Recursive,
        }
    }
}

/// Settings shared by every subcommand. Each flag can also come from the
/// environment or a `.env` file.
#[derive(Clone, Args)]
pub struct Settings {
    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Directory of .txt and .md documents to index
    #[arg(long, env = "MACHI_CORPUS_DIR", default_value = "corpus", global = true)]
    pub corpus_dir: PathBuf,

    /// Directory holding the persisted index
    #[arg(long, env = "MACHI_VECTOR_DIR", default_value = "vector_store", global = true)]
    pub vector_dir: PathBuf,

    /// Embedding model name
    #[arg(long, env = "MACHI_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    pub embedding_model: String,

    /// Generation model name
    #[arg(long, env = "MACHI_LLM_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub llm_model: String,

    /// Chunk size in characters
    #[arg(long, env = "MACHI_CHUNK_SIZE", default_value_t = 1000, global = true)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "MACHI_CHUNK_OVERLAP", default_value_t = 100, global = true)]
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[arg(long, env = "MACHI_TOP_K", default_value_t = 5, global = true)]
    pub top_k: usize,

    /// Chunking strategy used when building the index
    #[arg(long, value_enum, default_value_t = Chunking::Fixed, global = true)]
    pub chunking: Chunking,

    /// Municipality named in the prompt
    #[arg(long, env = "MACHI_MUNICIPALITY", default_value = "野々市市", global = true)]
    pub municipality: String,

    /// Sampling temperature for answers
    #[arg(long, global = true)]
    pub temperature: Option<f32>,
}

impl Settings {
    pub fn rag_config(&self) -> machi_rag::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .chunking(self.chunking.into())
            .build()
    }

    /// Load the stored index, or build and save it, and return the ready engine.
    pub async fn start_engine(&self) -> anyhow::Result<RagEngine> {
        let config = self.rag_config().context("invalid chunking settings")?;

        let api_key = self
            .api_key
            .as_deref()
            .context("GOOGLE_API_KEY is not set (pass --api-key or add it to .env)")?;
        let client = GeminiClient::new(api_key)?;

        let embedder = GeminiEmbeddingProvider::new(client.clone()).with_model(&self.embedding_model);
        let model = GeminiModel::new(client)
            .with_model(&self.llm_model)
            .with_generation_config(GenerationConfig {
                temperature: self.temperature,
                ..GenerationConfig::default()
            });

        let orchestrator = IngestionOrchestrator::builder()
            .config(config)
            .store(Arc::new(FileIndexStore::new(&self.vector_dir)))
            .corpus(Arc::new(DirectoryCorpus::new(&self.corpus_dir)))
            .embedding_provider(Arc::new(embedder))
            .model(Arc::new(model))
            .template(PromptTemplate::for_municipality(&self.municipality))
            .build()?;

        orchestrator.start().await.with_context(|| {
            format!(
                "failed to prepare the index in {} from {}",
                self.vector_dir.display(),
                self.corpus_dir.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use crate::{Cli, Command};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_setting_has_help_text() {
        let mut command = Cli::command();
        let help = command.render_long_help().to_string();
        assert!(help.contains("Chunking strategy used when building the index"));

        let bare: Vec<_> = command
            .get_arguments()
            .filter(|arg| arg.get_long().is_some() && arg.get_help().is_none())
            .filter_map(|arg| arg.get_long())
            .filter(|long| !matches!(*long, "help" | "version"))
            .collect();
        assert!(bare.is_empty(), "flags without help: {bare:?}");
    }

    #[test]
    fn ask_takes_the_question_and_overrides() {
        let cli = Cli::try_parse_from([
            "machi",
            "ask",
            "今日は何の日",
            "--top-k",
            "3",
            "--chunking",
            "recursive",
            "--api-key",
            "k",
        ])
        .unwrap();

        let Command::Ask { question, sources } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(question, "今日は何の日");
        assert!(!sources);
        assert_eq!(cli.settings.top_k, 3);
        assert_eq!(cli.settings.chunking, super::Chunking::Recursive);

        let config = cli.settings.rag_config().unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunking, machi_rag::ChunkingStrategy::Recursive);
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        let cli = Cli::try_parse_from([
            "machi",
            "ingest",
            "--chunk-size",
            "100",
            "--chunk-overlap",
            "100",
        ])
        .unwrap();
        assert!(cli.settings.rag_config().is_err());
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let mut cli = Cli::try_parse_from(["machi", "ingest"]).unwrap();
        cli.settings.api_key = None;
        let err = cli.settings.start_engine().await.err().expect("api key is required");
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }
}
