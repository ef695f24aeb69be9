//! `machi`: ask questions about municipal life information from the terminal.
//!
//! ```text
//! machi ingest                 # load or build the index and report on it
//! machi ask "粗大ごみの出し方は？"  # answer one question
//! machi chat                   # interactive session with keyword replies
//! ```

mod chat;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use machi_rag::IndexOrigin;
use tracing_subscriber::EnvFilter;

use settings::Settings;

#[derive(Parser)]
#[command(name = "machi", version, about = "Municipal life-information assistant")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Load the persisted index, building it from the corpus if none exists
    Ingest,
    /// Answer a single question
    Ask {
        question: String,
        /// Also print the retrieved chunks and their scores
        #[arg(long)]
        sources: bool,
    },
    /// Start an interactive chat session
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let engine = cli.settings.start_engine().await?;

    match cli.command {
        Command::Ingest => {
            let action = match engine.origin() {
                IndexOrigin::Loaded => "loaded",
                IndexOrigin::Built => "built",
            };
            let manifest = engine.index().manifest();
            println!(
                "Index {action}: {} chunks, {} dimensions ({}) in {}",
                engine.index().len(),
                manifest.dimensions,
                manifest.embedding_model,
                cli.settings.vector_dir.display()
            );
        }
        Command::Ask { question, sources } => {
            let answer = engine.ask(&question).await?;
            println!("{}", answer.text);
            if sources {
                println!();
                for result in &answer.retrieval {
                    println!("[{:.4}] #{} {}", result.score, result.chunk.index, preview(&result.chunk.text));
                }
            }
        }
        Command::Chat => chat::run(&engine).await?,
    }

    Ok(())
}

fn preview(text: &str) -> String {
    const WIDTH: usize = 60;
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= WIDTH {
        flat
    } else {
        let mut short: String = flat.chars().take(WIDTH).collect();
        short.push('…');
        short
    }
}
