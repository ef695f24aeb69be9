use anyhow::Result;
use machi_rag::RagEngine;
use machi_rag::reply::{self, FALLBACK, Reply, WELCOME};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

/// Run an interactive session until EOF, Ctrl-C or `exit`.
pub async fn run(engine: &RagEngine) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("{WELCOME}\n");

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        println!("{}\n", respond(engine, &line).await);
    }

    Ok(())
}

/// Produce the reply for one message. Engine failures are logged and the
/// user sees the fallback text.
async fn respond(engine: &RagEngine, message: &str) -> String {
    match reply::route(message) {
        Reply::Canned(text) => text.to_string(),
        Reply::Ask(question) => match engine.answer_question(&question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "failed to answer question");
                FALLBACK.to_string()
            }
        },
    }
}
