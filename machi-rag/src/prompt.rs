//! Grounded prompt assembly and answer generation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;

/// The fixed parts of a grounded prompt.
///
/// A prompt is laid out as: preamble, context header, retrieved chunk texts
/// joined by `delimiter`, question header, the question, answer cue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptTemplate {
    pub preamble: String,
    pub context_header: String,
    pub question_header: String,
    pub answer_cue: String,
    /// Separator placed between chunk texts in the context section.
    pub delimiter: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::for_municipality("野々市市")
    }
}

impl PromptTemplate {
    /// The standard Japanese template naming the municipality the corpus covers.
    pub fn for_municipality(name: &str) -> Self {
        Self {
            preamble: format!(
                "あなたは{name}の生活情報に詳しいAIです。\n以下の文書内容に基づいて、正確に回答してください。"
            ),
            context_header: "【文脈】".to_string(),
            question_header: "【質問】".to_string(),
            answer_cue: "【回答】".to_string(),
            delimiter: "\n\n=====\n\n".to_string(),
        }
    }

    /// Assemble the prompt for `question` over `retrieval`, keeping rank order.
    pub fn render(&self, question: &str, retrieval: &[SearchResult]) -> String {
        let context = retrieval
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.delimiter);

        format!(
            "{preamble}\n\n{context_header}\n{context}\n\n{question_header}\n{question}\n\n{answer_cue}\n",
            preamble = self.preamble,
            context_header = self.context_header,
            question_header = self.question_header,
            answer_cue = self.answer_cue,
        )
    }
}

/// Turns a question and its retrieved chunks into a model answer.
#[derive(Clone)]
pub struct AnswerComposer {
    model: Arc<dyn GenerativeModel>,
    template: PromptTemplate,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model, template: PromptTemplate::default() }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Prompt the model with `retrieval` as context and return its output verbatim.
    ///
    /// An empty retrieval still produces a prompt, with an empty context section.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Generation`] if the model call fails or yields
    /// only whitespace. The call is not retried.
    pub async fn answer(&self, question: &str, retrieval: &[SearchResult]) -> Result<String> {
        if retrieval.is_empty() {
            warn!("no chunks retrieved; prompting without context");
        }

        let prompt = self.template.render(question, retrieval);
        debug!(
            model = self.model.model_id(),
            context_chunks = retrieval.len(),
            prompt_chars = prompt.chars().count(),
            "generating answer"
        );

        let answer = self.model.generate(&prompt).await.map_err(|e| {
            error!(model = self.model.model_id(), error = %e, "generation failed");
            e
        })?;

        if answer.trim().is_empty() {
            error!(model = self.model.model_id(), "model returned no text");
            return Err(RagError::generation(self.model.model_id(), "model returned no text"));
        }
        Ok(answer)
    }
}
