use anyhow::Result;
use std::sync::Arc;

use crate::document::Chunk;
use crate::providers::traits::CompletionProvider;

const DOCUMENT_SEPARATOR: &str = "\n\n";

const QA_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Answers a question by putting every retrieved chunk into one prompt.
pub struct StuffQaChain {
    llm: Arc<dyn CompletionProvider>,
}

impl StuffQaChain {
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub fn build_prompt(documents: &[Chunk], question: &str) -> String {
        let context = documents
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR);

        format!(
            "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
            QA_INSTRUCTIONS, context, question
        )
    }

    /// The model's answer exactly as returned. May be empty.
    pub async fn run(&self, documents: &[Chunk], question: &str) -> Result<String> {
        let prompt = Self::build_prompt(documents, question);
        log::info!(
            "Asking {} with {} context chunk(s)",
            self.llm.get_model_info(),
            documents.len()
        );
        log::debug!("Prompt is {} characters", prompt.len());

        self.llm.complete(&prompt).await
    }
}
