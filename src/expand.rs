//! Query expansion: one question in, several paraphrased variants out.
//!
//! Expansion is a plain three-step function: render the prompt, call the
//! generation model once, split the reply into lines. The original question
//! always comes first in the result and appears exactly once.

use std::sync::Arc;

use anyhow::Result;

use crate::llm::ChatModel;

/// Instruction template; `{question}` is replaced verbatim.
pub const EXPANSION_TEMPLATE: &str = "You are an AI language model assistant. \n\
Generate five different versions of the given user question \n\
to retrieve relevant documents from a vector database. \n\
Separate them by newlines. \n\
Original question: {question}";

/// Render the expansion prompt for `question`.
pub fn render_expansion_prompt(question: &str) -> String {
    EXPANSION_TEMPLATE.replace("{question}", question)
}

/// Split a model reply into variants and put `question` in front.
///
/// Lines are trimmed and blank lines dropped. A line equal to the question
/// is moved to the front instead of being duplicated.
pub fn variants_from_reply(question: &str, reply: &str) -> Vec<String> {
    let mut variants = vec![question.to_string()];
    variants.extend(
        reply
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && *line != question)
            .map(str::to_string),
    );
    variants
}

#[derive(Clone)]
pub struct QueryExpander {
    model: Arc<dyn ChatModel>,
}

impl QueryExpander {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Expand `question` into an ordered list of variants.
    ///
    /// Model failures propagate; there is no retry at this level.
    pub async fn expand(&self, question: &str) -> Result<Vec<String>> {
        let reply = self
            .model
            .generate(&render_expansion_prompt(question))
            .await?;
        Ok(variants_from_reply(question, &reply))
    }

    /// Like [`expand`](Self::expand) but keeps only the first `max` variants.
    pub async fn expand_capped(&self, question: &str, max: Option<usize>) -> Result<Vec<String>> {
        let mut variants = self.expand(question).await?;
        if let Some(max) = max {
            variants.truncate(max);
        }
        tracing::debug!(variants = variants.len(), "expanded question");
        Ok(variants)
    }
}
