//! Generation stage of the answer pipeline: assembles the prompt and
//! asks the completion provider for a reply.


use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::chat::PromptMessage;
use crate::providers::CompletionProvider;

/// Instruction prepended whenever retrieved context accompanies the
/// question.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. The messages before the final question are excerpts from this user's earlier conversation, retrieved because they may relate to it. Draw on them when they are relevant; otherwise answer from your own knowledge.";

/// A completed generation: the reply plus the exact prompt that
/// produced it.
#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    pub answer: String,
    pub prompt: Vec<PromptMessage>,
}

/// Builds the `[system] + context + question` prompt and runs it
/// through the completion provider.
pub struct ResponseGenerator {
    completer: Arc<dyn CompletionProvider>,
}

impl ResponseGenerator {
    #[inline]
    pub fn new(completer: Arc<dyn CompletionProvider>) -> Self {
        Self { completer }
    }

    /// Generates an answer to `query` grounded in `context`.
    ///
    /// The system instruction is only included when there is context to
    /// explain; a bare question goes to the model unframed. The returned
    /// prompt is exactly what the provider received, so callers can
    /// record it alongside the reply.
    #[inline]
    pub fn generate(
        &self,
        query: &str,
        context: Vec<PromptMessage>,
    ) -> Result<GeneratedResponse> {
        let mut prompt = Vec::with_capacity(context.len() + 2);

        if !context.is_empty() {
            prompt.push(PromptMessage::system(SYSTEM_INSTRUCTION));
            prompt.extend(context);
        }
        prompt.push(PromptMessage::user(query));

        debug!("Sending prompt with {} messages", prompt.len());
        let answer = self.completer.complete(&prompt)?;

        Ok(GeneratedResponse { answer, prompt })
    }
}
