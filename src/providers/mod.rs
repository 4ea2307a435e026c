// Model provider boundaries
// This module defines the two external services the pipeline consumes
// and the Ollama implementation of both.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;
use crate::chat::PromptMessage;

/// Produces fixed-length embedding vectors for text.
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embeds one text. The returned vector always has exactly
    /// `dimension()` entries.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Generates a reply from an ordered prompt sequence.
pub trait CompletionProvider: Send + Sync {
    fn complete(&self, messages: &[PromptMessage]) -> Result<String>;
}
