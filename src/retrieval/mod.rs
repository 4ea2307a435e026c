//! Retrieval stage of the answer pipeline: turns a query into the
//! conversation excerpts most relevant to it.


use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::chat::store::ConversationStore;
use crate::chat::{PromptMessage, Role};
use crate::providers::EmbeddingProvider;

/// How many past messages a query pulls in when the caller does not
/// override it.
pub const DEFAULT_TOP_K: usize = 10;

/// Ranks stored user messages against a query by embedding both sides
/// with the same provider.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    /// Returns up to `top_k` stored user messages relevant to `query`,
    /// most relevant first, wrapped as user-role prompt messages.
    ///
    /// When the index holds no vectors (nothing embedded yet, or every
    /// embedding failed during a reload) this falls back to all user
    /// messages in chronological order, so the generator still sees the
    /// conversation rather than nothing.
    #[inline]
    pub fn retrieve_context(
        &self,
        store: &ConversationStore,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<PromptMessage>> {
        if store.index().is_empty() {
            let fallback: Vec<PromptMessage> = store
                .all_messages()
                .iter()
                .filter(|message| message.role == Role::User)
                .map(|message| PromptMessage::user(message.content.clone()))
                .collect();

            debug!(
                "Index is empty, falling back to all {} user messages",
                fallback.len()
            );
            return Ok(fallback);
        }

        let query_embedding = self.embedder.embed(query)?;
        let hits = store.index().search(&query_embedding, top_k)?;

        let context: Vec<PromptMessage> = hits
            .iter()
            .filter_map(|hit| store.message_for_slot(hit.slot))
            .map(|message| PromptMessage::user(message.content.clone()))
            .collect();

        debug!(
            "Retrieved {} of {} requested context messages",
            context.len(),
            top_k
        );
        Ok(context)
    }
}
