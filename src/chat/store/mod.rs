
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chat::{ChatHistory, ChatMessage, PromptMessage, Role};
use crate::index::VectorIndex;
use crate::providers::EmbeddingProvider;
use crate::{ChatError, Result};

/// Owns one chat's message log, the embeddings of its user messages,
/// and the derived vector index, keeping all three consistent and
/// mirrored to a JSON artifact on disk.
///
/// The artifact stores only messages and the slot mapping. Vectors are
/// re-derived through the embedding provider on load, so the on-disk
/// format stays independent of any provider's output.
pub struct ConversationStore {
    storage_path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    messages: Vec<ChatMessage>,
    embeddings: Vec<Vec<f32>>,
    embedding_to_message_idx: Vec<usize>,
    index: VectorIndex,
}

impl std::fmt::Debug for ConversationStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("storage_path", &self.storage_path)
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

impl ConversationStore {
    /// Creates an empty store that will persist to `storage_path`.
    #[inline]
    pub fn new(storage_path: PathBuf, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let index = VectorIndex::new(embedder.dimension());

        Self {
            storage_path,
            embedder,
            messages: Vec::new(),
            embeddings: Vec::new(),
            embedding_to_message_idx: Vec::new(),
            index,
        }
    }

    /// Creates a store and loads any existing history from disk.
    #[inline]
    pub fn open(storage_path: PathBuf, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let mut store = Self::new(storage_path, embedder);
        store.load();
        store
    }

    /// Appends a message with the current timestamp and persists the
    /// full state. User messages are embedded and indexed first; if the
    /// provider fails, the store is left exactly as it was.
    #[inline]
    pub fn append(
        &mut self,
        role: Role,
        content: &str,
        context: Option<Vec<PromptMessage>>,
    ) -> Result<()> {
        let vector = if role == Role::User {
            let vector = self.embedder.embed(content)?;
            if vector.len() != self.index.dimension() {
                return Err(ChatError::Embedding(format!(
                    "provider returned a {}-dimension vector, index expects {}",
                    vector.len(),
                    self.index.dimension()
                )));
            }
            Some(vector)
        } else {
            None
        };

        self.messages.push(ChatMessage::new(role, content.to_string(), context));

        if let Some(vector) = vector {
            self.embeddings.push(vector);
            self.embedding_to_message_idx.push(self.messages.len() - 1);
            self.index.rebuild(&self.embeddings)?;
        }

        self.persist();
        Ok(())
    }

    /// Messages in insertion order.
    #[inline]
    pub fn all_messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Maps a vector-index slot back to its message.
    #[inline]
    pub fn message_for_slot(&self, slot: usize) -> Option<&ChatMessage> {
        self.embedding_to_message_idx
            .get(slot)
            .and_then(|&idx| self.messages.get(idx))
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Returns `(indexed, total)`: how many of the user messages are
    /// currently searchable. The counts diverge when re-embedding
    /// failed for some messages during the last load.
    #[inline]
    pub fn index_coverage(&self) -> (usize, usize) {
        let total_user = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count();

        (self.embedding_to_message_idx.len(), total_user)
    }

    /// Writes the current state to disk. Persistence failures are
    /// logged and swallowed; the conversation continues in memory.
    #[inline]
    pub fn persist(&self) {
        if let Err(e) = self.write_history() {
            warn!(
                "Failed to persist chat history to {}: {}",
                self.storage_path.display(),
                e
            );
        }
    }

    /// Replaces in-memory state with the stored history, re-embedding
    /// every user message to reconstruct the index. A missing artifact
    /// yields an empty store; an unreadable one is logged and treated
    /// the same way.
    #[inline]
    pub fn load(&mut self) {
        self.reset_in_memory();

        if let Err(e) = self.read_history() {
            warn!(
                "Failed to load chat history from {}, starting empty: {}",
                self.storage_path.display(),
                e
            );
            self.reset_in_memory();
        }
    }

    /// Empties the store and deletes the durable artifact. Idempotent
    /// when the artifact is already absent.
    #[inline]
    pub fn clear(&mut self) {
        self.reset_in_memory();

        match fs::remove_file(&self.storage_path) {
            Ok(()) => info!("Removed chat artifact {}", self.storage_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove chat artifact {}: {}",
                self.storage_path.display(),
                e
            ),
        }
    }

    fn write_history(&self) -> Result<()> {
        let history = ChatHistory {
            messages: self.messages.clone(),
            embedding_to_message_idx: self.embedding_to_message_idx.clone(),
        };

        history.write(&self.storage_path)
    }

    fn read_history(&mut self) -> Result<()> {
        if !self.storage_path.exists() {
            debug!("No stored history at {}", self.storage_path.display());
            return Ok(());
        }

        let history = ChatHistory::read(&self.storage_path)?;
        self.messages = history.messages;
        self.rebuild_embeddings();
        Ok(())
    }

    /// Re-derives vectors and the slot mapping from the message log in
    /// order. Messages the provider fails on are skipped from the index
    /// but stay in the log.
    fn rebuild_embeddings(&mut self) {
        self.embeddings.clear();
        self.embedding_to_message_idx.clear();

        for (idx, message) in self.messages.iter().enumerate() {
            if message.role != Role::User {
                continue;
            }

            match self.embedder.embed(&message.content) {
                Ok(vector) => {
                    if vector.len() == self.index.dimension() {
                        self.embeddings.push(vector);
                        self.embedding_to_message_idx.push(idx);
                    } else {
                        warn!(
                            "Skipping message {} during index rebuild: provider returned a {}-dimension vector, index expects {}",
                            idx,
                            vector.len(),
                            self.index.dimension()
                        );
                    }
                }
                Err(e) => {
                    warn!("Skipping message {} during index rebuild: {}", idx, e);
                }
            }
        }

        if let Err(e) = self.index.rebuild(&self.embeddings) {
            warn!("Failed to rebuild vector index: {}", e);
            self.index.clear();
        }

        let (indexed, total) = self.index_coverage();
        info!(
            "Rebuilt index for {}: {} of {} user messages indexed",
            self.storage_path.display(),
            indexed,
            total
        );
    }

    fn reset_in_memory(&mut self) {
        self.messages.clear();
        self.embeddings.clear();
        self.embedding_to_message_idx.clear();
        self.index.clear();
    }
}
