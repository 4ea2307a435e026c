//! Durable catalog of conversations.
//!
//! `chats.json` records chat identity only: id, display name, and
//! creation time. Message content lives in the per-chat artifacts under
//! `chats/`, owned by [`ConversationStore`].


use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::store::ConversationStore;
use crate::config::Config;
use crate::providers::EmbeddingProvider;
use crate::{ChatError, Result};

/// One registered conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    chats: Vec<ChatEntry>,
}

/// The set of known chats plus lazily opened stores for the ones in
/// use this run.
pub struct SessionRegistry {
    chats_dir: PathBuf,
    registry_path: PathBuf,
    entries: Vec<ChatEntry>,
    sessions: HashMap<Uuid, ConversationStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for SessionRegistry {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("chats_dir", &self.chats_dir)
            .field("registry_path", &self.registry_path)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Opens the registry under the configured base directory. A
    /// missing registry file means no chats yet, not an error.
    #[inline]
    pub fn open(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let chats_dir = config.chats_dir()?;
        let registry_path = config.registry_path()?;

        let entries = if registry_path.exists() {
            let content = fs::read_to_string(&registry_path).map_err(|e| {
                ChatError::Persistence(format!(
                    "failed to read {}: {}",
                    registry_path.display(),
                    e
                ))
            })?;

            let file: RegistryFile = serde_json::from_str(&content).map_err(|e| {
                ChatError::Persistence(format!(
                    "failed to parse {}: {}",
                    registry_path.display(),
                    e
                ))
            })?;
            file.chats
        } else {
            Vec::new()
        };

        debug!("Opened chat registry with {} entries", entries.len());

        Ok(Self {
            chats_dir,
            registry_path,
            entries,
            sessions: HashMap::new(),
            embedder,
        })
    }

    #[inline]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Registers a new chat and returns its id. Without an explicit
    /// name the chat is numbered after the current registry size.
    #[inline]
    pub fn create_chat(&mut self, name: Option<String>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let name = name.unwrap_or_else(|| format!("Chat {}", self.entries.len() + 1));

        self.entries.push(ChatEntry {
            id,
            name,
            created_at: Utc::now(),
        });
        self.save_registry()?;

        info!("Created chat {}", id);
        Ok(id)
    }

    #[inline]
    pub fn rename_chat(&mut self, id: Uuid, name: String) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| ChatError::Persistence(format!("chat {} is not registered", id)))?;

        entry.name = name;
        self.save_registry()?;
        Ok(())
    }

    /// Drops a chat from the registry and removes its artifact. The
    /// registry stays consistent even if the artifact was already gone.
    #[inline]
    pub fn delete_chat(&mut self, id: Uuid) -> Result<()> {
        if !self.entries.iter().any(|entry| entry.id == id) {
            return Err(ChatError::Persistence(format!(
                "chat {} is not registered",
                id
            )));
        }

        self.sessions.remove(&id);

        let path = self.chat_path(id);
        match fs::remove_file(&path) {
            Ok(()) => info!("Removed chat artifact {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }

        self.entries.retain(|entry| entry.id != id);
        self.save_registry()?;

        info!("Deleted chat {}", id);
        Ok(())
    }

    /// Resolves a user-supplied identifier to a registry entry: an
    /// exact id first, then the first case-insensitive name match.
    #[inline]
    pub fn find_entry(&self, query: &str) -> Option<&ChatEntry> {
        if let Ok(id) = query.parse::<Uuid>() {
            return self.entries.iter().find(|entry| entry.id == id);
        }

        self.entries
            .iter()
            .find(|entry| entry.name.to_lowercase().contains(&query.to_lowercase()))
    }

    /// Returns the store for a registered chat, opening it on first
    /// use. Opening replays the artifact and re-embeds its messages.
    #[inline]
    pub fn session(&mut self, id: Uuid) -> Result<&mut ConversationStore> {
        if !self.entries.iter().any(|entry| entry.id == id) {
            return Err(ChatError::Persistence(format!(
                "chat {} is not registered",
                id
            )));
        }

        let path = self.chat_path(id);
        let store = self
            .sessions
            .entry(id)
            .or_insert_with(|| ConversationStore::open(path, Arc::clone(&self.embedder)));
        Ok(store)
    }

    /// Artifact location for a chat id.
    #[inline]
    pub fn chat_path(&self, id: Uuid) -> PathBuf {
        self.chats_dir.join(format!("chat_{}.json", id))
    }

    fn save_registry(&self) -> Result<()> {
        if let Some(parent) = self.registry_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ChatError::Persistence(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let file = RegistryFile {
            chats: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| ChatError::Persistence(format!("failed to serialize registry: {}", e)))?;

        fs::write(&self.registry_path, content).map_err(|e| {
            ChatError::Persistence(format!(
                "failed to write {}: {}",
                self.registry_path.display(),
                e
            ))
        })
    }
}
