//! Chat data model: message log entries, prompt entries, the durable
//! history format, and the trigger-token convention for user input.

#[cfg(test)]
mod tests;

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::{ChatError, Result};

/// Token that routes a message through the retrieval pipeline when it
/// appears at the start of the input. Matched case-insensitively.
pub const TRIGGER_TOKEN: &str = "@ai";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a prompt sequence sent to the completion model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// One entry of the conversation log. `context` is only present on
/// assistant messages and holds the exact prompt sequence that produced
/// the reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub context: Option<Vec<PromptMessage>>,
}

impl ChatMessage {
    #[inline]
    pub fn new(role: Role, content: String, context: Option<Vec<PromptMessage>>) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            context,
        }
    }
}

/// On-disk schema of a chat. Vectors are never stored; they are
/// re-derived from message contents on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
    pub embedding_to_message_idx: Vec<usize>,
}

impl ChatHistory {
    #[inline]
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ChatError::Persistence(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ChatError::Persistence(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    #[inline]
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ChatError::Persistence(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ChatError::Persistence(format!("failed to serialize chat: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            ChatError::Persistence(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

/// How a line of user input should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDirective<'a> {
    /// The trigger token with no question after it. Rejected without
    /// storing anything.
    BareTrigger,
    /// The trigger token followed by a question for the model.
    Ask(&'a str),
    /// An ordinary message, stored without invoking retrieval.
    Plain,
}

/// Classifies a line of input against the trigger-token convention.
/// The returned query borrows from `input` with surrounding whitespace
/// removed; the caller stores the full original text regardless.
#[inline]
pub fn parse_directive(input: &str) -> InputDirective<'_> {
    let trimmed = input.trim();

    match strip_trigger(trimmed) {
        Some(rest) => {
            let query = rest.trim_start();
            if query.is_empty() {
                InputDirective::BareTrigger
            } else {
                InputDirective::Ask(query)
            }
        }
        None => InputDirective::Plain,
    }
}

fn strip_trigger(input: &str) -> Option<&str> {
    let mut chars = input.char_indices();

    for expected in TRIGGER_TOKEN.chars() {
        let (_, actual) = chars.next()?;
        if !actual.eq_ignore_ascii_case(&expected) {
            return None;
        }
    }

    chars.next().map_or(Some(""), |(idx, _)| input.get(idx..))
}
