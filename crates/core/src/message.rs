use std::time::{SystemTime, UNIX_EPOCH};

use crate::ids::MessageId;

/// Wall-clock seconds since the unix epoch.
pub fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub created_at_unix_seconds: u64,
}

impl ChatMessage {
    /// Creates a message with an explicit id.
    pub fn with_id(id: MessageId, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at_unix_seconds: now_unix_seconds(),
        }
    }

    /// Creates a user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_id(MessageId::new(), ChatRole::User, content)
    }

    /// Creates an assistant message with a fresh id.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_id(MessageId::new(), ChatRole::Assistant, content)
    }
}
