//! Transcript message types
//!
//! The transcript is the only memory the language model has of a session;
//! entries are append-only and insertion order is significant.

use serde::{Deserialize, Serialize};
use sessionstore::now_ms;

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One role-tagged entry in a session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl TranscriptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: now_ms(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: now_ms(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            created_at: now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_tag_roles() {
        assert_eq!(TranscriptMessage::user("hi").role, Role::User);
        assert_eq!(TranscriptMessage::assistant("hello").role, Role::Assistant);
        assert_eq!(TranscriptMessage::system("note").role, Role::System);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = TranscriptMessage::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
