//! Session and transcript types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Session status. Only ever moves `Idle -> Working -> Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the next operation
    Idle,
    /// A chat turn is in flight
    Working,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// The single live agent session owned by a `SessionManager`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSession {
    /// Issued by the CLI tool, or generated locally when its output was unreadable
    pub session_id: String,
    pub status: SessionStatus,
    pub system_prompt: String,
    /// Ordered, duplicate free
    pub installed_servers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub working_directory: PathBuf,
}

impl AgentSession {
    pub fn new(
        session_id: impl Into<String>,
        system_prompt: impl Into<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Idle,
            system_prompt: system_prompt.into(),
            installed_servers: Vec::new(),
            created_at: now,
            last_active_at: now,
            working_directory: working_directory.into(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Optional per-turn details
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<String>,
}

impl EntryMetadata {
    pub fn is_empty(&self) -> bool {
        self.tokens_used.is_none() && self.duration_ms.is_none() && self.tool_calls.is_empty()
    }
}

/// One conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "EntryMetadata::is_empty")]
    pub metadata: EntryMetadata,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: EntryMetadata::default(),
        }
    }

    pub fn assistant(content: impl Into<String>, metadata: EntryMetadata) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = AgentSession::new("s-1", "prompt", "/tmp/s-1");
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.installed_servers.is_empty());
        assert_eq!(session.created_at, session.last_active_at);
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = AgentSession::new("s-1", "prompt", "/tmp/s-1");
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["status"], "idle");
        assert!(json.get("installedServers").is_some());
    }

    #[test]
    fn test_empty_metadata_is_omitted() {
        let entry = TranscriptEntry::user("hi");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("metadata"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_metadata_roundtrip_keeps_tokens() {
        let entry = TranscriptEntry::assistant(
            "done",
            EntryMetadata {
                tokens_used: Some(42),
                ..Default::default()
            },
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"tokensUsed\":42"));
        let back: TranscriptEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.tokens_used, Some(42));
    }
}
