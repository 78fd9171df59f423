//! Results returned by the public `SessionManager` operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{AgentSession, ServerInstallationResult, ServerSuggestion, SessionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
    pub session_id: String,
    pub status: SessionStatus,
    /// Path of the persisted state snapshot
    pub state_handle: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindServersResult {
    pub servers: Vec<ServerSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallServersResult {
    pub installations: Vec<ServerInstallationResult>,
    /// Path of the rewritten runtime config
    pub config_handle: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub response: String,
    pub metadata: ChatMetadata,
}

/// Rendering used by `inspect_transcript`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    #[default]
    Markdown,
    Json,
}

impl TranscriptFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Markdown => "md",
            TranscriptFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for TranscriptFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown transcript format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSummary {
    pub message_count: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResult {
    /// Path of the rendered artifact
    pub transcript_handle: PathBuf,
    pub metadata: TranscriptSummary,
}

/// Terminal outcome of `stop_agent`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Stopped,
    ForceKilled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResult {
    pub status: StopStatus,
    /// Last in-memory snapshot of the session that was stopped
    pub final_state: Option<AgentSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
