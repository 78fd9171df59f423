//! Append-only conversation transcript
//!
//! One JSON object per line in `transcript.jsonl`. Entries are never
//! rewritten; each append is a single write to a file opened in append mode.

use super::{read_to_string, write_error, SessionWorkspace};
use crate::error::{Error, Result, StorageError};
use crate::types::{TranscriptEntry, TranscriptSummary};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct TranscriptLog {
    path: PathBuf,
}

impl TranscriptLog {
    pub fn new(workspace: &SessionWorkspace) -> Self {
        Self {
            path: workspace.transcript_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty transcript, truncating any previous one
    pub async fn create(&self) -> Result<()> {
        tokio::fs::write(&self.path, b"")
            .await
            .map_err(|e| write_error(&self.path, e))
    }

    pub async fn append(&self, entry: &TranscriptEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| write_error(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| write_error(&self.path, e))?;
        file.flush().await.map_err(|e| write_error(&self.path, e))?;
        Ok(())
    }

    /// All entries in append order. A missing file is an empty transcript.
    pub async fn entries(&self) -> Result<Vec<TranscriptEntry>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let contents = read_to_string(&self.path).await?;
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    Error::Storage(StorageError::Corrupt {
                        path: format!("{}:{}", self.path.display(), n + 1),
                        reason: e.to_string(),
                    })
                })
            })
            .collect()
    }
}

/// One `##` section per entry, metadata as a bullet list
pub fn render_markdown(entries: &[TranscriptEntry]) -> String {
    let mut out = String::from("# Transcript\n");

    for entry in entries {
        let _ = write!(
            out,
            "\n## {} ({})\n\n{}\n",
            entry.role.label(),
            entry.timestamp.to_rfc3339(),
            entry.content.trim_end()
        );

        let meta = &entry.metadata;
        if meta.is_empty() {
            continue;
        }
        out.push('\n');
        if let Some(tokens) = meta.tokens_used {
            let _ = writeln!(out, "- Tokens used: {}", tokens);
        }
        if let Some(duration) = meta.duration_ms {
            let _ = writeln!(out, "- Duration: {}ms", duration);
        }
        if !meta.tool_calls.is_empty() {
            out.push_str("- Tool calls:\n");
            for call in &meta.tool_calls {
                let _ = writeln!(out, "  - {}", call);
            }
        }
    }

    out
}

pub fn render_json(entries: &[TranscriptEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// Count and last timestamp; an empty transcript reports now
pub fn summarize(entries: &[TranscriptEntry]) -> TranscriptSummary {
    TranscriptSummary {
        message_count: entries.len(),
        last_updated: entries
            .last()
            .map(|e| e.timestamp)
            .unwrap_or_else(Utc::now),
    }
}
