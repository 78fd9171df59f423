//! Per-session on-disk state
//!
//! Each session owns one directory under the configured sessions root:
//!
//! ```text
//! <sessions_root>/<uuid>/
//! ├── .claude/settings.json   # capability deny-list, server auto-enable flag
//! ├── .mcp.json               # runtime server config, rewritten on install
//! ├── state.json              # AgentSession snapshot
//! ├── transcript.jsonl        # append-only turns
//! └── transcript.{md,json}    # rendered on demand
//! ```
//!
//! JSON snapshots are written to `<file>.tmp` and renamed into place. The
//! transcript is only ever appended to. Both assume a single writer per
//! session directory; `SessionManager` callers must serialize their calls.

mod state;
mod transcript;

pub use state::StateStore;
pub use transcript::{render_json, render_markdown, summarize, TranscriptLog};

use crate::error::{Error, Result, StorageError};
use crate::types::{RuntimeConfig, SessionSettings, TranscriptFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const SETTINGS_DIR: &str = ".claude";
pub const SETTINGS_FILE: &str = "settings.json";
pub const RUNTIME_CONFIG_FILE: &str = ".mcp.json";
pub const STATE_FILE: &str = "state.json";
pub const TRANSCRIPT_FILE: &str = "transcript.jsonl";
const RENDERED_TRANSCRIPT_STEM: &str = "transcript";

/// Paths and writers for one session directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWorkspace {
    root: PathBuf,
}

impl SessionWorkspace {
    /// Wrap an existing directory
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a fresh, uniquely named directory under `sessions_root`
    pub async fn create(sessions_root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(sessions_root)
            .await
            .map_err(|e| create_dir_error(sessions_root, e))?;

        let root = sessions_root.join(Uuid::new_v4().to_string());
        // create_dir (not _all) so an existing directory is never adopted
        tokio::fs::create_dir(&root)
            .await
            .map_err(|e| create_dir_error(&root, e))?;
        let settings_dir = root.join(SETTINGS_DIR);
        tokio::fs::create_dir(&settings_dir)
            .await
            .map_err(|e| create_dir_error(&settings_dir, e))?;

        info!("Created session directory: {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_DIR).join(SETTINGS_FILE)
    }

    pub fn runtime_config_path(&self) -> PathBuf {
        self.root.join(RUNTIME_CONFIG_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.root.join(TRANSCRIPT_FILE)
    }

    pub fn rendered_transcript_path(&self, format: TranscriptFormat) -> PathBuf {
        self.root
            .join(format!("{}.{}", RENDERED_TRANSCRIPT_STEM, format.extension()))
    }

    pub async fn write_settings(&self, settings: &SessionSettings) -> Result<()> {
        write_json_atomic(&self.settings_path(), settings).await
    }

    /// Replace the runtime config wholesale
    pub async fn write_runtime_config(&self, config: &RuntimeConfig) -> Result<PathBuf> {
        let path = self.runtime_config_path();
        write_json_atomic(&path, config).await?;
        debug!(
            "Wrote runtime config with {} server(s) to {:?}",
            config.servers.len(),
            path
        );
        Ok(path)
    }

    pub async fn read_runtime_config(&self) -> Result<RuntimeConfig> {
        let path = self.runtime_config_path();
        let contents = read_to_string(&path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Overwrite the rendered transcript artifact for `format`
    pub async fn write_rendered_transcript(
        &self,
        format: TranscriptFormat,
        contents: &str,
    ) -> Result<PathBuf> {
        let path = self.rendered_transcript_path(format);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| write_error(&path, e))?;
        Ok(path)
    }
}

fn create_dir_error(path: &Path, source: std::io::Error) -> Error {
    Error::Storage(StorageError::CreateDirectory {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn write_error(path: &Path, source: std::io::Error) -> Error {
    Error::Storage(StorageError::Write {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) async fn read_to_string(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Storage(StorageError::Read {
            path: path.display().to_string(),
            source: e,
        })
    })
}

/// Write `value` as pretty JSON via `<path>.tmp` and rename
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, json)
        .await
        .map_err(|e| write_error(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| write_error(path, e))?;
    Ok(())
}
