//! Durable session snapshot

use super::{read_to_string, write_json_atomic, SessionWorkspace};
use crate::error::Result;
use crate::types::AgentSession;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Full-file snapshot of one `AgentSession`
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(workspace: &SessionWorkspace) -> Self {
        Self {
            path: workspace.state_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, session: &AgentSession) -> Result<()> {
        trace!("Saving session {} to {:?}", session.session_id, self.path);
        write_json_atomic(&self.path, session).await
    }

    /// `None` when no snapshot has been written yet
    pub async fn load(&self) -> Result<Option<AgentSession>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }
        let contents = read_to_string(&self.path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}
