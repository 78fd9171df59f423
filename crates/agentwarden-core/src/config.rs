//! Manager configuration
//!
//! Loaded from a camelCase JSON file; every field has a default so an absent
//! or partial file is valid. A handful of environment variables override the
//! file for deployments that only set env.

use crate::error::{Error, Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_CLI: &str = "AGENTWARDEN_CLI";
pub const ENV_SESSIONS_ROOT: &str = "AGENTWARDEN_SESSIONS_ROOT";
pub const ENV_CATALOG: &str = "AGENTWARDEN_CATALOG";
pub const ENV_TRUSTED_SERVERS: &str = "AGENTWARDEN_TRUSTED_SERVERS";
pub const ENV_SECRETS: &str = "AGENTWARDEN_SECRETS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    /// Agent CLI executable
    pub cli_command: String,
    /// Parent of every per-session working directory
    pub sessions_root: PathBuf,
    /// Structured server catalog (name -> packaging)
    pub catalog_path: Option<PathBuf>,
    /// Human maintained list of trusted servers with rationale
    pub trusted_servers_path: Option<PathBuf>,
    pub secrets_path: Option<PathBuf>,
    pub init_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub chat_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub chat_max_turns: Option<u32>,
    pub skip_permissions: bool,
    /// Capability deny-list written into each session's settings
    pub denied_tools: Vec<String>,
    pub auto_enable_servers: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cli_command: "claude".to_string(),
            sessions_root: Self::default_sessions_root(),
            catalog_path: None,
            trusted_servers_path: None,
            secrets_path: None,
            init_timeout_ms: 30_000,
            command_timeout_ms: 60_000,
            chat_timeout_ms: 300_000,
            shutdown_grace_ms: 5_000,
            chat_max_turns: None,
            skip_permissions: false,
            denied_tools: vec![
                "Bash(rm -rf:*)".to_string(),
                "Bash(sudo:*)".to_string(),
                "Bash(chmod:*)".to_string(),
                "Bash(chown:*)".to_string(),
            ],
            auto_enable_servers: true,
        }
    }
}

impl ManagerConfig {
    fn default_sessions_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("agentwarden")
            .join("sessions")
    }

    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Storage(StorageError::Read {
                path: path.display().to_string(),
                source: e,
            })
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply `AGENTWARDEN_*` environment overrides
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(cli) = lookup(ENV_CLI) {
            self.cli_command = cli;
        }
        if let Some(root) = lookup(ENV_SESSIONS_ROOT) {
            self.sessions_root = PathBuf::from(root);
        }
        if let Some(path) = lookup(ENV_CATALOG) {
            self.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_TRUSTED_SERVERS) {
            self.trusted_servers_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_SECRETS) {
            self.secrets_path = Some(PathBuf::from(path));
        }
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_documented_timeouts() {
        let config = ManagerConfig::default();
        assert_eq!(config.init_timeout(), Duration::from_secs(30));
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.chat_timeout(), Duration::from_secs(300));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert!(config.auto_enable_servers);
        assert!(!config.denied_tools.is_empty());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ManagerConfig::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cliCommand": "/opt/agent", "chatTimeoutMs": 1000}"#).unwrap();

        let config = ManagerConfig::load(&path).unwrap();
        assert_eq!(config.cli_command, "/opt/agent");
        assert_eq!(config.chat_timeout_ms, 1000);
        assert_eq!(config.init_timeout_ms, 30_000);
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(ManagerConfig::load(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CLI, "agent-bin"),
            (ENV_SESSIONS_ROOT, "/var/sessions"),
            (ENV_SECRETS, ""),
        ]
        .into_iter()
        .collect();

        let mut config = ManagerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.cli_command, "agent-bin");
        assert_eq!(config.sessions_root, PathBuf::from("/var/sessions"));
        assert_eq!(config.secrets_path, None);
    }
}
