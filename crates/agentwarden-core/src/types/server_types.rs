//! Companion server catalog and runtime config types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment variables for one server, ordered for stable output
pub type EnvMap = BTreeMap<String, String>;

/// Caller supplied env overrides, keyed by server name
pub type ServerOverrides = BTreeMap<String, EnvMap>;

/// How a catalog server is packaged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackageSource {
    Npm {
        package: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Pypi {
        package: String,
    },
    Docker {
        image: String,
    },
    Binary {
        url: String,
    },
}

/// Structured catalog entry for one installable server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub description: Option<String>,
    /// Default env, lowest precedence
    #[serde(default)]
    pub env: EnvMap,
    #[serde(default)]
    pub packages: Vec<PackageSource>,
}

impl CatalogEntry {
    /// First npm packaging option, the only kind the agent can launch
    pub fn npm_package(&self) -> Option<(&str, &[String])> {
        self.packages.iter().find_map(|p| match p {
            PackageSource::Npm { package, args } => Some((package.as_str(), args.as_slice())),
            _ => None,
        })
    }
}

/// Launch instructions for one server as read by the agent tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: EnvMap,
}

/// Generated runtime config, rewritten whole on every install
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ServerSpec>,
}

impl RuntimeConfig {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Success,
    Failed,
}

/// Outcome of installing one requested server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstallationResult {
    pub server_name: String,
    pub status: InstallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerInstallationResult {
    pub fn success(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            status: InstallStatus::Success,
            error: None,
        }
    }

    pub fn failed(server_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            status: InstallStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == InstallStatus::Success
    }
}

/// A server the agent recommends for a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSuggestion {
    pub name: String,
    #[serde(default)]
    pub rationale: String,
}

/// Settings file written into every session directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub permissions: PermissionSettings,
    pub enable_all_project_mcp_servers: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSettings {
    pub deny: Vec<String>,
}

impl SessionSettings {
    pub fn new(deny: Vec<String>, auto_enable_servers: bool) -> Self {
        Self {
            permissions: PermissionSettings { deny },
            enable_all_project_mcp_servers: auto_enable_servers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_parses_tagged_packages() {
        let json = r#"{
            "description": "GitHub API",
            "env": {"GITHUB_HOST": "github.com"},
            "packages": [
                {"type": "pypi", "package": "mcp-github"},
                {"type": "npm", "package": "@modelcontextprotocol/server-github", "args": ["--stdio"]}
            ]
        }"#;

        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        let (package, args) = entry.npm_package().unwrap();
        assert_eq!(package, "@modelcontextprotocol/server-github");
        assert_eq!(args, ["--stdio".to_string()]);
    }

    #[test]
    fn test_catalog_entry_without_npm() {
        let entry = CatalogEntry {
            packages: vec![PackageSource::Docker {
                image: "ghcr.io/x/y".into(),
            }],
            ..Default::default()
        };
        assert!(entry.npm_package().is_none());
    }

    #[test]
    fn test_runtime_config_shape() {
        let mut config = RuntimeConfig::default();
        config.servers.insert(
            "fs".into(),
            ServerSpec {
                command: "npx".into(),
                args: vec!["-y".into(), "server-fs".into()],
                env: EnvMap::new(),
            },
        );
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["mcpServers"]["fs"]["command"], "npx");
    }

    #[test]
    fn test_settings_shape() {
        let settings = SessionSettings::new(vec!["Bash(sudo:*)".into()], true);
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["permissions"]["deny"][0], "Bash(sudo:*)");
        assert_eq!(json["enableAllProjectMcpServers"], true);
    }
}
