use crate::error::{ConfigurationError, Error, Result};
use crate::storage::read_to_string;
use crate::types::{EnvMap, ServerOverrides};
use async_trait::async_trait;
use std::path::Path;

/// Per-server secrets, merged over every other env source at install time
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secrets_for(&self, server: &str) -> Result<EnvMap>;
}

/// Secrets held in memory, keyed by server name
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    servers: ServerOverrides,
}

impl StaticSecrets {
    pub fn new(servers: ServerOverrides) -> Self {
        Self { servers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a JSON object of `{server: {VAR: value}}`
    pub async fn from_file(path: &Path) -> Result<Self> {
        let contents = read_to_string(path).await?;
        let servers = serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(ConfigurationError::InvalidCatalog(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(Self { servers })
    }
}

#[async_trait]
impl SecretStore for StaticSecrets {
    async fn secrets_for(&self, server: &str) -> Result<EnvMap> {
        Ok(self.servers.get(server).cloned().unwrap_or_default())
    }
}
