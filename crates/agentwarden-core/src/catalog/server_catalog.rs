//! Companion server catalogs

use crate::error::{ConfigurationError, Error, Result};
use crate::storage::read_to_string;
use crate::types::CatalogEntry;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Source of installable companion servers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerCatalog: Send + Sync {
    /// Human maintained list of trusted servers with rationale, as prose
    async fn trusted_servers_document(&self) -> Result<String>;

    /// Structured entry for `name`
    async fn lookup(&self, name: &str) -> Result<Option<CatalogEntry>>;
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    servers: BTreeMap<String, CatalogEntry>,
}

/// Catalog read from disk on every call
///
/// `catalog_path` is JSON (`{"servers": {name: entry}}`), `trusted_path` is
/// free text (usually markdown). A missing path behaves as an empty catalog.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    catalog_path: Option<PathBuf>,
    trusted_path: Option<PathBuf>,
}

impl FileCatalog {
    pub fn new(catalog_path: Option<PathBuf>, trusted_path: Option<PathBuf>) -> Self {
        Self {
            catalog_path,
            trusted_path,
        }
    }

    async fn load(&self) -> Result<CatalogFile> {
        let Some(path) = &self.catalog_path else {
            return Ok(CatalogFile::default());
        };
        let contents = read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(ConfigurationError::InvalidCatalog(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })
    }
}

#[async_trait]
impl ServerCatalog for FileCatalog {
    async fn trusted_servers_document(&self) -> Result<String> {
        let Some(path) = &self.trusted_path else {
            return Ok(String::new());
        };
        debug!("Reading trusted servers from {:?}", path);
        read_to_string(path).await
    }

    async fn lookup(&self, name: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.load().await?.servers.remove(name))
    }
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    trusted: String,
    servers: BTreeMap<String, CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(trusted: impl Into<String>) -> Self {
        Self {
            trusted: trusted.into(),
            servers: BTreeMap::new(),
        }
    }

    pub fn with_server(mut self, name: impl Into<String>, entry: CatalogEntry) -> Self {
        self.servers.insert(name.into(), entry);
        self
    }
}

#[async_trait]
impl ServerCatalog for StaticCatalog {
    async fn trusted_servers_document(&self) -> Result<String> {
        Ok(self.trusted.clone())
    }

    async fn lookup(&self, name: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.servers.get(name).cloned())
    }
}
