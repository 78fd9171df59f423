//! Resolution of requested server names into a runtime config

use super::{SecretStore, ServerCatalog};
use crate::error::{ConfigurationError, Error, Result};
use crate::types::{
    CatalogEntry, EnvMap, RuntimeConfig, ServerInstallationResult, ServerOverrides, ServerSpec,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NPM_RUNNER: &str = "npx";

/// Resolves server names against a catalog and layers env sources
pub struct ServerInstaller {
    catalog: Arc<dyn ServerCatalog>,
    secrets: Arc<dyn SecretStore>,
}

impl ServerInstaller {
    pub fn new(catalog: Arc<dyn ServerCatalog>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { catalog, secrets }
    }

    /// Resolve every name in `names`
    ///
    /// Returns one record per distinct requested name (in request order) and
    /// a config holding only the servers that resolved. Per-server failures
    /// are reported in the records, never as an `Err`.
    pub async fn install(
        &self,
        names: &[String],
        overrides: &ServerOverrides,
    ) -> (Vec<ServerInstallationResult>, RuntimeConfig) {
        let mut seen = BTreeSet::new();
        let mut results = Vec::with_capacity(names.len());
        let mut config = RuntimeConfig::default();

        for name in names {
            if !seen.insert(name.as_str()) {
                debug!("Skipping duplicate server request: {}", name);
                continue;
            }

            match self.resolve(name, overrides.get(name)).await {
                Ok(spec) => {
                    debug!("Resolved server {} -> {} {:?}", name, spec.command, spec.args);
                    config.servers.insert(name.clone(), spec);
                    results.push(ServerInstallationResult::success(name.as_str()));
                }
                Err(e) => {
                    warn!("Failed to install server {}: {}", name, e);
                    results.push(ServerInstallationResult::failed(
                        name.as_str(),
                        failure_message(&e),
                    ));
                }
            }
        }

        info!(
            "Resolved {} of {} requested server(s)",
            config.servers.len(),
            results.len()
        );
        (results, config)
    }

    async fn resolve(&self, name: &str, overrides: Option<&EnvMap>) -> Result<ServerSpec> {
        let entry = self
            .catalog
            .lookup(name)
            .await?
            .ok_or_else(|| ConfigurationError::ServerNotFound(name.to_string()))?;
        let secrets = self.secrets.secrets_for(name).await?;
        npm_spec(name, &entry, overrides, &secrets)
    }
}

fn npm_spec(
    name: &str,
    entry: &CatalogEntry,
    overrides: Option<&EnvMap>,
    secrets: &EnvMap,
) -> Result<ServerSpec> {
    let (package, extra) = entry
        .npm_package()
        .ok_or_else(|| ConfigurationError::UnsupportedPackaging(name.to_string()))?;

    let mut args = Vec::with_capacity(extra.len() + 2);
    args.push("-y".to_string());
    args.push(package.to_string());
    args.extend(extra.iter().cloned());

    Ok(ServerSpec {
        command: NPM_RUNNER.to_string(),
        args,
        env: resolve_env(&entry.env, overrides, secrets),
    })
}

/// Layer env sources; later layers win: catalog < overrides < secrets
pub fn resolve_env(defaults: &EnvMap, overrides: Option<&EnvMap>, secrets: &EnvMap) -> EnvMap {
    let mut env = defaults.clone();
    if let Some(overrides) = overrides {
        env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    env.extend(secrets.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Record text; configuration failures use their fixed wording
fn failure_message(error: &Error) -> String {
    match error {
        Error::Configuration(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockSecretStore, MockServerCatalog, StaticCatalog, StaticSecrets};
    use crate::types::{InstallStatus, PackageSource};
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn npm_entry(package: &str, defaults: EnvMap) -> CatalogEntry {
        CatalogEntry {
            description: None,
            env: defaults,
            packages: vec![PackageSource::Npm {
                package: package.into(),
                args: vec![],
            }],
        }
    }

    #[test]
    fn test_secrets_take_precedence() {
        let resolved = resolve_env(
            &env(&[("A", "1")]),
            Some(&env(&[("A", "2"), ("B", "3")])),
            &env(&[("A", "9")]),
        );
        assert_eq!(resolved, env(&[("A", "9"), ("B", "3")]));
    }

    #[test]
    fn test_overrides_beat_defaults() {
        let resolved = resolve_env(&env(&[("A", "1"), ("C", "4")]), Some(&env(&[("A", "2")])), &EnvMap::new());
        assert_eq!(resolved, env(&[("A", "2"), ("C", "4")]));
    }

    #[tokio::test]
    async fn test_install_builds_npx_spec() {
        let catalog = StaticCatalog::new("").with_server(
            "github",
            CatalogEntry {
                description: Some("GitHub".into()),
                env: env(&[("A", "1")]),
                packages: vec![
                    PackageSource::Docker { image: "gh".into() },
                    PackageSource::Npm {
                        package: "@modelcontextprotocol/server-github".into(),
                        args: vec!["--stdio".into()],
                    },
                ],
            },
        );
        let mut secrets = ServerOverrides::new();
        secrets.insert("github".into(), env(&[("A", "9")]));
        let installer = ServerInstaller::new(Arc::new(catalog), Arc::new(StaticSecrets::new(secrets)));

        let mut overrides = ServerOverrides::new();
        overrides.insert("github".into(), env(&[("A", "2"), ("B", "3")]));
        let (results, config) = installer.install(&["github".to_string()], &overrides).await;

        assert_eq!(results, vec![ServerInstallationResult::success("github")]);
        let spec = &config.servers["github"];
        assert_eq!(spec.command, "npx");
        assert_eq!(
            spec.args,
            vec!["-y", "@modelcontextprotocol/server-github", "--stdio"]
        );
        assert_eq!(spec.env, env(&[("A", "9"), ("B", "3")]));
    }

    #[tokio::test]
    async fn test_unknown_server_is_recorded() {
        let catalog = StaticCatalog::new("").with_server("fs", npm_entry("server-fs", EnvMap::new()));
        let installer = ServerInstaller::new(Arc::new(catalog), Arc::new(StaticSecrets::empty()));

        let names = vec!["ghost".to_string(), "fs".to_string()];
        let (results, config) = installer.install(&names, &ServerOverrides::new()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, InstallStatus::Failed);
        assert_eq!(
            results[0].error.as_deref(),
            Some("Server configuration not found")
        );
        assert!(results[1].succeeded());
        assert_eq!(config.servers.keys().collect::<Vec<_>>(), vec!["fs"]);
    }

    #[tokio::test]
    async fn test_non_npm_server_is_recorded() {
        let catalog = StaticCatalog::new("").with_server(
            "py",
            CatalogEntry {
                packages: vec![PackageSource::Pypi {
                    package: "mcp-py".into(),
                }],
                ..Default::default()
            },
        );
        let installer = ServerInstaller::new(Arc::new(catalog), Arc::new(StaticSecrets::empty()));

        let (results, config) = installer
            .install(&["py".to_string()], &ServerOverrides::new())
            .await;

        assert_eq!(
            results[0].error.as_deref(),
            Some("No npm package found for server")
        );
        assert!(config.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_resolve_once() {
        let mut catalog = MockServerCatalog::new();
        catalog
            .expect_lookup()
            .times(1)
            .returning(|_| Ok(Some(npm_entry("server-fs", EnvMap::new()))));
        let mut secrets = MockSecretStore::new();
        secrets.expect_secrets_for().times(1).returning(|_| Ok(EnvMap::new()));
        let installer = ServerInstaller::new(Arc::new(catalog), Arc::new(secrets));

        let names = vec!["fs".to_string(), "fs".to_string()];
        let (results, _) = installer.install(&names, &ServerOverrides::new()).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_secret_store_failure_fails_only_that_server() {
        let catalog = StaticCatalog::new("")
            .with_server("a", npm_entry("server-a", EnvMap::new()))
            .with_server("b", npm_entry("server-b", EnvMap::new()));
        let mut secrets = MockSecretStore::new();
        secrets.expect_secrets_for().returning(|server| {
            if server == "a" {
                Err(Error::Configuration(ConfigurationError::InvalidCatalog(
                    "vault sealed".into(),
                )))
            } else {
                Ok(EnvMap::new())
            }
        });
        let installer = ServerInstaller::new(Arc::new(catalog), Arc::new(secrets));

        let names = vec!["a".to_string(), "b".to_string()];
        let (results, config) = installer.install(&names, &ServerOverrides::new()).await;

        assert!(!results[0].succeeded());
        assert!(results[0].error.as_deref().unwrap().contains("vault sealed"));
        assert!(results[1].succeeded());
        assert_eq!(config.servers.len(), 1);
    }
}
