//! Companion server catalog, secrets and installation

mod installer;
mod secrets;
mod server_catalog;

pub use installer::{resolve_env, ServerInstaller};
pub use secrets::{SecretStore, StaticSecrets};
pub use server_catalog::{FileCatalog, ServerCatalog, StaticCatalog};

#[cfg(test)]
pub use secrets::MockSecretStore;
#[cfg(test)]
pub use server_catalog::MockServerCatalog;
