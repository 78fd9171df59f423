//! Agentwarden Core Library
//!
//! This crate drives an external command-line AI agent on behalf of a host
//! application:
//! - One live agent session at a time, continued across invocations by id
//! - Durable session snapshot and append-only transcript per session
//! - Companion server discovery and runtime config generation
//! - Graceful-then-forceful shutdown of in-flight invocations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     agentwarden-core                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  manager.rs    - SessionManager, the public operations      │
//! │  process/      - CLI invocation, process handle, shutdown   │
//! │  storage/      - Session directory, state, transcript       │
//! │  catalog/      - Server catalog, secrets, installer         │
//! │  parse.rs      - Agent output parsing                       │
//! │  config.rs     - ManagerConfig                              │
//! │  types/        - Shared type definitions                    │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod manager;
pub mod parse;
pub mod process;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

pub use catalog::{FileCatalog, SecretStore, ServerCatalog, StaticCatalog, StaticSecrets};
pub use config::ManagerConfig;
pub use manager::SessionManager;
pub use process::{CliInvoker, ProcessInvoker, ShutdownController};
pub use storage::SessionWorkspace;
