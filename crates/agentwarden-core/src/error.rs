//! Error types for Agentwarden Core

use thiserror::Error;

/// Main error type for Agentwarden operations
#[derive(Error, Debug)]
pub enum Error {
    /// A process failure surfaced by a named public operation
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: ProcessError,
    },

    #[error("Agent initialization failed: {0}")]
    Initialization(#[source] ProcessError),

    #[error("No live agent session: {0} requires init_agent first")]
    Precondition(&'static str),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a process failure with the name of the operation that caused it
    pub fn operation(operation: &'static str, source: ProcessError) -> Self {
        Self::Operation { operation, source }
    }

    /// The underlying process failure, however it was wrapped
    pub fn process_error(&self) -> Option<&ProcessError> {
        match self {
            Error::Initialization(e) => Some(e),
            Error::Operation { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.process_error(), Some(ProcessError::Timeout { .. }))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}

/// Failures of a single external CLI invocation
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Deadline exceeded; the process was killed. Output up to that point is kept.
    #[error("Process timed out after {timeout_ms}ms")]
    Timeout {
        timeout_ms: u64,
        stdout: String,
        stderr: String,
    },

    /// `code` is `None` when the process was terminated by a signal
    #[error("Process exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Failed to capture {0}")]
    Capture(&'static str),

    #[error("Failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

/// Agent output that did not match the expected envelope
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field in agent output: {0}")]
    MissingField(&'static str),

    #[error("Unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// Companion server configuration problems
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Server configuration not found")]
    ServerNotFound(String),

    #[error("No npm package found for server")]
    UnsupportedPackaging(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

/// On-disk persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create session directory {path}: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record in {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
