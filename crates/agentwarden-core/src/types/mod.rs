//! Core type definitions for Agentwarden
//!
//! Session and transcript records, companion server catalog and runtime
//! config types, and the results returned by `SessionManager` operations.

mod result_types;
mod server_types;
mod session_types;

pub use result_types::*;
pub use server_types::*;
pub use session_types::*;
