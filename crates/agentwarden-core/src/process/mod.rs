//! Agent CLI process management
//!
//! This module handles:
//! - Building CLI arguments for one non-interactive turn
//! - Spawning the CLI with a deadline and capturing its output
//! - Terminating an in-flight invocation (terminate, grace, kill)

mod command;
pub mod handle;
pub mod invoker;
mod shutdown;

pub use command::AgentCommand;
pub use handle::{ProcessHandle, Terminable};
pub use invoker::{CliInvoker, InvocationRequest, ProcessInvoker};
pub use shutdown::{ShutdownController, ShutdownPhase};
