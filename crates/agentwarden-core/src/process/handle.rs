//! Handle to an in-flight agent process
//!
//! The invoker owns the `tokio::process::Child`; everything else talks to the
//! process through a [`ProcessHandle`], which can signal it and observe its exit
//! without holding the child itself.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::debug;

/// Something that can be asked to stop
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Terminable: Send + Sync {
    /// OS process id, when known
    fn pid(&self) -> Option<u32>;

    /// Ask the process to exit (SIGTERM on Unix)
    fn terminate(&self) -> std::io::Result<()>;

    /// Kill the process immediately
    fn kill(&self) -> std::io::Result<()>;

    /// Wait up to `within` for the process to exit. Returns true if it did.
    async fn wait_exit(&self, within: Duration) -> bool;
}

/// Shared view of a running child process
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: u64,
    pid: Option<u32>,
    exited: watch::Receiver<bool>,
    kill_requested: Notify,
}

/// Invoker side of a handle; flips the handle to exited
pub struct ExitNotifier {
    tx: watch::Sender<bool>,
}

impl ExitNotifier {
    pub fn mark_exited(&self) {
        let _ = self.tx.send(true);
    }
}

impl ProcessHandle {
    pub fn new(id: u64, pid: Option<u32>) -> (Self, ExitNotifier) {
        let (tx, rx) = watch::channel(false);
        let handle = Self {
            inner: Arc::new(HandleInner {
                id,
                pid,
                exited: rx,
                kill_requested: Notify::new(),
            }),
        };
        (handle, ExitNotifier { tx })
    }

    /// Invocation sequence number, unique per invoker
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn has_exited(&self) -> bool {
        *self.inner.exited.borrow()
    }

    /// Resolves once somebody calls [`Terminable::kill`]
    pub async fn kill_requested(&self) {
        self.inner.kill_requested.notified().await
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> std::io::Result<()> {
        let Some(pid) = self.inner.pid else {
            return Ok(());
        };
        if self.has_exited() {
            return Ok(());
        }

        debug!("Sending signal {} to pid {}", signal, pid);
        let ret = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if ret == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // Already gone
            Ok(())
        } else {
            Err(err)
        }
    }
}

#[async_trait]
impl Terminable for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    #[cfg(unix)]
    fn terminate(&self) -> std::io::Result<()> {
        self.signal(libc::SIGTERM)
    }

    #[cfg(not(unix))]
    fn terminate(&self) -> std::io::Result<()> {
        self.kill()
    }

    fn kill(&self) -> std::io::Result<()> {
        if !self.has_exited() {
            debug!("Kill requested for invocation {}", self.inner.id);
            self.inner.kill_requested.notify_one();
        }
        Ok(())
    }

    async fn wait_exit(&self, within: Duration) -> bool {
        let mut exited = self.inner.exited.clone();
        // A dropped notifier means the invoker is gone, so the child was reaped
        let outcome = tokio::time::timeout(within, exited.wait_for(|done| *done)).await;
        outcome.is_ok()
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.inner.id)
            .field("pid", &self.inner.pid)
            .field("exited", &self.has_exited())
            .finish()
    }
}
