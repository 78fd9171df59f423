//! One-shot agent CLI invocation
//!
//! Every call spawns a fresh process with stdin closed, captures stdout and
//! stderr, and bounds the run by a single deadline on the child's exit. Output
//! still in flight when the child exits is collected for a short window; pipes
//! held open by descendants do not keep the call running. The child is killed
//! when the deadline passes or the returned future is dropped.

use crate::error::ProcessError;
use crate::process::handle::{ExitNotifier, ProcessHandle, Terminable};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// How long pipe readers may run on after the child has exited
const OUTPUT_DRAIN: Duration = Duration::from_millis(250);

/// Everything needed to run the CLI once
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl InvocationRequest {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs the agent CLI
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Run to completion; returns stdout verbatim on exit code 0
    async fn invoke(&self, request: InvocationRequest) -> Result<String, ProcessError>;

    /// The invocation currently in flight, if any
    fn active_process(&self) -> Option<Arc<dyn Terminable>>;
}

/// `ProcessInvoker` backed by `tokio::process`
#[derive(Default)]
pub struct CliInvoker {
    next_id: AtomicU64,
    active: Mutex<Option<ProcessHandle>>,
}

impl CliInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, handle: ProcessHandle) {
        *self.active.lock() = Some(handle);
    }

    fn untrack(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().map(|h| h.id()) == Some(id) {
            active.take();
        }
    }
}

#[async_trait]
impl ProcessInvoker for CliInvoker {
    async fn invoke(&self, request: InvocationRequest) -> Result<String, ProcessError> {
        debug!(
            "Invoking: {} {:?} (cwd: {:?}, timeout: {:?})",
            request.command, request.args, request.working_dir, request.timeout
        );

        let mut cmd = Command::new(&request.command);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            command: request.command.clone(),
            source: e,
        })?;

        let stdout = child.stdout.take().ok_or(ProcessError::Capture("stdout"))?;
        let stderr = child.stderr.take().ok_or(ProcessError::Capture("stderr"))?;

        let stdout_buf = OutputBuffer::default();
        let stderr_buf = OutputBuffer::default();
        let mut stdout_task = tokio::spawn(stdout_buf.clone().fill(stdout));
        let mut stderr_task = tokio::spawn(stderr_buf.clone().fill(stderr));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, exit) = ProcessHandle::new(id, child.id());
        self.track(handle.clone());
        let tracked = Tracked {
            invoker: self,
            id,
            exit,
        };

        let waited = tokio::time::timeout(request.timeout, async {
            loop {
                tokio::select! {
                    status = child.wait() => break status,
                    _ = handle.kill_requested() => {
                        warn!("Killing invocation {} on request", id);
                        if let Err(e) = child.start_kill() {
                            warn!("Failed to kill invocation {}: {}", id, e);
                        }
                    }
                }
            }
        })
        .await;

        let status = match waited {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    "Invocation {} exceeded {:?}, killing",
                    id, request.timeout
                );
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill invocation {}: {}", id, e);
                }
                let _ = child.wait().await;
                tracked.finish();
                stdout_task.abort();
                stderr_task.abort();
                return Err(ProcessError::Timeout {
                    timeout_ms: request.timeout.as_millis() as u64,
                    stdout: stdout_buf.snapshot(),
                    stderr: stderr_buf.snapshot(),
                });
            }
        };
        // The child is reaped; its pid must not be signalled any more
        tracked.finish();

        // Descendants may still hold the pipes open
        let drained = tokio::time::timeout(OUTPUT_DRAIN, async {
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
        })
        .await;
        if drained.is_err() {
            debug!(
                "Output pipes of invocation {} still open after exit, detaching",
                id
            );
            stdout_task.abort();
            stderr_task.abort();
        }

        let status = status.map_err(ProcessError::Wait)?;
        let stdout = stdout_buf.snapshot();
        let stderr = stderr_buf.snapshot();
        trace!("Invocation {} stdout: {}", id, stdout);
        if status.success() {
            if !stderr.trim().is_empty() {
                debug!("Invocation {} stderr: {}", id, stderr.trim());
            }
            Ok(stdout)
        } else {
            warn!("Invocation {} exited with {:?}", id, status.code());
            Err(ProcessError::NonZeroExit {
                code: status.code(),
                stderr,
            })
        }
    }

    fn active_process(&self) -> Option<Arc<dyn Terminable>> {
        self.active
            .lock()
            .clone()
            .map(|h| Arc::new(h) as Arc<dyn Terminable>)
    }
}

/// Publishes the in-flight handle until the child is reaped or `invoke` is dropped
struct Tracked<'a> {
    invoker: &'a CliInvoker,
    id: u64,
    exit: ExitNotifier,
}

impl Tracked<'_> {
    fn finish(&self) {
        self.exit.mark_exited();
        self.invoker.untrack(self.id);
    }
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Output accumulated from one pipe, readable while the reader still runs
#[derive(Clone, Default)]
struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    async fn fill<R: AsyncRead + Unpin>(self, mut reader: R) {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => self.0.lock().extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!("Error reading agent output: {}", e);
                    break;
                }
            }
        }
    }

    fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}
