//! Graceful-then-forceful termination of an agent invocation

use crate::process::handle::Terminable;
use crate::types::StopStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Phases of one shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    GracefulStop,
    ForceStop,
    Stopped,
    Failed,
}

/// Terminates an in-flight invocation: terminate, wait out the grace period,
/// then kill.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    grace_period: Duration,
}

impl ShutdownController {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Run the protocol against `target`.
    ///
    /// With nothing in flight the graceful path is trivially `Stopped` and the
    /// forced path still reports `ForceKilled`. Signal failures surface as
    /// `Err` so the caller can report `Failed`.
    pub async fn shutdown(
        &self,
        target: Option<Arc<dyn Terminable>>,
        force: bool,
    ) -> std::io::Result<StopStatus> {
        let mut phase = ShutdownPhase::Running;
        let result = self.run(target, force, &mut phase).await;

        match &result {
            Ok(status) => info!("Shutdown finished: {:?}", status),
            Err(e) => {
                warn!("Shutdown failed during {:?}: {}", phase, e);
                phase = ShutdownPhase::Failed;
            }
        }
        debug!("Final shutdown phase: {:?}", phase);
        result
    }

    async fn run(
        &self,
        target: Option<Arc<dyn Terminable>>,
        force: bool,
        phase: &mut ShutdownPhase,
    ) -> std::io::Result<StopStatus> {
        if force {
            *phase = ShutdownPhase::ForceStop;
            if let Some(target) = target {
                debug!("Force killing pid {:?}", target.pid());
                target.kill()?;
            }
            *phase = ShutdownPhase::Stopped;
            return Ok(StopStatus::ForceKilled);
        }

        let Some(target) = target else {
            *phase = ShutdownPhase::Stopped;
            return Ok(StopStatus::Stopped);
        };

        *phase = ShutdownPhase::GracefulStop;
        debug!(
            "Terminating pid {:?}, grace period {:?}",
            target.pid(),
            self.grace_period
        );
        target.terminate()?;

        if target.wait_exit(self.grace_period).await {
            *phase = ShutdownPhase::Stopped;
            return Ok(StopStatus::Stopped);
        }

        warn!(
            "Process {:?} still running after {:?}, escalating to kill",
            target.pid(),
            self.grace_period
        );
        *phase = ShutdownPhase::ForceStop;
        target.kill()?;
        *phase = ShutdownPhase::Stopped;
        Ok(StopStatus::ForceKilled)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::handle::MockTerminable;
    use mockall::predicate::eq;

    fn controller() -> ShutdownController {
        ShutdownController::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_graceful_exit_within_grace_is_stopped() {
        let mut target = MockTerminable::new();
        target.expect_pid().return_const(Some(42u32));
        target.expect_terminate().times(1).returning(|| Ok(()));
        target
            .expect_wait_exit()
            .with(eq(Duration::from_millis(50)))
            .times(1)
            .returning(|_| true);
        target.expect_kill().never();

        let status = controller()
            .shutdown(Some(Arc::new(target)), false)
            .await
            .unwrap();
        assert_eq!(status, StopStatus::Stopped);
    }

    #[tokio::test]
    async fn test_ignored_terminate_escalates_to_kill() {
        let mut target = MockTerminable::new();
        target.expect_pid().return_const(Some(42u32));
        target.expect_terminate().times(1).returning(|| Ok(()));
        target.expect_wait_exit().times(1).returning(|_| false);
        target.expect_kill().times(1).returning(|| Ok(()));

        let status = controller()
            .shutdown(Some(Arc::new(target)), false)
            .await
            .unwrap();
        assert_eq!(status, StopStatus::ForceKilled);
    }

    #[tokio::test]
    async fn test_force_kills_without_waiting() {
        let mut target = MockTerminable::new();
        target.expect_pid().return_const(Some(42u32));
        target.expect_terminate().never();
        target.expect_wait_exit().never();
        target.expect_kill().times(1).returning(|| Ok(()));

        let status = controller()
            .shutdown(Some(Arc::new(target)), true)
            .await
            .unwrap();
        assert_eq!(status, StopStatus::ForceKilled);
    }

    #[tokio::test]
    async fn test_nothing_in_flight() {
        assert_eq!(
            controller().shutdown(None, false).await.unwrap(),
            StopStatus::Stopped
        );
        assert_eq!(
            controller().shutdown(None, true).await.unwrap(),
            StopStatus::ForceKilled
        );
    }

    #[tokio::test]
    async fn test_signal_failure_is_an_error() {
        let mut target = MockTerminable::new();
        target.expect_pid().return_const(Some(42u32));
        target
            .expect_terminate()
            .returning(|| Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied)));

        let result = controller().shutdown(Some(Arc::new(target)), false).await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_process_ignoring_sigterm_is_force_killed() {
        use crate::process::invoker::{CliInvoker, InvocationRequest, ProcessInvoker};

        let invoker = Arc::new(CliInvoker::new());
        let running = {
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move {
                invoker
                    .invoke(
                        InvocationRequest::new(
                            "sh",
                            vec!["-c".into(), "trap '' TERM; while :; do sleep 0.1; done".into()],
                        )
                        .timeout(Duration::from_secs(30)),
                    )
                    .await
            })
        };

        let target = loop {
            if let Some(target) = invoker.active_process() {
                break target;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        // Let the shell install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        let status = ShutdownController::new(Duration::from_millis(300))
            .shutdown(Some(target), false)
            .await
            .unwrap();

        assert_eq!(status, StopStatus::ForceKilled);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(running.await.unwrap().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prompt_exit_with_background_children_is_stopped() {
        use crate::error::ProcessError;
        use crate::process::invoker::{CliInvoker, InvocationRequest, ProcessInvoker};

        let invoker = Arc::new(CliInvoker::new());
        let running = {
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move {
                invoker
                    .invoke(
                        InvocationRequest::new(
                            "sh",
                            vec!["-c".into(), "sleep 3 & exec sleep 30".into()],
                        )
                        .timeout(Duration::from_secs(30)),
                    )
                    .await
            })
        };

        let target = loop {
            if let Some(target) = invoker.active_process() {
                break target;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = ShutdownController::new(Duration::from_secs(1))
            .shutdown(Some(target), false)
            .await
            .unwrap();

        assert_eq!(status, StopStatus::Stopped);
        let err = running.await.unwrap().unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExit { code: None, .. }));
    }
}
