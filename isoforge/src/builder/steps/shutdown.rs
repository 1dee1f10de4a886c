//! Task: Shut the VM down.
//!
//! With a `shutdown_command` the guest powers itself off; otherwise the
//! driver asks for a graceful stop. Either way the VM gets
//! `shutdown_timeout`, request included, to stop before it is forced off.

use super::{BuildCtx, log_task_error, task_start};
use crate::config::constants::intervals;
use crate::driver::Driver;
use crate::guest::Communicator;
use crate::pipeline::{PipelineSignals, PipelineTask};
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct ShutdownTask;

/// How the VM is asked to stop.
enum StopRequest {
    /// Run the configured command in the guest.
    Command(Arc<dyn Communicator>, String),
    /// Ask the driver for a soft stop.
    Graceful,
}

#[async_trait]
impl PipelineTask<BuildCtx> for ShutdownTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);
        let vmx_path = ctx.vmx_path()?.to_path_buf();
        let config = ctx.config.clone();

        let request = match &config.shutdown_command {
            Some(command) => {
                ctx.ui.say("Gracefully halting virtual machine...");
                StopRequest::Command(ctx.communicator()?, command.clone())
            }
            None => {
                ctx.ui.say("Halting the virtual machine...");
                StopRequest::Graceful
            }
        };

        let stopped = stop_within(
            ctx.driver.as_ref(),
            &vmx_path,
            &vm,
            request,
            config.shutdown_timeout,
            &ctx.signals,
        )
        .await
        .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        if !stopped {
            ctx.ui.error("Timeout while waiting for machine to shut down.");
            tracing::warn!(
                vm = %vm,
                timeout_secs = config.shutdown_timeout.as_secs(),
                "VM did not stop in time, forcing it off"
            );
            ctx.driver
                .kill(&vmx_path)
                .await
                .inspect_err(|e| log_task_error(&vm, task_name, e))?;
        }

        tracing::info!(vm = %vm, forced = !stopped, "VM shut down");
        Ok(())
    }

    fn name(&self) -> &str {
        "shutdown"
    }
}

/// Send the stop request, then poll until the VM stops. `Ok(false)` means
/// `timeout` elapsed first. Failed requests are only logged: the session may
/// drop as the guest powers off, and the poll decides.
async fn stop_within(
    driver: &dyn Driver,
    vmx: &Path,
    vm: &str,
    request: StopRequest,
    timeout: Duration,
    signals: &PipelineSignals,
) -> BuildResult<bool> {
    let stop = async {
        match request {
            StopRequest::Command(comm, command) => match comm.run(&command).await {
                Ok(out) if !out.success() => tracing::warn!(
                    vm = %vm,
                    exit_code = ?out.exit_code,
                    "Shutdown command exited unsuccessfully: {}",
                    out.stderr.trim()
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!(vm = %vm, "Shutdown command failed: {}", e),
            },
            StopRequest::Graceful => {
                if let Err(e) = driver.stop(vmx).await {
                    tracing::warn!(vm = %vm, "Graceful stop failed: {}", e);
                }
            }
        }

        tracing::debug!(vm = %vm, "Waiting for VM to shut down");
        loop {
            if !driver.is_running(vmx).await? {
                return Ok::<_, BuildError>(());
            }
            signals.sleep(intervals::SHUTDOWN_POLL).await?;
        }
    };

    tokio::select! {
        result = tokio::time::timeout(timeout, stop) => match result {
            Ok(stopped) => stopped.map(|()| true),
            Err(_) => Ok(false),
        },
        _ = signals.cancelled() => Err(BuildError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DiskSpec;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone, Copy)]
    enum StopBehavior {
        Ok,
        Fail,
        Hang,
    }

    /// Reports running for the first `polls` checks.
    struct StoppingDriver {
        polls: AtomicU32,
        stop: StopBehavior,
    }

    impl StoppingDriver {
        fn new(polls: u32, stop: StopBehavior) -> Self {
            Self {
                polls: AtomicU32::new(polls),
                stop,
            }
        }
    }

    #[async_trait]
    impl Driver for StoppingDriver {
        fn name(&self) -> &str {
            "stopping"
        }
        async fn verify(&self) -> BuildResult<()> {
            Ok(())
        }
        async fn create_disk(&self, _: &Path, _: &DiskSpec) -> BuildResult<()> {
            Ok(())
        }
        async fn start(&self, _: &Path, _: bool) -> BuildResult<()> {
            Ok(())
        }
        async fn stop(&self, _: &Path) -> BuildResult<()> {
            match self.stop {
                StopBehavior::Ok => Ok(()),
                StopBehavior::Fail => Err(BuildError::Driver("vmrun stop failed".into())),
                StopBehavior::Hang => std::future::pending().await,
            }
        }
        async fn kill(&self, _: &Path) -> BuildResult<()> {
            Ok(())
        }
        async fn is_running(&self, _: &Path) -> BuildResult<bool> {
            let left = self.polls.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(false);
            }
            self.polls.store(left - 1, Ordering::SeqCst);
            Ok(true)
        }
        async fn guest_ip(&self, _: &Path) -> BuildResult<Option<IpAddr>> {
            Ok(None)
        }
        async fn host_ip(&self) -> BuildResult<IpAddr> {
            Ok(IpAddr::from([127, 0, 0, 1]))
        }
    }

    async fn graceful_stop(
        driver: &StoppingDriver,
        timeout: Duration,
        signals: &PipelineSignals,
    ) -> BuildResult<bool> {
        stop_within(
            driver,
            Path::new("/vm.vmx"),
            "vm",
            StopRequest::Graceful,
            timeout,
            signals,
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_within_timeout() {
        let driver = StoppingDriver::new(3, StopBehavior::Ok);
        let signals = PipelineSignals::new();
        let stopped = graceful_stop(&driver, Duration::from_secs(60), &signals)
            .await
            .unwrap();
        assert!(stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let driver = StoppingDriver::new(u32::MAX, StopBehavior::Ok);
        let signals = PipelineSignals::new();
        let start = tokio::time::Instant::now();
        let stopped = graceful_stop(&driver, Duration::from_secs(10), &signals)
            .await
            .unwrap();
        assert!(!stopped);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_stop_request_counts_against_timeout() {
        let driver = StoppingDriver::new(u32::MAX, StopBehavior::Hang);
        let signals = PipelineSignals::new();
        let start = tokio::time::Instant::now();
        let stopped = graceful_stop(&driver, Duration::from_secs(10), &signals)
            .await
            .unwrap();
        assert!(!stopped);
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_request_still_waits() {
        let driver = StoppingDriver::new(2, StopBehavior::Fail);
        let signals = PipelineSignals::new();
        let stopped = graceful_stop(&driver, Duration::from_secs(60), &signals)
            .await
            .unwrap();
        assert!(stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let driver = StoppingDriver::new(u32::MAX, StopBehavior::Ok);
        let signals = PipelineSignals::new();
        signals.cancel();
        let err = graceful_stop(&driver, Duration::from_secs(10), &signals)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_hung_stop_request() {
        let driver = StoppingDriver::new(u32::MAX, StopBehavior::Hang);
        let signals = PipelineSignals::new();
        let canceller = signals.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = graceful_stop(&driver, Duration::from_secs(600), &signals)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
