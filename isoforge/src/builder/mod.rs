//! VMware ISO builder orchestration.
//!
//! ## Architecture
//!
//! A build is a fixed sequence of steps over one [`BuildContext`]:
//!
//! ```text
//!   1. PrepareOutputDir   (empty output directory)
//!   2. CreateDisk         (growable VMDK)
//!   3. CreateVmx          (descriptor from template + vmx_data)
//!   4. HttpServer         (serve http_directory, optional)
//!   5. ConfigureVnc       (enable remote display on a free port)
//!   6. RunVm              (power on; cleanup forces it off)
//!   7. BootCommand        (type keystrokes over VNC)
//!   8. WaitForSsh         (guest address + communicator)
//!   9. Provision          (run the hook)
//!  10. Shutdown           (graceful, then forced after timeout)
//! ```
//!
//! The first failing step halts the build. Steps that ran are cleaned up in
//! reverse order whatever the outcome. Only a completed build yields an
//! [`Artifact`].

mod context;
mod steps;

pub use context::BuildContext;

use crate::artifact::Artifact;
use crate::config::{BuildConfig, RawConfig};
use crate::driver::{self, Driver};
use crate::guest::{GuestConnector, SshConnector};
use crate::hook::ProvisionHook;
use crate::pipeline::{
    BoxedTask, ExecutionPlan, PipelineBuilder, PipelineExecutor, PipelineMetrics, PipelineOutcome,
    PipelineSignals,
};
use crate::ui::Ui;
use isoforge_shared::errors::{BuildError, BuildResult, MultiError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use steps::{
    BootCommandTask, BuildCtx, ConfigureVncTask, CreateDiskTask, CreateVmxTask, HttpServerTask,
    PrepareOutputDirTask, ProvisionTask, RunVmTask, ShutdownTask, WaitForSshTask,
};

/// The step sequence every build runs.
fn execution_plan() -> ExecutionPlan<BuildCtx> {
    let tasks: Vec<BoxedTask<BuildCtx>> = vec![
        Box::new(PrepareOutputDirTask),
        Box::new(CreateDiskTask),
        Box::new(CreateVmxTask),
        Box::new(HttpServerTask::default()),
        Box::new(ConfigureVncTask),
        Box::new(RunVmTask::default()),
        Box::new(BootCommandTask),
        Box::new(WaitForSshTask),
        Box::new(ProvisionTask),
        Box::new(ShutdownTask),
    ];
    ExecutionPlan::new(tasks)
}

/// Builds a VMware VM image from an installation ISO.
///
/// # Example
///
/// ```ignore
/// let builder = Builder::prepare(RawConfig::from_json(&template)?).await?;
/// if let Some(artifact) = builder.run(Arc::new(TracingUi), Arc::new(NoopHook)).await? {
///     println!("{}", artifact);
/// }
/// ```
pub struct Builder {
    config: Arc<BuildConfig>,
    driver: Arc<dyn Driver>,
    connector: Arc<dyn GuestConnector>,
    signals: PipelineSignals,
    seed: Option<u64>,
}

impl Builder {
    /// Validate the template and bind the virtualization product installed
    /// on this host.
    pub async fn prepare(raw: RawConfig) -> BuildResult<Self> {
        let (config, mut errs) = raw.resolve();
        match driver::select_driver().await {
            Ok(driver) => Self::finish_prepare(config, errs, driver),
            Err(e) => {
                errs.push(BuildError::Config(format!("Failed creating VMware driver: {}", e)));
                Err(BuildError::Validation(MultiError::new(errs)))
            }
        }
    }

    /// Like [`Builder::prepare`] with an explicit driver. The driver is still
    /// verified.
    pub async fn prepare_with_driver(raw: RawConfig, driver: Arc<dyn Driver>) -> BuildResult<Self> {
        let (config, mut errs) = raw.resolve();
        if let Err(e) = driver.verify().await {
            errs.push(BuildError::Config(format!("Failed creating VMware driver: {}", e)));
        }
        Self::finish_prepare(config, errs, driver)
    }

    fn finish_prepare(
        config: BuildConfig,
        errs: Vec<BuildError>,
        driver: Arc<dyn Driver>,
    ) -> BuildResult<Self> {
        MultiError::new(errs).into_result()?;
        tracing::debug!(vm = %config.vm_name, driver = %driver.name(), "Build prepared");
        Ok(Self {
            config: Arc::new(config),
            driver,
            connector: Arc::new(SshConnector),
            signals: PipelineSignals::new(),
            seed: None,
        })
    }

    /// Seed the build's random source (port scan offsets).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the SSH connector used to reach the guest.
    pub fn with_connector(mut self, connector: Arc<dyn GuestConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Handle for cancelling from another task or a signal handler.
    pub fn signals(&self) -> PipelineSignals {
        self.signals.clone()
    }

    /// Request cancellation. Idempotent; safe before, during or after `run`.
    pub fn cancel(&self) {
        if self.signals.cancel() {
            tracing::info!(vm = %self.config.vm_name, "Cancelling build");
        }
    }

    /// Run every step. Returns the artifact when the build completed, `None`
    /// when it was cancelled, a step halted it, or the output directory could
    /// not be collected.
    pub async fn run(
        &self,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn ProvisionHook>,
    ) -> BuildResult<Option<Artifact>> {
        let metrics = self.run_pipeline(Arc::clone(&ui), hook).await;

        match metrics.outcome {
            PipelineOutcome::Completed => match Artifact::collect(&self.config.output_dir) {
                Ok(artifact) => Ok(Some(artifact)),
                Err(e) => {
                    tracing::error!(vm = %self.config.vm_name, "{}", e);
                    ui.error(&e.to_string());
                    Ok(None)
                }
            },
            PipelineOutcome::Cancelled => {
                tracing::info!(vm = %self.config.vm_name, "Build cancelled");
                Ok(None)
            }
            PipelineOutcome::Halted => {
                tracing::info!(vm = %self.config.vm_name, "Build halted");
                Ok(None)
            }
        }
    }

    /// Run every step and return the per-step timings.
    pub async fn run_pipeline(
        &self,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn ProvisionHook>,
    ) -> PipelineMetrics {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut ctx = BuildContext::new(
            self.config.clone(),
            self.driver.clone(),
            ui,
            hook,
            self.connector.clone(),
            self.signals.clone(),
            rng,
        );

        let pipeline = PipelineBuilder::from_plan(execution_plan());
        let metrics = PipelineExecutor::execute(pipeline, &mut ctx).await;
        metrics.log_summary();
        metrics
    }
}
