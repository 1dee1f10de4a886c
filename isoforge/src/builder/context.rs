//! Shared state of one build, threaded through every step.

use crate::config::BuildConfig;
use crate::driver::Driver;
use crate::guest::{Communicator, GuestConnector};
use crate::hook::ProvisionHook;
use crate::pipeline::{PipelineContext, PipelineSignals};
use crate::ui::Ui;
use isoforge_shared::errors::{BuildError, BuildResult};
use rand::rngs::StdRng;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs every step may read, plus the outputs earlier steps record for
/// later ones.
///
/// Outputs start out empty. A step needing an output that no earlier step
/// produced fails with an internal error instead of guessing.
pub struct BuildContext {
    pub config: Arc<BuildConfig>,
    pub driver: Arc<dyn Driver>,
    pub ui: Arc<dyn Ui>,
    pub hook: Arc<dyn ProvisionHook>,
    pub connector: Arc<dyn GuestConnector>,
    pub signals: PipelineSignals,
    /// Build-scoped random source (port scan offsets).
    pub rng: StdRng,

    pub disk_path: Option<PathBuf>,
    pub vmx_path: Option<PathBuf>,
    pub http_port: Option<u16>,
    pub vnc_port: Option<u16>,
    pub guest_address: Option<SocketAddr>,
    pub communicator: Option<Arc<dyn Communicator>>,
}

impl BuildContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<BuildConfig>,
        driver: Arc<dyn Driver>,
        ui: Arc<dyn Ui>,
        hook: Arc<dyn ProvisionHook>,
        connector: Arc<dyn GuestConnector>,
        signals: PipelineSignals,
        rng: StdRng,
    ) -> Self {
        Self {
            config,
            driver,
            ui,
            hook,
            connector,
            signals,
            rng,
            disk_path: None,
            vmx_path: None,
            http_port: None,
            vnc_port: None,
            guest_address: None,
            communicator: None,
        }
    }

    pub fn vmx_path(&self) -> BuildResult<&Path> {
        self.vmx_path
            .as_deref()
            .ok_or_else(|| BuildError::Internal("create_vmx task must run first".into()))
    }

    pub fn vnc_port(&self) -> BuildResult<u16> {
        self.vnc_port
            .ok_or_else(|| BuildError::Internal("configure_vnc task must run first".into()))
    }

    pub fn communicator(&self) -> BuildResult<Arc<dyn Communicator>> {
        self.communicator
            .clone()
            .ok_or_else(|| BuildError::Internal("wait_for_ssh task must run first".into()))
    }
}

impl PipelineContext for BuildContext {
    fn signals(&self) -> &PipelineSignals {
        &self.signals
    }

    fn report_error(&self, task: &str, err: &BuildError) {
        tracing::error!(vm = %self.config.vm_name, task, "Build step failed: {}", err);
        self.ui.error(&err.to_string());
    }
}
