//! Provisioning hook run against the installed guest.

use crate::guest::Communicator;
use crate::ui::Ui;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};

/// Opaque provisioning callback. Receives the UI and a live communicator.
#[async_trait]
pub trait ProvisionHook: Send + Sync {
    async fn provision(&self, ui: &dyn Ui, comm: &dyn Communicator) -> BuildResult<()>;
}

/// Hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

#[async_trait]
impl ProvisionHook for NoopHook {
    async fn provision(&self, _ui: &dyn Ui, _comm: &dyn Communicator) -> BuildResult<()> {
        Ok(())
    }
}

/// Runs shell commands in order; the first non-zero exit fails the hook.
#[derive(Debug, Clone, Default)]
pub struct ShellHook {
    commands: Vec<String>,
}

impl ShellHook {
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl ProvisionHook for ShellHook {
    async fn provision(&self, ui: &dyn Ui, comm: &dyn Communicator) -> BuildResult<()> {
        for command in &self.commands {
            ui.message(&format!("Provisioning with shell command: {}", command));
            let out = comm.run(command).await?;
            if !out.success() {
                return Err(BuildError::Provision(format!(
                    "{:?} exited with {:?}: {}",
                    command,
                    out.exit_code,
                    out.stderr.trim()
                )));
            }
        }
        Ok(())
    }
}
