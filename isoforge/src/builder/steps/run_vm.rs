//! Task: Start the VM.
//!
//! Cleanup force-stops the VM if it is still running when the pipeline
//! unwinds, so a failed or cancelled build leaves nothing powered on.

use super::{BuildCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;
use std::path::PathBuf;

#[derive(Default)]
pub struct RunVmTask {
    vmx: Option<PathBuf>,
}

#[async_trait]
impl PipelineTask<BuildCtx> for RunVmTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name().to_owned();
        let task_name = task_name.as_str();
        let vm = task_start(ctx, task_name);
        let vmx_path = ctx.vmx_path()?.to_path_buf();

        ctx.ui.say("Starting virtual machine...");
        // Recorded before starting: a start that fails halfway may still
        // leave a running VM behind.
        self.vmx = Some(vmx_path.clone());
        ctx.driver
            .start(&vmx_path, ctx.config.headless)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(vm = %vm, headless = ctx.config.headless, "VM started");
        Ok(())
    }

    async fn cleanup(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let Some(vmx_path) = self.vmx.take() else {
            return Ok(());
        };

        if ctx.driver.is_running(&vmx_path).await? {
            ctx.ui.say("Stopping virtual machine...");
            tracing::info!(vmx = %vmx_path.display(), "Force stopping VM during cleanup");
            ctx.driver.kill(&vmx_path).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "run_vm"
    }
}
