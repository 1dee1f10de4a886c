//! Task: Create the virtual disk.

use super::{BuildCtx, log_task_error, task_start};
use crate::driver::DiskSpec;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;

pub struct CreateDiskTask;

#[async_trait]
impl PipelineTask<BuildCtx> for CreateDiskTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);

        let path = ctx.config.disk_path();
        let spec = DiskSpec::growable(ctx.config.disk_size_mb);

        ctx.ui.say("Creating virtual machine disk");
        ctx.driver
            .create_disk(&path, &spec)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(
            vm = %vm,
            disk = %path.display(),
            size_mb = spec.size_mb,
            "Virtual disk created"
        );
        ctx.disk_path = Some(path);
        Ok(())
    }

    fn name(&self) -> &str {
        "create_disk"
    }
}
