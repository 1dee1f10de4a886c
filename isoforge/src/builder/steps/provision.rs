//! Task: Run the provisioning hook.

use super::{BuildCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;

pub struct ProvisionTask;

#[async_trait]
impl PipelineTask<BuildCtx> for ProvisionTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);
        let comm = ctx.communicator()?;

        ctx.ui.say("Provisioning...");
        ctx.hook
            .provision(ctx.ui.as_ref(), comm.as_ref())
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(vm = %vm, "Provisioning complete");
        Ok(())
    }

    fn name(&self) -> &str {
        "provision"
    }
}
