//! Task: Wait for the installed guest to accept SSH.

use super::{BuildCtx, log_task_error, task_start};
use crate::guest;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;

pub struct WaitForSshTask;

#[async_trait]
impl PipelineTask<BuildCtx> for WaitForSshTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);
        let vmx_path = ctx.vmx_path()?.to_path_buf();

        ctx.ui.say("Waiting for SSH to become available...");
        let (addr, comm) = guest::wait_for_guest(
            ctx.driver.as_ref(),
            ctx.connector.as_ref(),
            &ctx.config,
            &vmx_path,
            &ctx.signals,
        )
        .await
        .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        ctx.ui.say("Connected via SSH!");
        tracing::info!(vm = %vm, %addr, "Guest reachable");
        ctx.guest_address = Some(addr);
        ctx.communicator = Some(comm);
        Ok(())
    }

    fn name(&self) -> &str {
        "wait_for_ssh"
    }
}
