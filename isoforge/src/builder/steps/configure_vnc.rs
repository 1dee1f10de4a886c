//! Task: Enable the VM's VNC server on a free port.

use super::{BuildCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::util::find_free_port;
use crate::vmx;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;
use std::net::{IpAddr, Ipv4Addr};

pub struct ConfigureVncTask;

#[async_trait]
impl PipelineTask<BuildCtx> for ConfigureVncTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);
        let vmx_path = ctx.vmx_path()?.to_path_buf();

        ctx.ui.say("Configuring VNC...");
        let (min, max) = (ctx.config.vnc_port_min, ctx.config.vnc_port_max);
        let port = find_free_port(&mut ctx.rng, IpAddr::V4(Ipv4Addr::LOCALHOST), min, max)
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        let mut data = vmx::read_file(&vmx_path)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;
        data.insert(vmx::keys::VNC_ENABLED.into(), "TRUE".into());
        data.insert(vmx::keys::VNC_PORT.into(), port.to_string());
        vmx::write_file(&vmx_path, &data)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(vm = %vm, vnc_port = port, "VNC enabled");
        ctx.vnc_port = Some(port);
        Ok(())
    }

    fn name(&self) -> &str {
        "configure_vnc"
    }
}
