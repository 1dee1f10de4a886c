//! Task: Type the boot command over VNC.

use super::{BuildCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::vnc::{self, BootTemplateData};
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};

pub struct BootCommandTask;

#[async_trait]
impl PipelineTask<BuildCtx> for BootCommandTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);
        let vnc_port = ctx.vnc_port()?;
        let config = ctx.config.clone();

        if !config.boot_wait.is_zero() {
            ctx.ui.say(&format!(
                "Waiting {}s for boot...",
                config.boot_wait.as_secs_f64()
            ));
            ctx.signals
                .sleep(config.boot_wait)
                .await
                .inspect_err(|e| log_task_error(&vm, task_name, e))?;
        }

        if config.boot_command.is_empty() {
            tracing::debug!(vm = %vm, "No boot command configured");
            return Ok(());
        }

        let host_ip = ctx
            .driver
            .host_ip()
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;
        let data = BootTemplateData {
            http_ip: host_ip.to_string(),
            http_port: ctx.http_port.unwrap_or_default(),
            name: config.vm_name.clone(),
        };

        ctx.ui.say("Connecting to VM via VNC");
        let mut keyboard = tokio::select! {
            keyboard = ctx.driver.keyboard(vnc_port) => keyboard,
            _ = ctx.signals.cancelled() => Err(BuildError::Cancelled),
        }
        .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        ctx.ui.say("Typing the boot command over VNC...");
        vnc::type_boot_command(keyboard.as_mut(), &config.boot_command, &data, &ctx.signals)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(vm = %vm, lines = config.boot_command.len(), "Boot command typed");
        Ok(())
    }

    fn name(&self) -> &str {
        "boot_command"
    }
}
