//! Task: Write the VM descriptor.
//!
//! Renders the built-in template for the disk created earlier and the
//! installation ISO, applies `vmx_data` overrides and writes the file.

use super::{BuildCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::vmx::{self, VmxTemplate};
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};

pub struct CreateVmxTask;

#[async_trait]
impl PipelineTask<BuildCtx> for CreateVmxTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);

        let disk_path = ctx
            .disk_path
            .as_ref()
            .ok_or_else(|| BuildError::Internal("create_disk task must run first".into()))?;
        // The descriptor lives next to the disk; reference it relatively.
        let disk_file = disk_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BuildError::Internal(format!("disk path has no file name: {}", disk_path.display()))
            })?;

        let config = &ctx.config;
        let mut data = vmx::default_template(&VmxTemplate {
            name: &config.vm_name,
            guest_os: &config.guest_os_type,
            disk_file: &disk_file,
            iso_path: config.iso_path(),
        });
        vmx::merge(&mut data, &config.vmx_data);

        ctx.ui.say("Building and writing VMX file");
        let path = config.vmx_path();
        vmx::write_file(&path, &data)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(
            vm = %vm,
            vmx = %path.display(),
            overrides = config.vmx_data.len(),
            "VMX file written"
        );
        ctx.vmx_path = Some(path);
        Ok(())
    }

    fn name(&self) -> &str {
        "create_vmx"
    }
}
