//! Build steps, one file per step, in pipeline order.

mod boot_command;
mod configure_vnc;
mod create_disk;
mod create_vmx;
mod http_server;
mod output_dir;
mod provision;
mod run_vm;
mod shutdown;
mod wait_for_ssh;

pub(crate) use boot_command::BootCommandTask;
pub(crate) use configure_vnc::ConfigureVncTask;
pub(crate) use create_disk::CreateDiskTask;
pub(crate) use create_vmx::CreateVmxTask;
pub(crate) use http_server::HttpServerTask;
pub(crate) use output_dir::PrepareOutputDirTask;
pub(crate) use provision::ProvisionTask;
pub(crate) use run_vm::RunVmTask;
pub(crate) use shutdown::ShutdownTask;
pub(crate) use wait_for_ssh::WaitForSshTask;

use super::BuildContext;
use isoforge_shared::errors::BuildError;

pub(crate) type BuildCtx = BuildContext;

/// Log the start of a task; returns the VM name for later log fields.
fn task_start(ctx: &BuildCtx, task_name: &str) -> String {
    let vm = ctx.config.vm_name.clone();
    tracing::debug!(vm = %vm, task = task_name, "Task started");
    vm
}

fn log_task_error(vm: &str, task_name: &str, err: &BuildError) {
    if err.is_cancelled() {
        tracing::debug!(vm = %vm, task = task_name, "Task interrupted by cancellation");
    } else {
        tracing::error!(vm = %vm, task = task_name, error = %err, "Task failed");
    }
}
