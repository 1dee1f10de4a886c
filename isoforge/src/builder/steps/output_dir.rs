//! Task: Prepare output directory.
//!
//! Leaves an empty output directory behind. Existing contents are removed;
//! the directory is never deleted on failure.

use super::{BuildCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};
use std::path::Path;

pub struct PrepareOutputDirTask;

#[async_trait]
impl PipelineTask<BuildCtx> for PrepareOutputDirTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);

        let dir = ctx.config.output_dir.clone();
        ctx.ui.say("Preparing output directory...");
        prepare_dir(&dir)
            .await
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        tracing::info!(vm = %vm, dir = %dir.display(), "Output directory ready");
        Ok(())
    }

    fn name(&self) -> &str {
        "prepare_output_dir"
    }
}

async fn prepare_dir(dir: &Path) -> BuildResult<()> {
    if tokio::fs::try_exists(dir).await? {
        tracing::debug!(dir = %dir.display(), "Clearing existing output directory");
        tokio::fs::remove_dir_all(dir).await.map_err(|e| {
            BuildError::Io(std::io::Error::new(
                e.kind(),
                format!("Error clearing output directory {}: {}", dir.display(), e),
            ))
        })?;
    }
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        BuildError::Io(std::io::Error::new(
            e.kind(),
            format!("Error creating output directory {}: {}", dir.display(), e),
        ))
    })
}
