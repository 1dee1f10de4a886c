//! Task trait for pipeline execution.

use super::signals::PipelineSignals;
use async_trait::async_trait;
use isoforge_shared::errors::{BuildError, BuildResult};

/// A unit of work in a pipeline.
///
/// `run` performs the task's effect against the shared context. `cleanup` is
/// invoked once the pipeline stops advancing, in reverse order of execution,
/// for every task whose `run` was entered (including one that failed).
/// Tasks keep only scratch state that is valid between those two calls.
#[async_trait]
pub trait PipelineTask<Ctx: Send>: Send {
    /// Execute the task. An error halts the pipeline.
    async fn run(&mut self, ctx: &mut Ctx) -> BuildResult<()>;

    /// Release whatever `run` acquired. Errors are logged, never propagated.
    async fn cleanup(&mut self, _ctx: &mut Ctx) -> BuildResult<()> {
        Ok(())
    }

    /// Human-readable task name for logging.
    fn name(&self) -> &str;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;

/// What the executor needs from a pipeline context.
pub trait PipelineContext: Send {
    fn signals(&self) -> &PipelineSignals;

    /// Surface a task failure to whoever is watching the build.
    fn report_error(&self, task: &str, err: &BuildError);
}
