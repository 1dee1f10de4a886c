//! Sequential pipeline executor with reverse-order cleanup.

use super::metrics::{PipelineMetrics, TaskMetrics};
use super::task::{BoxedTask, PipelineContext};
use std::time::Instant;

pub struct ExecutionPlan<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn tasks(self) -> Vec<BoxedTask<Ctx>> {
        self.tasks
    }
}

pub struct Pipeline<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub struct PipelineBuilder;

impl PipelineBuilder {
    pub fn from_plan<Ctx>(plan: ExecutionPlan<Ctx>) -> Pipeline<Ctx> {
        Pipeline::new(plan.tasks())
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every task ran and succeeded.
    Completed,
    /// A task failed; remaining tasks were skipped.
    Halted,
    /// Cancellation was requested before the pipeline finished.
    Cancelled,
}

/// Pipeline executor.
///
/// Runs tasks strictly one at a time. Before each task the context's signals
/// are checked; a cancelled or halted pipeline stops advancing. Every task whose
/// `run` was entered is cleaned up afterwards in reverse order, whatever the
/// outcome. Cleanup failures are logged and swallowed.
pub struct PipelineExecutor;

impl PipelineExecutor {
    pub async fn execute<Ctx>(pipeline: Pipeline<Ctx>, ctx: &mut Ctx) -> PipelineMetrics
    where
        Ctx: PipelineContext,
    {
        let total_start = Instant::now();
        let mut task_metrics = Vec::new();
        let mut executed: Vec<BoxedTask<Ctx>> = Vec::with_capacity(pipeline.tasks.len());

        for mut task in pipeline.tasks {
            let signals = ctx.signals().clone();
            if signals.is_cancelled() || signals.is_halted() {
                tracing::debug!(task = %task.name(), "Pipeline stopped, skipping task");
                break;
            }

            let name = task.name().to_string();
            let task_start = Instant::now();
            tracing::debug!(task = %name, "Running task");
            let result = task.run(ctx).await;
            executed.push(task);

            task_metrics.push(TaskMetrics {
                name: name.clone(),
                duration_ms: task_start.elapsed().as_millis(),
                succeeded: result.is_ok(),
            });

            if let Err(e) = result {
                if signals.is_cancelled() {
                    tracing::info!(task = %name, "Task interrupted by cancellation: {}", e);
                } else {
                    ctx.report_error(&name, &e);
                    signals.halt();
                }
                break;
            }
        }

        let outcome = {
            let signals = ctx.signals();
            if signals.is_cancelled() {
                PipelineOutcome::Cancelled
            } else if signals.is_halted() {
                PipelineOutcome::Halted
            } else {
                PipelineOutcome::Completed
            }
        };

        while let Some(mut task) = executed.pop() {
            if let Err(e) = task.cleanup(ctx).await {
                tracing::warn!(task = %task.name(), "Cleanup failed: {}", e);
            }
        }

        PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            outcome,
            tasks: task_metrics,
        }
    }
}
