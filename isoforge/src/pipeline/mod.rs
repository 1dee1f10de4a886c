//! Sequential, cancellation-aware pipeline execution framework.
//!
//! ## Architecture
//!
//! ```text
//! ExecutionPlan → Pipeline → PipelineExecutor
//!
//! - Task: atomic unit of work with run/cleanup
//! - Pipeline: ordered list of tasks over one shared context
//! - Executor: runs tasks in order, stops on halt/cancel, cleans up in reverse
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let plan = ExecutionPlan::new(vec![Box::new(TaskA), Box::new(TaskB)]);
//! let pipeline = PipelineBuilder::from_plan(plan);
//! let metrics = PipelineExecutor::execute(pipeline, &mut ctx).await;
//! println!("pipeline ended {:?} after {}ms", metrics.outcome, metrics.total_duration_ms);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod signals;
mod task;

pub use metrics::{PipelineMetrics, TaskMetrics};
pub use pipeline::{ExecutionPlan, Pipeline, PipelineBuilder, PipelineExecutor, PipelineOutcome};
pub use signals::PipelineSignals;
pub use task::{BoxedTask, PipelineContext, PipelineTask};
