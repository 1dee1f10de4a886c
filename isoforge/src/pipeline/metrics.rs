use super::PipelineOutcome;

#[derive(Debug, Clone)]
pub struct TaskMetrics {
    pub name: String,
    pub duration_ms: u128,
    pub succeeded: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub outcome: PipelineOutcome,
    pub tasks: Vec<TaskMetrics>,
}

impl PipelineMetrics {
    pub fn task_duration_ms(&self, name: &str) -> Option<u128> {
        self.tasks
            .iter()
            .find(|task| task.name == name)
            .map(|task| task.duration_ms)
    }

    /// Names of the tasks whose `run` was entered, in execution order.
    pub fn executed(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name.as_str()).collect()
    }

    pub fn log_summary(&self) {
        for task in &self.tasks {
            tracing::info!(
                task = %task.name,
                duration_ms = task.duration_ms as u64,
                succeeded = task.succeeded,
                "Task timing"
            );
        }
        tracing::info!(
            outcome = ?self.outcome,
            total_duration_ms = self.total_duration_ms as u64,
            "Pipeline finished"
        );
    }
}
