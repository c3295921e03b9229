/// How a task finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The task failed but its policy allowed the pipeline to continue.
    Absorbed(String),
}

#[derive(Debug, Clone)]
pub struct TaskMetrics {
    pub name: String,
    pub duration_ms: u128,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone)]
pub struct StageMetrics {
    pub index: usize,
    pub name: &'static str,
    pub duration_ms: u128,
    pub tasks: Vec<TaskMetrics>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    pub fn task(&self, name: &str) -> Option<&TaskMetrics> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter())
            .find(|task| task.name == name)
    }

    pub fn task_duration_ms(&self, name: &str) -> Option<u128> {
        self.task(name).map(|task| task.duration_ms)
    }

    /// Names of tasks that ran, in execution order.
    pub fn task_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter())
            .map(|task| task.name.as_str())
            .collect()
    }

    /// Tasks whose failure was absorbed by a best-effort policy.
    pub fn absorbed_failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter())
            .filter_map(|task| match &task.outcome {
                TaskOutcome::Absorbed(message) => Some((task.name.as_str(), message.as_str())),
                TaskOutcome::Completed => None,
            })
    }

    /// Emit one summary line per stage.
    pub fn log_stages(&self) {
        for stage in &self.stages {
            tracing::info!(
                index = stage.index,
                stage = stage.name,
                duration_ms = stage.duration_ms as u64,
                tasks = stage.tasks.len(),
                "Boot stage finished"
            );
        }
        tracing::info!(
            total_ms = self.total_duration_ms as u64,
            "Boot pipeline finished"
        );
    }
}
