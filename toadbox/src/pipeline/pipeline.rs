//! Generic pipeline execution framework.
//!
//! Provides a table-driven pipeline executor that runs stages in order and
//! applies each task's failure policy.

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics, TaskOutcome};
use super::stage::Stage;
use super::task::{BoxedTask, FailurePolicy};
use std::time::Instant;
use toadbox_shared::errors::ToadboxResult;

pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name).collect()
    }

    pub fn stages(self) -> Vec<Stage<BoxedTask<Ctx>>> {
        self.stages
    }
}

pub struct Pipeline<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }
}

pub struct PipelineBuilder;

impl PipelineBuilder {
    pub fn from_plan<Ctx>(plan: ExecutionPlan<Ctx>) -> Pipeline<Ctx> {
        Pipeline::new(plan.stages())
    }
}

/// Pipeline executor framework.
///
/// The actual work is provided by task implementations; the executor only
/// sequences them, times them and applies their failure policy.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a pipeline.
    ///
    /// Returns the first error raised by a [`FailurePolicy::Fatal`] task.
    /// Errors from best-effort tasks are logged and recorded as
    /// [`TaskOutcome::Absorbed`].
    pub async fn execute<Ctx>(pipeline: Pipeline<Ctx>, ctx: Ctx) -> ToadboxResult<PipelineMetrics>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::new();

        for (index, stage) in pipeline.stages.into_iter().enumerate() {
            let stage_start = Instant::now();
            let mut task_metrics = Vec::new();

            for task in stage.tasks {
                let name = task.name().to_string();
                let policy = task.policy();
                let task_start = Instant::now();

                let outcome = match task.run(ctx.clone()).await {
                    Ok(()) => TaskOutcome::Completed,
                    Err(e) if policy == FailurePolicy::BestEffort => {
                        tracing::warn!(task = %name, error = %e, "Best-effort task failed, continuing");
                        TaskOutcome::Absorbed(e.to_string())
                    }
                    Err(e) => {
                        tracing::error!(task = %name, error = %e, "Fatal task failed, aborting boot");
                        return Err(e);
                    }
                };

                task_metrics.push(TaskMetrics {
                    name,
                    duration_ms: task_start.elapsed().as_millis(),
                    outcome,
                });
            }

            stage_metrics.push(StageMetrics {
                index,
                name: stage.name,
                duration_ms: stage_start.elapsed().as_millis(),
                tasks: task_metrics,
            });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            stages: stage_metrics,
        })
    }
}
