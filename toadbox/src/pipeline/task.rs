//! Generic task trait for pipeline execution.

use async_trait::async_trait;
use toadbox_shared::errors::ToadboxResult;

/// What the executor does when a task returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the pipeline and surface the error to the caller.
    Fatal,
    /// Log the error, record it, and continue with the next task.
    BestEffort,
}

/// Trait for tasks that can be executed in a pipeline.
///
/// Tasks run with a shared context, which is cloned per task.
#[async_trait]
pub trait PipelineTask<Ctx>: Send + Sync {
    /// Execute the task with the shared pipeline context.
    async fn run(self: Box<Self>, ctx: Ctx) -> ToadboxResult<()>;

    /// Get human-readable task name for logging.
    fn name(&self) -> &str;

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;
