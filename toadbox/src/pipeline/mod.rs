//! Table-driven boot pipeline.
//!
//! ```text
//! Pipeline → Stages → Tasks
//!
//! - Pipeline: runs every stage in order
//! - Stage: named group of tasks, run one after another
//! - Task: atomic unit of work with a declared failure policy
//! ```
//!
//! Boot is strictly sequential: a stage starts only after the previous one
//! has finished, so no two tasks ever touch the filesystem at the same time.
//!
//! A task declares whether its failure is [`FailurePolicy::Fatal`] (the
//! pipeline stops and the error propagates) or [`FailurePolicy::BestEffort`]
//! (the error is logged, recorded in the metrics, and the pipeline moves on).
//!
//! ## Example
//!
//! ```ignore
//! let plan = ExecutionPlan::new(vec![
//!     Stage::sequential("identity", vec![Box::new(IdentityTask)]),
//!     Stage::sequential("services", vec![Box::new(ServiceStartTask)]),
//! ]);
//!
//! let ctx = Arc::new(Mutex::new(BootContext::new(...)));
//! let pipeline = PipelineBuilder::from_plan(plan);
//! let metrics = PipelineExecutor::execute(pipeline, ctx).await?;
//! println!("boot took {}ms", metrics.total_duration_ms);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics, TaskOutcome};
pub use pipeline::{ExecutionPlan, Pipeline, PipelineBuilder, PipelineExecutor};
pub use stage::Stage;
pub use task::{BoxedTask, FailurePolicy, PipelineTask};
