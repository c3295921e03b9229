//! Task: Background service start (ssh, docker).
//!
//! Fatal: an enabled service that cannot start aborts boot.

use super::{BootCtx, log_task_error, take_supervisor, task_start};
use crate::pipeline::{FailurePolicy, PipelineTask};
use async_trait::async_trait;
use toadbox_shared::errors::ToadboxResult;

pub struct ServiceStartTask;

#[async_trait]
impl PipelineTask<BootCtx> for ServiceStartTask {
    async fn run(self: Box<Self>, ctx: BootCtx) -> ToadboxResult<()> {
        let task_name = self.name();
        let account = task_start(&ctx, task_name).await;

        let (config, layout) = {
            let ctx = ctx.lock().await;
            (ctx.config.clone(), ctx.layout.clone())
        };

        let mut supervisor = take_supervisor(&ctx).await?;
        let result = supervisor.start_background(&config, &layout).await;
        ctx.lock().await.supervisor = Some(supervisor);

        result.inspect_err(|e| log_task_error(&account, task_name, e))
    }

    fn name(&self) -> &str {
        "service_start"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }
}
