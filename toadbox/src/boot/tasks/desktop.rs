//! Task: Desktop session.
//!
//! Hands control to the desktop chain. Whatever happens there, boot goes on.

use super::{BootCtx, log_task_error, take_supervisor, task_start};
use crate::desktop::DesktopSessionLauncher;
use crate::pipeline::{FailurePolicy, PipelineTask};
use async_trait::async_trait;
use toadbox_shared::errors::ToadboxResult;

pub struct DesktopSessionTask;

#[async_trait]
impl PipelineTask<BootCtx> for DesktopSessionTask {
    async fn run(self: Box<Self>, ctx: BootCtx) -> ToadboxResult<()> {
        let task_name = self.name();
        let account = task_start(&ctx, task_name).await;

        let (config, layout, run_as) = {
            let ctx = ctx.lock().await;
            (
                ctx.config.clone(),
                ctx.layout.clone(),
                ctx.identity.as_ref().and_then(|report| report.final_ids),
            )
        };

        let mut supervisor = take_supervisor(&ctx).await?;
        let desktop = DesktopSessionLauncher::new(&config, &layout, run_as);
        let result = supervisor.hand_off_desktop(&desktop).await;

        let mut ctx = ctx.lock().await;
        ctx.supervisor = Some(supervisor);
        ctx.desktop = result
            .inspect_err(|e| log_task_error(&account, task_name, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "desktop_session"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::BestEffort
    }
}
