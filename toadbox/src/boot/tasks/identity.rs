//! Task: Identity remap.
//!
//! Aligns the service account with the host's uid/gid and fixes ownership.
//! Failures are recorded in the report; the task only errors so the
//! pipeline metrics show that the remap was incomplete.

use super::{BootCtx, task_start};
use crate::identity::IdentityManager;
use crate::pipeline::{FailurePolicy, PipelineTask};
use async_trait::async_trait;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

pub struct IdentityRemapTask;

#[async_trait]
impl PipelineTask<BootCtx> for IdentityRemapTask {
    async fn run(self: Box<Self>, ctx: BootCtx) -> ToadboxResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name).await;

        let (accounts, layout, target) = {
            let ctx = ctx.lock().await;
            (
                ctx.accounts.clone(),
                ctx.layout.clone(),
                ctx.config.identity_target(),
            )
        };

        // Account tools and the ownership walk block.
        let report = tokio::task::spawn_blocking(move || {
            IdentityManager::new(accounts.as_ref(), &layout).remap(target)
        })
        .await
        .map_err(|e| ToadboxError::Internal(format!("identity remap panicked: {}", e)))?;

        let failed: Vec<String> = report.failures().map(|step| step.name.clone()).collect();
        ctx.lock().await.identity = Some(report);

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ToadboxError::Identity(format!(
                "steps failed: {}",
                failed.join(", ")
            )))
        }
    }

    fn name(&self) -> &str {
        "identity_remap"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::BestEffort
    }
}
