//! Task: Session script provisioning.

use super::{BootCtx, log_task_error, task_start};
use crate::config::IdentityTarget;
use crate::pipeline::{FailurePolicy, PipelineTask};
use crate::session::{SessionScript, SessionScriptProvisioner};
use async_trait::async_trait;
use toadbox_shared::errors::ToadboxResult;

pub struct SessionScriptTask;

#[async_trait]
impl PipelineTask<BootCtx> for SessionScriptTask {
    async fn run(self: Box<Self>, ctx: BootCtx) -> ToadboxResult<()> {
        let task_name = self.name();
        let account = task_start(&ctx, task_name).await;

        let (script, owner) = {
            let ctx = ctx.lock().await;
            let owner = ctx
                .identity
                .as_ref()
                .and_then(|report| report.final_ids)
                .map(|ids| IdentityTarget {
                    uid: ids.uid,
                    gid: ids.gid,
                });
            (SessionScript::default_for(&ctx.layout), owner)
        };

        let provisioner = SessionScriptProvisioner::new(script).with_owner(owner);
        tracing::debug!(path = %provisioner.path().display(), owner = ?owner, "Provisioning session script");
        let outcome = provisioner
            .provision()
            .inspect_err(|e| log_task_error(&account, task_name, e))?;

        ctx.lock().await.session_script = Some(outcome);
        Ok(())
    }

    fn name(&self) -> &str {
        "session_script"
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::BestEffort
    }
}
