//! Boot pipeline tasks.

mod desktop;
mod identity;
mod services;
mod session_script;

pub use desktop::DesktopSessionTask;
pub use identity::IdentityRemapTask;
pub use services::ServiceStartTask;
pub use session_script::SessionScriptTask;

use crate::boot::types::BootContext;
use crate::supervisor::ServiceSupervisor;
use std::sync::Arc;
use tokio::sync::Mutex;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

pub type BootCtx = Arc<Mutex<BootContext>>;

/// Log task start and return the account name for later log fields.
pub(crate) async fn task_start(ctx: &BootCtx, task_name: &str) -> String {
    let ctx = ctx.lock().await;
    tracing::debug!(account = %ctx.layout.account, task = task_name, "Task started");
    ctx.layout.account.clone()
}

pub(crate) fn log_task_error(account: &str, task_name: &str, error: &ToadboxError) {
    tracing::error!(account = %account, task = task_name, error = %error, "Task failed");
}

/// Borrow the supervisor out of the context for the duration of a task.
pub(crate) async fn take_supervisor(ctx: &BootCtx) -> ToadboxResult<ServiceSupervisor> {
    ctx.lock()
        .await
        .supervisor
        .take()
        .ok_or_else(|| ToadboxError::Internal("supervisor is not available".into()))
}
