//! Boot orchestration.
//!
//! ## Architecture
//!
//! Boot is table-driven. The execution plan depends on whether the desktop
//! is enabled:
//!
//! ```text
//! Desktop enabled:
//!   1. IdentityRemap     (best-effort: uid/gid remap, ownership fix)
//!   2. SessionScript     (best-effort: create xstartup if absent)
//!   3. ServiceStart      (fatal: ssh, docker)
//!   4. DesktopSession    (never fails: primary → fallback → keep-alive)
//!
//! Desktop disabled:
//!   1. IdentityRemap
//!   2. ServiceStart
//! ```
//!
//! The result is a [`BootOutcome`] whose anchor the binary waits on.

mod tasks;
mod types;

use crate::config::{Layout, ServiceConfig, ServiceKind};
use crate::desktop::DesktopOutcome;
use crate::identity::{AccountOps, IdentityReport, SystemAccountOps};
use crate::pipeline::{BoxedTask, ExecutionPlan, PipelineBuilder, PipelineExecutor, PipelineMetrics, Stage};
use crate::session::ProvisionOutcome;
use crate::supervisor::{Anchor, ProcessLauncher, ServiceHandle, ServiceLauncher, ServiceSupervisor, ServiceTable};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

use tasks::{BootCtx, DesktopSessionTask, IdentityRemapTask, ServiceStartTask, SessionScriptTask};
use types::BootContext;

// ============================================================================
// EXECUTION PLAN
// ============================================================================

/// Get execution plan for this configuration.
pub(crate) fn execution_plan(config: &ServiceConfig) -> ExecutionPlan<BootCtx> {
    let desktop = config.is_enabled(ServiceKind::Desktop);

    let mut stages: Vec<Stage<BoxedTask<BootCtx>>> = vec![Stage::sequential(
        "identity",
        vec![Box::new(IdentityRemapTask)],
    )];
    if desktop {
        stages.push(Stage::sequential(
            "session",
            vec![Box::new(SessionScriptTask)],
        ));
    }
    stages.push(Stage::sequential(
        "services",
        vec![Box::new(ServiceStartTask)],
    ));
    if desktop {
        stages.push(Stage::sequential(
            "desktop",
            vec![Box::new(DesktopSessionTask)],
        ));
    }

    ExecutionPlan::new(stages)
}

/// Everything a successful boot produced.
pub struct BootOutcome {
    pub services: ServiceTable,
    pub anchor: Anchor,
    /// Started services other than the anchor.
    pub background: Vec<Box<dyn ServiceHandle>>,
    pub identity: Option<IdentityReport>,
    pub session_script: Option<ProvisionOutcome>,
    pub desktop: Option<DesktopOutcome>,
    pub metrics: PipelineMetrics,
}

impl BootOutcome {
    /// Wait on the anchor, then stop the remaining services.
    ///
    /// Returns the container's exit code.
    pub async fn run_until_exit<F>(self, shutdown: F) -> i32
    where
        F: Future<Output = ()>,
    {
        let BootOutcome {
            anchor,
            mut background,
            ..
        } = self;

        let code = anchor.wait(shutdown).await;

        for handle in &mut background {
            if let Err(e) = handle.stop() {
                tracing::warn!(service = %handle.name(), error = %e, "Failed to stop service");
            }
        }
        code
    }
}

/// Runs the boot sequence.
///
/// # Example
///
/// ```ignore
/// let outcome = Orchestrator::new(ServiceConfig::from_process_env(), Layout::default())
///     .boot()
///     .await?;
/// let code = outcome.run_until_exit(shutdown_signal()).await;
/// ```
pub struct Orchestrator {
    config: ServiceConfig,
    layout: Layout,
    accounts: Arc<dyn AccountOps>,
    launcher: Arc<dyn ServiceLauncher>,
}

impl Orchestrator {
    pub fn new(config: ServiceConfig, layout: Layout) -> Self {
        Self {
            config,
            layout,
            accounts: Arc::new(SystemAccountOps),
            launcher: Arc::new(ProcessLauncher),
        }
    }

    pub fn with_accounts(mut self, accounts: Arc<dyn AccountOps>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ServiceLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Run every stage of the plan.
    ///
    /// Fails only when a required background service cannot start.
    pub async fn boot(self) -> ToadboxResult<BootOutcome> {
        let Orchestrator {
            config,
            layout,
            accounts,
            launcher,
        } = self;

        tracing::info!(
            ssh = config.enable_ssh,
            docker = config.enable_docker,
            desktop = config.enable_rdp,
            backend = ?config.desktop_backend,
            "Booting container services"
        );

        let plan = execution_plan(&config);
        let supervisor = ServiceSupervisor::new(&config, launcher);
        let ctx = Arc::new(Mutex::new(BootContext::new(
            config, layout, accounts, supervisor,
        )));

        let pipeline = PipelineBuilder::from_plan(plan);
        let metrics = PipelineExecutor::execute(pipeline, Arc::clone(&ctx)).await?;
        metrics.log_stages();
        if let Some(ms) = metrics.task_duration_ms("identity_remap") {
            tracing::debug!(duration_ms = ms as u64, "Identity remap took");
        }

        let mut ctx = ctx.lock().await;
        let supervisor = ctx
            .supervisor
            .take()
            .ok_or_else(|| ToadboxError::Internal("supervisor was not returned".into()))?;
        let (services, background, anchor) = supervisor.into_parts();

        tracing::info!(
            running = ?services.running(),
            anchor = ?anchor,
            "Boot complete"
        );

        Ok(BootOutcome {
            services,
            anchor,
            background,
            identity: ctx.identity.take(),
            session_script: ctx.session_script.take(),
            desktop: ctx.desktop.take(),
            metrics,
        })
    }
}
