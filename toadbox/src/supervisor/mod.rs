//! Service supervision.
//!
//! Starts every enabled background service, tracks each one in a
//! [`ServiceTable`], and owns the [`Anchor`] that keeps the container alive.
//!
//! ## Architecture
//!
//! - **ServiceLauncher**: spawning operations (creates a `ServiceHandle`)
//! - **ServiceHandle**: runtime operations on a started process (wait, stop)
//! - **ServiceSupervisor**: policy; decides what starts, what a failure means
//!   and which process anchors the container
//!
//! Background service failures are fatal: an enabled service that cannot
//! start means the image is broken, so boot aborts and the services already
//! started are stopped. The desktop is the exception; its failures are
//! handled by the [`crate::desktop`] fallback chain and never abort boot.

mod anchor;
mod handler;
mod record;
mod spawn;
mod spec;

pub use anchor::{Anchor, shutdown_signal};
pub use handler::ServiceHandle;
pub use record::{ServiceRecord, ServiceState, ServiceTable};
pub use spawn::{ProcessHandle, ProcessLauncher};
pub use spec::{CommandSpec, ServiceSpec};

use crate::config::{Layout, ServiceConfig, ServiceKind};
use crate::desktop::{DesktopOutcome, DesktopSessionLauncher};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

/// What happened to a process during its start window.
pub enum LaunchResult {
    /// Still alive when the window closed.
    Running(Box<dyn ServiceHandle>),
    /// Exited inside the window with this code. A failed start unless the
    /// spec `daemonizes` and the code is zero.
    Exited(i32),
}

impl std::fmt::Debug for LaunchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchResult::Running(handle) => write!(f, "Running({})", handle.name()),
            LaunchResult::Exited(code) => write!(f, "Exited({})", code),
        }
    }
}

/// Trait for starting service processes.
#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    /// Run the spec's preparation steps, spawn it, and observe it for `window`.
    async fn launch(&self, spec: &ServiceSpec, window: Duration) -> ToadboxResult<LaunchResult>;
}

pub struct ServiceSupervisor {
    launcher: Arc<dyn ServiceLauncher>,
    table: ServiceTable,
    handles: Vec<(ServiceKind, Box<dyn ServiceHandle>)>,
    anchor: Option<Anchor>,
}

impl ServiceSupervisor {
    pub fn new(config: &ServiceConfig, launcher: Arc<dyn ServiceLauncher>) -> Self {
        Self {
            launcher,
            table: ServiceTable::from_config(config),
            handles: Vec::new(),
            anchor: None,
        }
    }

    pub fn table(&self) -> &ServiceTable {
        &self.table
    }

    /// Start ssh and docker if enabled; report the desktop if disabled.
    ///
    /// On the first failed start, every service started so far is stopped
    /// and the error is returned.
    pub async fn start_background(
        &mut self,
        config: &ServiceConfig,
        layout: &Layout,
    ) -> ToadboxResult<()> {
        for kind in ServiceKind::ALL {
            if !config.is_enabled(kind) {
                tracing::info!(service = %kind, "Service disabled, not starting");
                continue;
            }
            let spec = match kind {
                ServiceKind::Ssh => ServiceSpec::ssh(config, layout),
                ServiceKind::Docker => ServiceSpec::docker(layout),
                // Started through the desktop hand-off.
                ServiceKind::Desktop => continue,
            };

            if let Err(e) = self.start(spec, config.service_start_grace()).await {
                tracing::error!(service = %kind, error = %e, "Required service failed to start");
                self.abort();
                return Err(e);
            }
        }
        Ok(())
    }

    async fn start(&mut self, spec: ServiceSpec, grace: Duration) -> ToadboxResult<()> {
        let kind = spec.kind;
        self.table.transition(kind, ServiceState::Starting)?;
        tracing::info!(service = %kind, command = %spec.command.display(), "Starting service");

        let failure = match self.launcher.launch(&spec, grace).await {
            Ok(LaunchResult::Running(handle)) => {
                self.table.set_pid(kind, handle.pid());
                self.table.transition(kind, ServiceState::Running)?;
                tracing::info!(service = %kind, pid = ?handle.pid(), "Service running");
                self.handles.push((kind, handle));
                return Ok(());
            }
            Ok(LaunchResult::Exited(code)) if spec.started_on_exit(code) => {
                self.table.transition(kind, ServiceState::Running)?;
                self.table.set_detail(kind, "daemonized");
                tracing::info!(service = %kind, "Service daemonized itself");
                return Ok(());
            }
            Ok(LaunchResult::Exited(code)) => ToadboxError::service(
                &spec.name,
                format!("exited with code {} during startup", code),
            ),
            Err(e) => e,
        };

        self.table.transition(kind, ServiceState::Failed)?;
        self.table.set_detail(kind, failure.to_string());
        Err(failure)
    }

    /// Pass control to the desktop launcher; its outcome decides the anchor.
    ///
    /// Without the desktop enabled, the anchor is the keep-alive wait.
    pub async fn hand_off_desktop(
        &mut self,
        desktop: &DesktopSessionLauncher<'_>,
    ) -> ToadboxResult<Option<DesktopOutcome>> {
        if !self.table.get(ServiceKind::Desktop).is_some_and(|r| r.enabled) {
            self.anchor = Some(Anchor::KeepAlive);
            return Ok(None);
        }

        self.table
            .transition(ServiceKind::Desktop, ServiceState::Starting)?;
        let launch = desktop.launch(self.launcher.as_ref()).await;

        match launch.outcome {
            DesktopOutcome::Degraded => {
                self.table
                    .transition(ServiceKind::Desktop, ServiceState::Failed)?;
                self.table
                    .set_detail(ServiceKind::Desktop, "primary and fallback sessions failed");
            }
            outcome => {
                if let Anchor::Process(handle) = &launch.anchor {
                    self.table.set_pid(ServiceKind::Desktop, handle.pid());
                }
                self.table
                    .transition(ServiceKind::Desktop, ServiceState::Running)?;
                self.table
                    .set_detail(ServiceKind::Desktop, outcome.as_str());
            }
        }

        self.handles.extend(
            launch
                .companions
                .into_iter()
                .map(|handle| (ServiceKind::Desktop, handle)),
        );
        self.anchor = Some(launch.anchor);
        Ok(Some(launch.outcome))
    }

    /// Stop every started service (best-effort) and mark it failed.
    fn abort(&mut self) {
        for (kind, mut handle) in self.handles.drain(..) {
            if let Err(e) = handle.stop() {
                tracing::warn!(service = %handle.name(), error = %e, "Failed to stop service during abort");
            }
            if self.table.state(kind) == ServiceState::Running
                && let Err(e) = self.table.transition(kind, ServiceState::Failed)
            {
                tracing::warn!(service = %kind, error = %e, "Failed to record aborted service");
            }
            self.table.set_detail(kind, "stopped: boot aborted");
        }
    }

    /// Final table, background handles and the anchor (keep-alive if unset).
    pub fn into_parts(self) -> (ServiceTable, Vec<Box<dyn ServiceHandle>>, Anchor) {
        (
            self.table,
            self.handles.into_iter().map(|(_, handle)| handle).collect(),
            self.anchor.unwrap_or(Anchor::KeepAlive),
        )
    }
}
