//! Shared state for the boot pipeline.

use crate::config::{Layout, ServiceConfig};
use crate::desktop::DesktopOutcome;
use crate::identity::{AccountOps, IdentityReport};
use crate::session::ProvisionOutcome;
use crate::supervisor::ServiceSupervisor;
use std::sync::Arc;

/// Shared boot pipeline context.
///
/// Inputs are set once at construction; each task fills in its own output.
pub struct BootContext {
    pub config: ServiceConfig,
    pub layout: Layout,
    pub accounts: Arc<dyn AccountOps>,
    /// Taken by the service tasks while they run, then put back.
    pub supervisor: Option<ServiceSupervisor>,
    pub identity: Option<IdentityReport>,
    pub session_script: Option<ProvisionOutcome>,
    pub desktop: Option<DesktopOutcome>,
}

impl BootContext {
    pub fn new(
        config: ServiceConfig,
        layout: Layout,
        accounts: Arc<dyn AccountOps>,
        supervisor: ServiceSupervisor,
    ) -> Self {
        Self {
            config,
            layout,
            accounts,
            supervisor: Some(supervisor),
            identity: None,
            session_script: None,
            desktop: None,
        }
    }
}
