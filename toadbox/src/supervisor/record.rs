//! Per-service state tracking.
//!
//! Records are created from the configuration when the orchestrator starts,
//! changed only by the supervisor, and never persisted.

use crate::config::{ServiceConfig, ServiceKind};
use serde::Serialize;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

/// Lifecycle state of a supervised service.
///
/// ```text
/// Disabled                          (terminal for disabled services)
/// Disabled → Starting → Running     (terminal while the process lives)
///                    ↘     ↓
///                      Failed       (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Disabled,
    Starting,
    Running,
    Failed,
}

impl ServiceState {
    pub fn can_transition_to(&self, next: ServiceState) -> bool {
        matches!(
            (self, next),
            (ServiceState::Disabled, ServiceState::Starting)
                | (ServiceState::Starting, ServiceState::Running)
                | (ServiceState::Starting, ServiceState::Failed)
                | (ServiceState::Running, ServiceState::Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    pub kind: ServiceKind,
    pub enabled: bool,
    pub state: ServiceState,
    pub pid: Option<u32>,
    /// Failure reason or launch variant, for diagnostics.
    pub detail: Option<String>,
}

/// The set of service records for one boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceTable {
    records: Vec<ServiceRecord>,
}

impl ServiceTable {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let records = ServiceKind::ALL
            .iter()
            .map(|&kind| ServiceRecord {
                kind,
                enabled: config.is_enabled(kind),
                state: ServiceState::Disabled,
                pid: None,
                detail: None,
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[ServiceRecord] {
        &self.records
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&ServiceRecord> {
        self.records.iter().find(|record| record.kind == kind)
    }

    pub fn state(&self, kind: ServiceKind) -> ServiceState {
        self.get(kind)
            .map(|record| record.state)
            .unwrap_or(ServiceState::Disabled)
    }

    /// Services currently marked running.
    pub fn running(&self) -> Vec<ServiceKind> {
        self.records
            .iter()
            .filter(|record| record.state == ServiceState::Running)
            .map(|record| record.kind)
            .collect()
    }

    pub fn transition(&mut self, kind: ServiceKind, next: ServiceState) -> ToadboxResult<()> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.kind == kind)
            .ok_or_else(|| ToadboxError::Internal(format!("no record for {}", kind)))?;

        if next == ServiceState::Starting && !record.enabled {
            return Err(ToadboxError::InvalidState(format!(
                "cannot start disabled service {}",
                kind
            )));
        }
        if !record.state.can_transition_to(next) {
            return Err(ToadboxError::InvalidState(format!(
                "service {}: {:?} -> {:?} is not allowed",
                kind, record.state, next
            )));
        }

        tracing::debug!(service = %kind, from = ?record.state, to = ?next, "Service state change");
        record.state = next;
        Ok(())
    }

    pub fn set_pid(&mut self, kind: ServiceKind, pid: Option<u32>) {
        if let Some(record) = self.records.iter_mut().find(|record| record.kind == kind) {
            record.pid = pid;
        }
    }

    pub fn set_detail(&mut self, kind: ServiceKind, detail: impl Into<String>) {
        if let Some(record) = self.records.iter_mut().find(|record| record.kind == kind) {
            record.detail = Some(detail.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ssh: bool, docker: bool, rdp: bool) -> ServiceTable {
        ServiceTable::from_config(&ServiceConfig {
            enable_ssh: ssh,
            enable_docker: docker,
            enable_rdp: rdp,
            ..Default::default()
        })
    }

    #[test]
    fn test_records_start_disabled() {
        let table = table(true, false, true);
        assert_eq!(table.records().len(), 3);
        assert!(table.records().iter().all(|r| r.state == ServiceState::Disabled));
        assert!(table.get(ServiceKind::Ssh).unwrap().enabled);
        assert!(!table.get(ServiceKind::Docker).unwrap().enabled);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut table = table(true, false, false);
        table.transition(ServiceKind::Ssh, ServiceState::Starting).unwrap();
        table.transition(ServiceKind::Ssh, ServiceState::Running).unwrap();
        assert_eq!(table.running(), vec![ServiceKind::Ssh]);
        table.transition(ServiceKind::Ssh, ServiceState::Failed).unwrap();
        assert!(table.running().is_empty());
    }

    #[test]
    fn test_disabled_service_cannot_start() {
        let mut table = table(false, false, false);
        let err = table
            .transition(ServiceKind::Docker, ServiceState::Starting)
            .unwrap_err();
        assert!(matches!(err, ToadboxError::InvalidState(_)));
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut table = table(true, false, false);
        table.transition(ServiceKind::Ssh, ServiceState::Starting).unwrap();
        table.transition(ServiceKind::Ssh, ServiceState::Failed).unwrap();
        assert!(table.transition(ServiceKind::Ssh, ServiceState::Running).is_err());
        assert!(table.transition(ServiceKind::Ssh, ServiceState::Starting).is_err());
    }

    #[test]
    fn test_skipping_starting_is_rejected() {
        let mut table = table(true, false, false);
        assert!(table.transition(ServiceKind::Ssh, ServiceState::Running).is_err());
    }
}
