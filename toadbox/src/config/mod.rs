//! Boot-time configuration resolution.
//!
//! The container's boot signals are read exactly once, here, and frozen into
//! a [`ServiceConfig`]. Every other component receives that snapshot by
//! reference; nothing else reads the environment.
//!
//! Resolution never fails: unknown or malformed values fall back to the
//! documented defaults (all services off, no identity remap) with a warning.

mod layout;

pub use layout::Layout;

use crate::constants::{env, timing};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Source of raw boot signals.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the orchestrator's own process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| value.to_string())
    }
}

/// Supervisable services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Ssh,
    Docker,
    Desktop,
}

impl ServiceKind {
    /// All services, in start order.
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Ssh, ServiceKind::Docker, ServiceKind::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Ssh => "ssh",
            ServiceKind::Docker => "docker",
            ServiceKind::Desktop => "rdp/vnc",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Password,
    None,
}

/// Which remote-desktop front end the container exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DesktopBackend {
    /// RDP gateway on 3389 in front of the VNC display.
    #[default]
    Rdp,
    /// Bare VNC display on 5901.
    Vnc,
}

impl DesktopBackend {
    pub fn port(&self) -> u16 {
        match self {
            DesktopBackend::Rdp => crate::constants::ports::RDP,
            DesktopBackend::Vnc => crate::constants::ports::VNC,
        }
    }
}

/// Target identity requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdentityTarget {
    pub uid: u32,
    pub gid: u32,
}

/// Immutable configuration snapshot (resolved once at process start).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    pub enable_docker: bool,
    pub enable_ssh: bool,
    pub enable_rdp: bool,
    pub requested_uid: Option<u32>,
    pub requested_gid: Option<u32>,
    pub auth_mode: AuthMode,
    pub desktop_backend: DesktopBackend,
    pub desktop_start_timeout_secs: u64,
    pub service_start_grace_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable_docker: false,
            enable_ssh: false,
            enable_rdp: false,
            requested_uid: None,
            requested_gid: None,
            auth_mode: AuthMode::default(),
            desktop_backend: DesktopBackend::default(),
            desktop_start_timeout_secs: timing::DESKTOP_START_TIMEOUT_SECS,
            service_start_grace_ms: timing::SERVICE_START_GRACE_MS,
        }
    }
}

impl ServiceConfig {
    /// Resolve the snapshot from the process environment.
    pub fn from_process_env() -> Self {
        Self::resolve(&ProcessEnv)
    }

    /// Resolve the snapshot from any signal source.
    pub fn resolve(source: &dyn EnvSource) -> Self {
        let defaults = Self::default();

        let config = Self {
            enable_docker: parse_flag(source, env::ENABLE_DOCKER),
            enable_ssh: parse_flag(source, env::ENABLE_SSH),
            enable_rdp: parse_flag(source, env::ENABLE_RDP),
            requested_uid: parse_id(source, env::PUID),
            requested_gid: parse_id(source, env::PGID),
            auth_mode: parse_choice(
                source,
                env::AUTH_MODE,
                &[("password", AuthMode::Password), ("none", AuthMode::None)],
                defaults.auth_mode,
            ),
            desktop_backend: parse_choice(
                source,
                env::DESKTOP_BACKEND,
                &[("rdp", DesktopBackend::Rdp), ("vnc", DesktopBackend::Vnc)],
                defaults.desktop_backend,
            ),
            desktop_start_timeout_secs: parse_positive(
                source,
                env::DESKTOP_START_TIMEOUT_SECS,
                defaults.desktop_start_timeout_secs,
            ),
            service_start_grace_ms: parse_positive(
                source,
                env::SERVICE_START_GRACE_MS,
                defaults.service_start_grace_ms,
            ),
        };

        if config.requested_uid.is_some() != config.requested_gid.is_some() {
            tracing::warn!(
                puid = ?config.requested_uid,
                pgid = ?config.requested_gid,
                "Only one of PUID/PGID is set; identity remap disabled"
            );
        }

        tracing::debug!(?config, "Resolved boot configuration");
        config
    }

    /// Remap target, present only when both uid and gid were supplied.
    pub fn identity_target(&self) -> Option<IdentityTarget> {
        match (self.requested_uid, self.requested_gid) {
            (Some(uid), Some(gid)) => Some(IdentityTarget { uid, gid }),
            _ => None,
        }
    }

    pub fn is_enabled(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Ssh => self.enable_ssh,
            ServiceKind::Docker => self.enable_docker,
            ServiceKind::Desktop => self.enable_rdp,
        }
    }

    pub fn desktop_start_timeout(&self) -> Duration {
        Duration::from_secs(self.desktop_start_timeout_secs)
    }

    pub fn service_start_grace(&self) -> Duration {
        Duration::from_millis(self.service_start_grace_ms)
    }
}

fn parse_flag(source: &dyn EnvSource, key: &str) -> bool {
    let Some(raw) = source.var(key) else {
        return false;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "" | "0" | "false" | "no" | "off" => false,
        other => {
            tracing::warn!(key, value = other, "Unrecognized boolean value, using false");
            false
        }
    }
}

fn parse_id(source: &dyn EnvSource, key: &str) -> Option<u32> {
    let raw = source.var(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(key, value = trimmed, error = %e, "Malformed identity hint ignored");
            None
        }
    }
}

fn parse_choice<T: Copy>(source: &dyn EnvSource, key: &str, choices: &[(&str, T)], default: T) -> T {
    let Some(raw) = source.var(key) else {
        return default;
    };
    let wanted = raw.trim().to_ascii_lowercase();
    if wanted.is_empty() {
        return default;
    }
    match choices.iter().find(|(name, _)| *name == wanted) {
        Some((_, value)) => *value,
        None => {
            tracing::warn!(key, value = %wanted, "Unrecognized value, using default");
            default
        }
    }
}

fn parse_positive(source: &dyn EnvSource, key: &str, default: u64) -> u64 {
    match source.var(key).map(|raw| raw.trim().parse::<u64>()) {
        None => default,
        Some(Ok(value)) if value > 0 => value,
        Some(_) => {
            tracing::warn!(key, default, "Invalid duration, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(pairs: &[(&str, &str)]) -> ServiceConfig {
        let env: HashMap<&str, &str> = pairs.iter().copied().collect();
        ServiceConfig::resolve(&env)
    }

    #[test]
    fn test_defaults_disable_everything() {
        let config = resolve(&[]);
        assert_eq!(config, ServiceConfig::default());
        assert!(!config.enable_docker && !config.enable_ssh && !config.enable_rdp);
        assert_eq!(config.identity_target(), None);
        assert_eq!(config.desktop_start_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_boolean_spellings() {
        let config = resolve(&[
            ("ENABLE_DOCKER", "TRUE"),
            ("ENABLE_SSH", " yes "),
            ("ENABLE_RDP", "1"),
        ]);
        assert!(config.enable_docker && config.enable_ssh && config.enable_rdp);

        let config = resolve(&[
            ("ENABLE_DOCKER", "off"),
            ("ENABLE_SSH", "maybe"),
            ("ENABLE_RDP", ""),
        ]);
        assert!(!config.enable_docker && !config.enable_ssh && !config.enable_rdp);
    }

    #[test]
    fn test_identity_target_requires_both_ids() {
        let config = resolve(&[("PUID", "1500"), ("PGID", "1500")]);
        assert_eq!(
            config.identity_target(),
            Some(IdentityTarget {
                uid: 1500,
                gid: 1500
            })
        );

        let config = resolve(&[("PUID", "1500")]);
        assert_eq!(config.requested_uid, Some(1500));
        assert_eq!(config.identity_target(), None);
    }

    #[test]
    fn test_malformed_ids_degrade_to_no_remap() {
        let config = resolve(&[("PUID", "-1"), ("PGID", "abc")]);
        assert_eq!(config.requested_uid, None);
        assert_eq!(config.requested_gid, None);
        assert_eq!(config.identity_target(), None);
    }

    #[test]
    fn test_choices_and_durations() {
        let config = resolve(&[
            ("AUTH_MODE", "None"),
            ("DESKTOP_BACKEND", "vnc"),
            ("DESKTOP_START_TIMEOUT_SECS", "3"),
            ("SERVICE_START_GRACE_MS", "0"),
        ]);
        assert_eq!(config.auth_mode, AuthMode::None);
        assert_eq!(config.desktop_backend, DesktopBackend::Vnc);
        assert_eq!(config.desktop_backend.port(), 5901);
        assert_eq!(config.desktop_start_timeout_secs, 3);
        assert_eq!(config.service_start_grace_ms, timing::SERVICE_START_GRACE_MS);

        let config = resolve(&[("DESKTOP_BACKEND", "spice")]);
        assert_eq!(config.desktop_backend, DesktopBackend::Rdp);
    }

    #[test]
    fn test_is_enabled_matches_flags() {
        let config = resolve(&[("ENABLE_DOCKER", "true")]);
        assert!(config.is_enabled(ServiceKind::Docker));
        assert!(!config.is_enabled(ServiceKind::Ssh));
        assert!(!config.is_enabled(ServiceKind::Desktop));
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(resolve(&[("ENABLE_SSH", "true")])).unwrap();
        assert_eq!(json["enable_ssh"], true);
        assert_eq!(json["auth_mode"], "password");
        assert_eq!(json["desktop_backend"], "rdp");
    }
}
