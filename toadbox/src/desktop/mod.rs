//! Graphical session launch with degradation.
//!
//! The desktop chain tries the primary session (window manager via the
//! provisioned session script), then exactly one fallback session (a bare
//! terminal), then gives up and leaves the container on a keep-alive wait.
//! None of these outcomes abort boot.
//!
//! With the RDP backend the xrdp gateway is started once a display is up.

use crate::config::{AuthMode, DesktopBackend, Layout, ServiceConfig, ServiceKind};
use crate::constants::{account, desktop};
use crate::identity::AccountIds;
use crate::supervisor::{Anchor, CommandSpec, LaunchResult, ServiceHandle, ServiceLauncher, ServiceSpec};
use serde::Serialize;

/// Which session variant ended up on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DesktopOutcome {
    Primary,
    Fallback,
    Degraded,
}

impl DesktopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesktopOutcome::Primary => "primary",
            DesktopOutcome::Fallback => "fallback",
            DesktopOutcome::Degraded => "degraded",
        }
    }
}

/// Session variants, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionVariant {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAttempt {
    pub variant: SessionVariant,
    /// Why the attempt failed; `None` on success.
    pub error: Option<String>,
}

/// Result of the desktop chain.
pub struct DesktopLaunch {
    pub outcome: DesktopOutcome,
    pub anchor: Anchor,
    /// Gateway processes started alongside the display.
    pub companions: Vec<Box<dyn ServiceHandle>>,
    pub attempts: Vec<SessionAttempt>,
}

pub struct DesktopSessionLauncher<'a> {
    config: &'a ServiceConfig,
    layout: &'a Layout,
    run_as: Option<AccountIds>,
}

impl<'a> DesktopSessionLauncher<'a> {
    /// `run_as` is the account's ids after the identity remap.
    pub fn new(config: &'a ServiceConfig, layout: &'a Layout, run_as: Option<AccountIds>) -> Self {
        Self {
            config,
            layout,
            run_as,
        }
    }

    pub async fn launch(&self, launcher: &dyn ServiceLauncher) -> DesktopLaunch {
        let mut attempts = Vec::with_capacity(2);

        let (outcome, anchor) = match self.attempt(launcher, SessionVariant::Primary).await {
            Ok(anchor) => {
                attempts.push(SessionAttempt {
                    variant: SessionVariant::Primary,
                    error: None,
                });
                (DesktopOutcome::Primary, anchor)
            }
            Err(primary_err) => {
                tracing::warn!(error = %primary_err, "Primary desktop session failed, trying fallback session");
                attempts.push(SessionAttempt {
                    variant: SessionVariant::Primary,
                    error: Some(primary_err),
                });

                match self.attempt(launcher, SessionVariant::Fallback).await {
                    Ok(anchor) => {
                        attempts.push(SessionAttempt {
                            variant: SessionVariant::Fallback,
                            error: None,
                        });
                        (DesktopOutcome::Fallback, anchor)
                    }
                    Err(fallback_err) => {
                        tracing::error!(
                            error = %fallback_err,
                            "Fallback desktop session failed; desktop unavailable, keeping container alive"
                        );
                        attempts.push(SessionAttempt {
                            variant: SessionVariant::Fallback,
                            error: Some(fallback_err),
                        });
                        (DesktopOutcome::Degraded, Anchor::KeepAlive)
                    }
                }
            }
        };

        let companions = match (outcome, self.config.desktop_backend) {
            (DesktopOutcome::Degraded, _) | (_, DesktopBackend::Vnc) => Vec::new(),
            (_, DesktopBackend::Rdp) => self.start_gateway(launcher).await,
        };

        tracing::info!(
            outcome = outcome.as_str(),
            port = self.config.desktop_backend.port(),
            "Desktop session settled"
        );

        DesktopLaunch {
            outcome,
            anchor,
            companions,
            attempts,
        }
    }

    async fn attempt(
        &self,
        launcher: &dyn ServiceLauncher,
        variant: SessionVariant,
    ) -> Result<Anchor, String> {
        let spec = self.session_spec(variant);
        tracing::info!(session = ?variant, command = %spec.command.display(), "Starting desktop session");

        match launcher
            .launch(&spec, self.config.desktop_start_timeout())
            .await
        {
            Ok(LaunchResult::Running(handle)) => Ok(Anchor::Process(handle)),
            Ok(LaunchResult::Exited(code)) if spec.started_on_exit(code) => {
                tracing::info!(session = ?variant, "Display server daemonized itself");
                Ok(Anchor::KeepAlive)
            }
            // A foreground server that exits inside the window took its
            // session down with it, whatever the status.
            Ok(LaunchResult::Exited(code)) => Err(format!(
                "{} exited with code {} during startup",
                spec.name, code
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Start the RDP gateway. Failures only cost remote access and are logged.
    async fn start_gateway(&self, launcher: &dyn ServiceLauncher) -> Vec<Box<dyn ServiceHandle>> {
        let mut handles = Vec::new();
        for spec in self.gateway_specs() {
            match launcher
                .launch(&spec, self.config.service_start_grace())
                .await
            {
                Ok(LaunchResult::Running(handle)) => handles.push(handle),
                Ok(LaunchResult::Exited(code)) if spec.started_on_exit(code) => {}
                Ok(LaunchResult::Exited(code)) => {
                    tracing::warn!(service = %spec.name, code, "RDP gateway failed to start");
                    break;
                }
                Err(e) => {
                    tracing::warn!(service = %spec.name, error = %e, "RDP gateway failed to start");
                    break;
                }
            }
        }
        handles
    }

    /// VNC display server for `variant`.
    pub fn session_spec(&self, variant: SessionVariant) -> ServiceSpec {
        let (name, xstartup) = match variant {
            SessionVariant::Primary => (
                "vncserver",
                self.layout.session_script.display().to_string(),
            ),
            SessionVariant::Fallback => {
                ("vncserver-fallback", desktop::FALLBACK_SESSION.to_string())
            }
        };

        let mut args = vec![
            self.layout.display.clone(),
            "-fg".to_string(),
            "-localhost".to_string(),
            "no".to_string(),
            "-geometry".to_string(),
            desktop::GEOMETRY.to_string(),
            "-depth".to_string(),
            desktop::DEPTH.to_string(),
            "-xstartup".to_string(),
            xstartup,
        ];

        if self.config.auth_mode == AuthMode::None {
            args.extend(["-SecurityTypes".to_string(), "None".to_string()]);
        }

        let spec = ServiceSpec::new(name, ServiceKind::Desktop, CommandSpec::new("vncserver", args))
            .env("HOME", self.layout.home_dir.display().to_string())
            .env("USER", self.layout.account.clone())
            .env("DISPLAY", self.layout.display.clone())
            .run_as(self.run_as)
            .log_file(self.layout.service_log(name));

        match self.config.auth_mode {
            AuthMode::Password => spec.prepare(self.password_step()),
            AuthMode::None => spec,
        }
    }

    /// Writes the VNC password file unless one already exists.
    fn password_step(&self) -> CommandSpec {
        let vnc_dir = self.layout.home_dir.join(".vnc");
        let passwd = vnc_dir.join("passwd");
        CommandSpec::shell(&format!(
            "[ -f '{passwd}' ] || {{ mkdir -p '{dir}' && echo '{password}' | vncpasswd -f > '{passwd}' && chmod 600 '{passwd}'; }}",
            passwd = passwd.display(),
            dir = vnc_dir.display(),
            password = account::DEFAULT_PASSWORD,
        ))
    }

    /// xrdp session manager, then the RDP front end, both as root.
    pub fn gateway_specs(&self) -> [ServiceSpec; 2] {
        [
            ServiceSpec::new(
                "xrdp-sesman",
                ServiceKind::Desktop,
                CommandSpec::new("xrdp-sesman", ["--nodaemon"]),
            )
            .log_file(self.layout.service_log("xrdp-sesman")),
            ServiceSpec::new(
                "xrdp",
                ServiceKind::Desktop,
                CommandSpec::new("xrdp", ["--nodaemon"]),
            )
            .log_file(self.layout.service_log("xrdp")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use toadbox_shared::errors::{ToadboxError, ToadboxResult};

    /// Answers each launch by spec name; unknown names run.
    #[derive(Default)]
    struct ScriptedLauncher {
        exited: Vec<(&'static str, i32)>,
        unspawnable: Vec<&'static str>,
        launched: Mutex<Vec<String>>,
    }

    struct Idle(String);

    #[async_trait]
    impl ServiceHandle for Idle {
        fn name(&self) -> &str {
            &self.0
        }
        fn pid(&self) -> Option<u32> {
            Some(7)
        }
        fn is_running(&mut self) -> bool {
            true
        }
        async fn wait(&mut self) -> ToadboxResult<i32> {
            std::future::pending().await
        }
        fn stop(&mut self) -> ToadboxResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl ServiceLauncher for ScriptedLauncher {
        async fn launch(&self, spec: &ServiceSpec, _window: Duration) -> ToadboxResult<LaunchResult> {
            self.launched.lock().unwrap().push(spec.name.clone());
            if self.unspawnable.contains(&spec.name.as_str()) {
                return Err(ToadboxError::service(&spec.name, "binary not found"));
            }
            if let Some((_, code)) = self.exited.iter().find(|(name, _)| *name == spec.name) {
                return Ok(LaunchResult::Exited(*code));
            }
            Ok(LaunchResult::Running(Box::new(Idle(spec.name.clone()))))
        }
    }

    fn desktop_config(backend: DesktopBackend) -> ServiceConfig {
        ServiceConfig {
            enable_rdp: true,
            desktop_backend: backend,
            ..Default::default()
        }
    }

    fn launched(launcher: &ScriptedLauncher) -> Vec<String> {
        launcher.launched.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_primary_success_anchors_display() {
        let config = desktop_config(DesktopBackend::Vnc);
        let layout = Layout::default();
        let launcher = ScriptedLauncher::default();

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launch.outcome, DesktopOutcome::Primary);
        assert!(matches!(launch.anchor, Anchor::Process(_)));
        assert!(launch.companions.is_empty());
        assert_eq!(launched(&launcher), vec!["vncserver"]);
    }

    #[tokio::test]
    async fn test_fallback_runs_exactly_once() {
        let config = desktop_config(DesktopBackend::Vnc);
        let layout = Layout::default();
        let launcher = ScriptedLauncher {
            exited: vec![("vncserver", 1)],
            ..Default::default()
        };

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launch.outcome, DesktopOutcome::Fallback);
        assert_eq!(launched(&launcher), vec!["vncserver", "vncserver-fallback"]);
        assert!(launch.attempts[0].error.is_some());
        assert!(launch.attempts[1].error.is_none());
    }

    #[tokio::test]
    async fn test_total_failure_degrades_to_keep_alive() {
        let config = desktop_config(DesktopBackend::Rdp);
        let layout = Layout::default();
        let launcher = ScriptedLauncher {
            exited: vec![("vncserver", 1)],
            unspawnable: vec!["vncserver-fallback"],
            ..Default::default()
        };

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launch.outcome, DesktopOutcome::Degraded);
        assert!(launch.anchor.is_keep_alive());
        // No gateway in front of a missing display.
        assert_eq!(launched(&launcher), vec!["vncserver", "vncserver-fallback"]);
        assert_eq!(launch.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_clean_exit_of_primary_falls_back() {
        // vncserver -fg exits 0 once the session script dies.
        let config = desktop_config(DesktopBackend::Vnc);
        let layout = Layout::default();
        let launcher = ScriptedLauncher {
            exited: vec![("vncserver", 0)],
            ..Default::default()
        };

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launch.outcome, DesktopOutcome::Fallback);
        assert!(matches!(launch.anchor, Anchor::Process(_)));
        assert_eq!(launched(&launcher), vec!["vncserver", "vncserver-fallback"]);
        assert!(
            launch.attempts[0]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("code 0"))
        );
    }

    #[tokio::test]
    async fn test_clean_exit_of_both_sessions_degrades() {
        let config = desktop_config(DesktopBackend::Vnc);
        let layout = Layout::default();
        let launcher = ScriptedLauncher {
            exited: vec![("vncserver", 0), ("vncserver-fallback", 0)],
            ..Default::default()
        };

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launch.outcome, DesktopOutcome::Degraded);
        assert!(launch.anchor.is_keep_alive());
    }

    #[tokio::test]
    async fn test_rdp_gateway_after_display() {
        let config = desktop_config(DesktopBackend::Rdp);
        let layout = Layout::default();
        let launcher = ScriptedLauncher::default();

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launched(&launcher), vec!["vncserver", "xrdp-sesman", "xrdp"]);
        assert_eq!(launch.companions.len(), 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_not_fatal() {
        let config = desktop_config(DesktopBackend::Rdp);
        let layout = Layout::default();
        let launcher = ScriptedLauncher {
            unspawnable: vec!["xrdp-sesman"],
            ..Default::default()
        };

        let launch = DesktopSessionLauncher::new(&config, &layout, None)
            .launch(&launcher)
            .await;

        assert_eq!(launch.outcome, DesktopOutcome::Primary);
        assert!(launch.companions.is_empty());
        assert_eq!(launched(&launcher), vec!["vncserver", "xrdp-sesman"]);
    }

    #[test]
    fn test_session_specs() {
        let layout = Layout::default();
        let config = desktop_config(DesktopBackend::Vnc);
        let ids = AccountIds { uid: 1500, gid: 1500 };
        let launcher = DesktopSessionLauncher::new(&config, &layout, Some(ids));

        let primary = launcher.session_spec(SessionVariant::Primary);
        assert_eq!(
            primary.command.display(),
            "vncserver :1 -fg -localhost no -geometry 1920x1080 -depth 24 -xstartup /home/agent/.vnc/xstartup"
        );
        assert_eq!(primary.run_as, Some(ids));
        assert_eq!(primary.prepare.len(), 1);
        assert!(primary.env.contains(&("DISPLAY".to_string(), ":1".to_string())));

        let fallback = launcher.session_spec(SessionVariant::Fallback);
        assert!(fallback.command.display().ends_with("-xstartup /usr/bin/xterm"));

        let open = ServiceConfig {
            auth_mode: AuthMode::None,
            ..config.clone()
        };
        let spec = DesktopSessionLauncher::new(&open, &layout, None).session_spec(SessionVariant::Primary);
        assert!(spec.prepare.is_empty());
        assert!(spec.command.display().ends_with("-SecurityTypes None"));
    }

    #[test]
    fn test_password_step_keeps_existing_password_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::for_home("agent", dir.path());
        let vnc_dir = dir.path().join(".vnc");
        std::fs::create_dir_all(&vnc_dir).unwrap();
        let passwd = vnc_dir.join("passwd");
        std::fs::write(&passwd, b"\x01existing-secret").unwrap();

        let config = desktop_config(DesktopBackend::Vnc);
        let step = DesktopSessionLauncher::new(&config, &layout, None).password_step();
        let status = std::process::Command::new(&step.program)
            .args(&step.args)
            .status()
            .unwrap();

        assert!(status.success());
        assert_eq!(std::fs::read(&passwd).unwrap(), b"\x01existing-secret");
        assert_eq!(std::fs::read_dir(&vnc_dir).unwrap().count(), 1);
    }
}
