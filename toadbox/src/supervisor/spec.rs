//! Launch descriptions for supervised services.

use crate::config::{AuthMode, Layout, ServiceConfig, ServiceKind};
use crate::constants::{paths, ports};
use crate::identity::AccountIds;
use std::path::PathBuf;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: &str) -> Self {
        Self::new("sh", ["-c", script])
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Everything needed to launch one service process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Process name used in logs and handles (e.g. `sshd`).
    pub name: String,
    pub kind: ServiceKind,
    pub command: CommandSpec,
    /// Commands that must succeed before the service is spawned.
    pub prepare: Vec<CommandSpec>,
    pub env: Vec<(String, String)>,
    /// Run as this account instead of the orchestrator's identity.
    pub run_as: Option<AccountIds>,
    /// Append stdout/stderr here; discarded when `None`.
    pub log_file: Option<PathBuf>,
    /// The program forks into the background and its launcher exits 0.
    /// Otherwise any exit inside the start window is a failed start.
    pub daemonizes: bool,
}

impl ServiceSpec {
    pub fn new(name: &str, kind: ServiceKind, command: CommandSpec) -> Self {
        Self {
            name: name.to_string(),
            kind,
            command,
            prepare: Vec::new(),
            env: Vec::new(),
            run_as: None,
            log_file: None,
            daemonizes: false,
        }
    }

    pub fn prepare(mut self, step: CommandSpec) -> Self {
        self.prepare.push(step);
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    pub fn run_as(mut self, ids: Option<AccountIds>) -> Self {
        self.run_as = ids;
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    pub fn daemonizes(mut self) -> Self {
        self.daemonizes = true;
        self
    }

    /// Whether an exit with `code` inside the start window counts as started.
    pub fn started_on_exit(&self, code: i32) -> bool {
        self.daemonizes && code == 0
    }

    /// OpenSSH daemon in the foreground, host keys generated on first boot.
    pub fn ssh(config: &ServiceConfig, layout: &Layout) -> Self {
        let password_auth = match config.auth_mode {
            AuthMode::Password => "PasswordAuthentication=yes",
            AuthMode::None => "PasswordAuthentication=no",
        };
        Self::new(
            "sshd",
            ServiceKind::Ssh,
            CommandSpec::new(
                "sshd",
                [
                    "-D".to_string(),
                    "-e".to_string(),
                    "-p".to_string(),
                    ports::SSH.to_string(),
                    "-o".to_string(),
                    password_auth.to_string(),
                ],
            ),
        )
        .prepare(CommandSpec::new("mkdir", ["-p", paths::SSHD_RUNTIME_DIR]))
        .prepare(CommandSpec::new("ssh-keygen", ["-A"]))
        .log_file(layout.service_log("sshd"))
    }

    /// Docker daemon listening on the default socket.
    pub fn docker(layout: &Layout) -> Self {
        Self::new(
            "dockerd",
            ServiceKind::Docker,
            CommandSpec::new("dockerd", [format!("--host={}", paths::DOCKER_SOCKET)]),
        )
        .log_file(layout.service_log("dockerd"))
    }
}
