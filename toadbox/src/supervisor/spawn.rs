//! Subprocess spawning for supervised services.

use super::{LaunchResult, ServiceHandle, ServiceLauncher, ServiceSpec};
use crate::supervisor::spec::CommandSpec;
use crate::util::{exit_code, find_binary};
use async_trait::async_trait;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs::OpenOptions;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

/// Launches services as child processes of the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl ServiceLauncher for ProcessLauncher {
    async fn launch(&self, spec: &ServiceSpec, window: Duration) -> ToadboxResult<LaunchResult> {
        for step in &spec.prepare {
            run_prepare(spec, step).await?;
        }

        let mut child = spawn_subprocess(spec, &spec.command)?;
        let pid = child.id();
        tracing::debug!(service = %spec.name, pid = ?pid, "Spawned service process");

        // A process that exits inside the window reports its own verdict.
        match tokio::time::timeout(window, child.wait()).await {
            Ok(Ok(status)) => {
                let code = exit_code(status);
                tracing::debug!(service = %spec.name, code, "Service process exited inside start window");
                Ok(LaunchResult::Exited(code))
            }
            Ok(Err(e)) => Err(ToadboxError::service(
                &spec.name,
                format!("failed to wait for process: {}", e),
            )),
            Err(_) => Ok(LaunchResult::Running(Box::new(ProcessHandle {
                name: spec.name.clone(),
                pid,
                child,
            }))),
        }
    }
}

/// Run one preparation command to completion.
async fn run_prepare(spec: &ServiceSpec, step: &CommandSpec) -> ToadboxResult<()> {
    tracing::debug!(service = %spec.name, command = %step.display(), "Running preparation step");
    let mut child = spawn_subprocess(spec, step)?;
    let status = child.wait().await.map_err(|e| {
        ToadboxError::service(&spec.name, format!("{}: {}", step.display(), e))
    })?;

    if !status.success() {
        return Err(ToadboxError::service(
            &spec.name,
            format!("{} exited with code {}", step.display(), exit_code(status)),
        ));
    }
    Ok(())
}

/// Spawns `command` with the spec's environment, identity and log redirection.
///
/// stdin is always null so services never compete with the container's
/// console.
fn spawn_subprocess(spec: &ServiceSpec, command: &CommandSpec) -> ToadboxResult<Child> {
    let binary = find_binary(&command.program)
        .map_err(|e| ToadboxError::service(&spec.name, e.to_string()))?;

    let mut cmd = Command::new(&binary);
    cmd.args(&command.args);
    cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    if let Some(ids) = spec.run_as {
        cmd.uid(ids.uid);
        cmd.gid(ids.gid);
    }

    cmd.stdin(Stdio::null());
    let (stdout, stderr) = log_stdio(spec);
    cmd.stdout(stdout);
    cmd.stderr(stderr);

    cmd.spawn().map_err(|e| {
        let err_msg = format!("Failed to spawn {}: {}", binary.display(), e);
        tracing::error!(service = %spec.name, "{}", err_msg);
        ToadboxError::service(&spec.name, err_msg)
    })
}

/// stdout/stderr for a service: its log file in append mode, or null.
fn log_stdio(spec: &ServiceSpec) -> (Stdio, Stdio) {
    let Some(path) = &spec.log_file else {
        return (Stdio::null(), Stdio::null());
    };

    let opened = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(path))
        .and_then(|file| Ok((file.try_clone()?, file)));

    match opened {
        Ok((out, err)) => (Stdio::from(out), Stdio::from(err)),
        Err(e) => {
            tracing::warn!(
                service = %spec.name,
                path = %path.display(),
                error = %e,
                "Cannot open service log, discarding output"
            );
            (Stdio::null(), Stdio::null())
        }
    }
}

/// Handle over a spawned child process.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    pid: Option<u32>,
    child: Child,
}

#[async_trait]
impl ServiceHandle for ProcessHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn wait(&mut self) -> ToadboxResult<i32> {
        let status = self.child.wait().await.map_err(|e| {
            ToadboxError::service(&self.name, format!("failed to wait for process: {}", e))
        })?;
        Ok(exit_code(status))
    }

    fn stop(&mut self) -> ToadboxResult<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        if !self.is_running() {
            return Ok(());
        }
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| {
            ToadboxError::service(&self.name, format!("failed to signal pid {}: {}", pid, e))
        })
    }
}
