//! The anchor: whatever keeps the container's main process alive.
//!
//! Exactly one anchor exists per boot. It is either the foreground desktop
//! process or, when there is none, an indefinite keep-alive wait. The
//! container lives exactly as long as the anchor wait does.

use super::ServiceHandle;
use std::future::Future;

pub enum Anchor {
    /// Container lifetime follows this process.
    Process(Box<dyn ServiceHandle>),
    /// Block until the container is stopped from outside.
    KeepAlive,
}

impl std::fmt::Debug for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anchor::Process(handle) => f
                .debug_struct("Process")
                .field("name", &handle.name())
                .field("pid", &handle.pid())
                .finish(),
            Anchor::KeepAlive => f.write_str("KeepAlive"),
        }
    }
}

impl Anchor {
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Anchor::KeepAlive)
    }

    /// Block until the anchor ends and return the container's exit code.
    ///
    /// - process exits: its exit code (signal deaths as `128 + signo`)
    /// - `shutdown` completes first: the process is sent SIGTERM, then 0
    pub async fn wait<F>(self, shutdown: F) -> i32
    where
        F: Future<Output = ()>,
    {
        match self {
            Anchor::Process(mut handle) => {
                let name = handle.name().to_string();
                tracing::info!(anchor = %name, pid = ?handle.pid(), "Waiting on anchor process");
                let exited = tokio::select! {
                    result = handle.wait() => Some(result),
                    _ = shutdown => None,
                };
                match exited {
                    Some(Ok(code)) => {
                        tracing::info!(anchor = %name, code, "Anchor process exited");
                        code
                    }
                    Some(Err(e)) => {
                        tracing::error!(anchor = %name, error = %e, "Lost track of anchor process");
                        1
                    }
                    None => {
                        tracing::info!(anchor = %name, "Stop signal received");
                        if let Err(e) = handle.stop() {
                            tracing::warn!(anchor = %name, error = %e, "Failed to stop anchor process");
                        }
                        0
                    }
                }
            }
            Anchor::KeepAlive => {
                tracing::info!("No foreground service; keeping container alive");
                shutdown.await;
                tracing::info!("Stop signal received");
                0
            }
        }
    }
}

/// Resolves on SIGTERM or SIGINT.
///
/// If the handlers cannot be installed this never resolves, leaving the
/// container to be stopped by SIGKILL.
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut term), Ok(mut int)) => {
            tokio::select! {
                _ = term.recv() => {}
                _ = int.recv() => {}
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Cannot install stop signal handlers");
            std::future::pending::<()>().await
        }
    }
}
