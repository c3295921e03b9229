//! ServiceHandle - runtime operations on a started service process.

use async_trait::async_trait;
use toadbox_shared::errors::ToadboxResult;

/// Handle to a service process that survived its start window.
///
/// Separates runtime operations (wait, stop) from launching
/// ([`super::ServiceLauncher`]).
#[async_trait]
pub trait ServiceHandle: Send {
    fn name(&self) -> &str;

    fn pid(&self) -> Option<u32>;

    /// Check if the process is still running.
    fn is_running(&mut self) -> bool;

    /// Wait for the process to exit, returning its shell-style exit code.
    async fn wait(&mut self) -> ToadboxResult<i32>;

    /// Ask the process to terminate (SIGTERM).
    fn stop(&mut self) -> ToadboxResult<()>;
}
