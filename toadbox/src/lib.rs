//! Container startup orchestrator for toadbox development sandboxes.
//!
//! Runs as the container's main process: resolves the boot configuration,
//! remaps the service account to the host's identity, provisions the desktop
//! session script, starts the enabled services and keeps the container
//! anchored to the desktop session (or a keep-alive wait).

pub mod boot;
pub mod config;
pub mod constants;
pub mod desktop;
pub mod identity;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod supervisor;
pub mod util;

pub use boot::{BootOutcome, Orchestrator};
pub use config::{Layout, ServiceConfig, ServiceKind};
pub use desktop::{DesktopOutcome, DesktopSessionLauncher};
pub use supervisor::{Anchor, ServiceState, ServiceSupervisor, shutdown_signal};
pub use toadbox_shared::errors::{ToadboxError, ToadboxResult};
