//! Boot signal names, default paths and fixed image facts.
//!
//! Centralized location for every value the orchestrator agrees on with the
//! image build and with the container runtime.

/// Environment variables read once at boot.
pub mod env {
    pub const PUID: &str = "PUID";
    pub const PGID: &str = "PGID";
    pub const ENABLE_DOCKER: &str = "ENABLE_DOCKER";
    pub const ENABLE_SSH: &str = "ENABLE_SSH";
    pub const ENABLE_RDP: &str = "ENABLE_RDP";
    pub const AUTH_MODE: &str = "AUTH_MODE";
    pub const DESKTOP_BACKEND: &str = "DESKTOP_BACKEND";
    pub const DESKTOP_START_TIMEOUT_SECS: &str = "DESKTOP_START_TIMEOUT_SECS";
    pub const SERVICE_START_GRACE_MS: &str = "SERVICE_START_GRACE_MS";
}

/// The built-in service account baked into the image.
pub mod account {
    pub const NAME: &str = "agent";
    pub const HOME_DIR: &str = "/home/agent";

    /// Insecure by default. Operators are expected to change it.
    pub const DEFAULT_PASSWORD: &str = "agent";
}

/// Paths subject to the ownership pass or owned by the orchestrator.
pub mod paths {
    /// Package-manager data directory (Homebrew prefix).
    pub const PACKAGE_DIR: &str = "/home/linuxbrew/.linuxbrew";
    pub const WORKSPACE_DIR: &str = "/workspace";
    /// Session script location, relative to the account home.
    pub const SESSION_SCRIPT: &str = ".vnc/xstartup";
    pub const SERVICE_LOG_DIR: &str = "/var/log/toadbox";
    pub const SSHD_RUNTIME_DIR: &str = "/run/sshd";
    pub const DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";
    /// Extra directories searched for service binaries besides `PATH`.
    pub const SBIN_DIRS: &[&str] = &["/usr/local/sbin", "/usr/sbin", "/sbin"];
}

/// Ports exposed by the image.
pub mod ports {
    pub const SSH: u16 = 22;
    pub const RDP: u16 = 3389;
    /// 5900 + display number.
    pub const VNC: u16 = 5901;
}

/// Desktop session defaults.
pub mod desktop {
    pub const DISPLAY: &str = ":1";
    pub const GEOMETRY: &str = "1920x1080";
    pub const DEPTH: &str = "24";
    pub const BACKGROUND_COLOR: &str = "#2e3440";
    pub const WINDOW_MANAGER: &str = "startxfce4";
    /// Minimal session used when the full desktop cannot start.
    pub const FALLBACK_SESSION: &str = "/usr/bin/xterm";
}

/// Timing defaults.
pub mod timing {
    pub const DESKTOP_START_TIMEOUT_SECS: u64 = 10;
    pub const SERVICE_START_GRACE_MS: u64 = 1500;
}
