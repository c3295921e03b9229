//! Filesystem layout the orchestrator works against.

use crate::constants::{account, desktop, paths};
use std::path::{Path, PathBuf};

/// Paths and names of the built-in account and its directories.
///
/// `Layout::default()` describes the real image. Tests build their own with
/// paths inside a temporary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub account: String,
    pub home_dir: PathBuf,
    pub package_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub session_script: PathBuf,
    pub log_dir: PathBuf,
    pub display: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self::for_home(account::NAME, account::HOME_DIR)
    }
}

impl Layout {
    /// Layout for `account` living in `home_dir`, other paths at image defaults.
    pub fn for_home(account: &str, home_dir: impl AsRef<Path>) -> Self {
        let home_dir = home_dir.as_ref().to_path_buf();
        Self {
            account: account.to_string(),
            session_script: home_dir.join(paths::SESSION_SCRIPT),
            home_dir,
            package_dir: PathBuf::from(paths::PACKAGE_DIR),
            workspace_dir: PathBuf::from(paths::WORKSPACE_DIR),
            log_dir: PathBuf::from(paths::SERVICE_LOG_DIR),
            display: desktop::DISPLAY.to_string(),
        }
    }

    /// Directories that receive the recursive ownership pass, in order.
    ///
    /// The boolean marks directories that are optional mounts.
    pub fn owned_dirs(&self) -> [(&Path, bool); 3] {
        [
            (self.home_dir.as_path(), false),
            (self.package_dir.as_path(), true),
            (self.workspace_dir.as_path(), true),
        ]
    }

    pub fn service_log(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{name}.log"))
    }
}
