//! Desktop session script provisioning.
//!
//! The session script is what the VNC server runs to start the user's
//! graphical session. It usually lives in a persisted home volume and may
//! have been edited by the user, so an existing file is never replaced.
//!
//! Creation is atomic: the script is written to a temporary file in the
//! target directory and linked into place only if nothing exists there yet.
//! A crash mid-write leaves at most a stray temporary file, never a partial
//! script at the real path.

mod template;

pub use template::SessionTemplate;

use crate::config::{IdentityTarget, Layout};
use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

/// Mode of a freshly provisioned script.
pub const SCRIPT_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyPresent,
}

/// A session script to be provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScript {
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
}

impl SessionScript {
    /// The image's default script for `layout`.
    pub fn default_for(layout: &Layout) -> Self {
        Self {
            path: layout.session_script.clone(),
            content: SessionTemplate::for_account(&layout.account).render(),
            mode: SCRIPT_MODE,
        }
    }
}

pub struct SessionScriptProvisioner {
    script: SessionScript,
    owner: Option<IdentityTarget>,
}

impl SessionScriptProvisioner {
    pub fn new(script: SessionScript) -> Self {
        Self {
            script,
            owner: None,
        }
    }

    /// Hand a newly created script (and any directory created for it) to `owner`.
    pub fn with_owner(mut self, owner: Option<IdentityTarget>) -> Self {
        self.owner = owner;
        self
    }

    pub fn path(&self) -> &Path {
        &self.script.path
    }

    /// Ensure the script exists, creating it only if absent.
    pub fn provision(&self) -> ToadboxResult<ProvisionOutcome> {
        let path = &self.script.path;

        // symlink_metadata: a dangling symlink still counts as present
        if std::fs::symlink_metadata(path).is_ok() {
            tracing::info!(path = %path.display(), "Session script present, leaving it untouched");
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let parent = path.parent().ok_or_else(|| {
            ToadboxError::Storage(format!("session script path has no parent: {}", path.display()))
        })?;
        let created_parent = !parent.exists();
        std::fs::create_dir_all(parent).map_err(|e| {
            ToadboxError::Storage(format!(
                "Failed to create session script directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let outcome = self.write_atomically(parent)?;

        if outcome == ProvisionOutcome::Created {
            tracing::info!(path = %path.display(), "Default session script created");
            if created_parent {
                self.hand_over(parent);
            }
            self.hand_over(path);
        }
        Ok(outcome)
    }

    fn write_atomically(&self, dir: &Path) -> ToadboxResult<ProvisionOutcome> {
        let path = &self.script.path;
        let storage_err = |what: &str, e: std::io::Error| {
            ToadboxError::Storage(format!("Failed to {} for {}: {}", what, path.display(), e))
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".session-")
            .tempfile_in(dir)
            .map_err(|e| storage_err("create temporary file", e))?;
        tmp.write_all(self.script.content.as_bytes())
            .map_err(|e| storage_err("write temporary file", e))?;
        tmp.as_file()
            .set_permissions(Permissions::from_mode(self.script.mode))
            .map_err(|e| storage_err("set permissions", e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| storage_err("sync temporary file", e))?;

        match tmp.persist_noclobber(path) {
            Ok(_) => Ok(ProvisionOutcome::Created),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                // Lost the race against another writer; theirs wins.
                tracing::info!(path = %path.display(), "Session script appeared concurrently");
                Ok(ProvisionOutcome::AlreadyPresent)
            }
            Err(e) => Err(storage_err("move script into place", e.error)),
        }
    }

    fn hand_over(&self, path: &Path) {
        let Some(owner) = self.owner else {
            return;
        };
        if let Err(e) = std::os::unix::fs::lchown(path, Some(owner.uid), Some(owner.gid)) {
            tracing::warn!(
                path = %path.display(),
                uid = owner.uid,
                gid = owner.gid,
                error = %e,
                "Failed to chown session script, continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn script_at(path: PathBuf) -> SessionScript {
        SessionScript {
            path,
            content: SessionTemplate::for_account("agent").render(),
            mode: SCRIPT_MODE,
        }
    }

    #[test]
    fn test_creates_missing_script_executable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".vnc/xstartup");

        let outcome = SessionScriptProvisioner::new(script_at(path.clone()))
            .provision()
            .unwrap();

        assert_eq!(outcome, ProvisionOutcome::Created);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#!/bin/sh"));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SCRIPT_MODE);
    }

    #[test]
    fn test_existing_script_is_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("xstartup");
        let custom = b"#!/bin/sh\nexec my-own-wm\n";
        std::fs::write(&path, custom).unwrap();
        std::fs::set_permissions(&path, Permissions::from_mode(0o600)).unwrap();

        let outcome = SessionScriptProvisioner::new(script_at(path.clone()))
            .provision()
            .unwrap();

        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert_eq!(std::fs::read(&path).unwrap(), custom);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_dangling_symlink_counts_as_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("xstartup");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &path).unwrap();

        let outcome = SessionScriptProvisioner::new(script_at(path.clone()))
            .provision()
            .unwrap();

        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("xstartup");

        SessionScriptProvisioner::new(script_at(path))
            .provision()
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["xstartup".to_string()]);
    }

    #[test]
    fn test_default_for_layout_uses_session_path() {
        let layout = Layout::for_home("agent", "/home/agent");
        let script = SessionScript::default_for(&layout);
        assert_eq!(script.path, PathBuf::from("/home/agent/.vnc/xstartup"));
        assert_eq!(script.mode, 0o755);
    }

    #[test]
    fn test_losing_the_race_keeps_the_winner() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("xstartup");
        let provisioner = SessionScriptProvisioner::new(script_at(path.clone()));

        // Another writer lands between the existence check and the rename.
        let winner = b"#!/bin/sh\nexec other-wm\n";
        std::fs::write(&path, winner).unwrap();

        let outcome = provisioner.write_atomically(dir.path()).unwrap();

        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert_eq!(std::fs::read(&path).unwrap(), winner);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.starts_with(".session-"))
            .collect();
        assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
    }
}
