//! Account operations backed by the shadow-utils tools and `lchown(2)`.

use super::{AccountIds, AccountOps};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::process::Command;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};
use walkdir::WalkDir;

/// Applies identity changes to the real system.
///
/// `groupmod -o` and `usermod -o` allow non-unique ids, since the host's ids
/// may already be taken by an image account.
#[derive(Debug, Clone, Default)]
pub struct SystemAccountOps;

impl AccountOps for SystemAccountOps {
    fn lookup(&self, account: &str) -> ToadboxResult<AccountIds> {
        let output = Command::new("getent")
            .args(["passwd", account])
            .output()
            .map_err(|e| ToadboxError::Identity(format!("failed to run getent: {}", e)))?;

        if !output.status.success() {
            return Err(ToadboxError::Identity(format!(
                "account {} not found",
                account
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or_default();
        parse_passwd_entry(line)
            .ok_or_else(|| ToadboxError::Identity(format!("malformed passwd entry: {}", line)))
    }

    fn set_gid(&self, account: &str, gid: u32) -> ToadboxResult<()> {
        run_tool("groupmod", &["-o", "-g", &gid.to_string(), account])
    }

    fn set_uid(&self, account: &str, uid: u32) -> ToadboxResult<()> {
        run_tool("usermod", &["-o", "-u", &uid.to_string(), account])
    }

    fn chown_tree(&self, path: &Path, uid: u32, gid: u32) -> ToadboxResult<usize> {
        let mut changed = 0;
        let mut failed = 0;
        let mut first_error = None;

        for entry in WalkDir::new(path).follow_links(false) {
            let result = entry
                .map_err(|e| e.to_string())
                .and_then(|entry| chown_entry(entry.path(), uid, gid).map_err(|e| e.to_string()));
            match result {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(first_error) = first_error {
            return Err(ToadboxError::Storage(format!(
                "{} entries under {} could not be chowned (first error: {})",
                failed,
                path.display(),
                first_error
            )));
        }
        Ok(changed)
    }
}

/// Set ownership of a single entry, returning whether it changed.
fn chown_entry(path: &Path, uid: u32, gid: u32) -> std::io::Result<bool> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.uid() == uid && meta.gid() == gid {
        return Ok(false);
    }
    std::os::unix::fs::lchown(path, Some(uid), Some(gid))?;
    Ok(true)
}

fn run_tool(program: &str, args: &[&str]) -> ToadboxResult<()> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ToadboxError::Identity(format!("failed to run {}: {}", program, e)))?;

    if output.status.success() {
        return Ok(());
    }
    Err(ToadboxError::Identity(format!(
        "{} {} exited with {}: {}",
        program,
        args.join(" "),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Parse `name:x:uid:gid:gecos:home:shell` into account ids.
pub fn parse_passwd_entry(line: &str) -> Option<AccountIds> {
    let mut fields = line.trim().split(':');
    let _name = fields.next().filter(|name| !name.is_empty())?;
    let _password = fields.next()?;
    let uid = fields.next()?.parse().ok()?;
    let gid = fields.next()?.parse().ok()?;
    Some(AccountIds { uid, gid })
}
