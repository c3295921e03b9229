//! Process helpers: binary lookup and exit status mapping.

use crate::constants::paths::SBIN_DIRS;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use toadbox_shared::errors::{ToadboxError, ToadboxResult};

/// Locate an executable.
///
/// Names containing a `/` are taken as paths. Bare names are searched in
/// `PATH`, then in the sbin directories, which a container's init often
/// lacks in its `PATH`.
pub fn find_binary(name: &str) -> ToadboxResult<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return if is_executable(&path) {
            Ok(path)
        } else {
            Err(ToadboxError::Config(format!("{} is not an executable file", name)))
        };
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search_path)
        .chain(SBIN_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| ToadboxError::Config(format!("{} not found in PATH or sbin", name)))
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Shell-style exit code: the status code, or `128 + signal` for a signal death.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_binary_in_path() {
        let sh = find_binary("sh").unwrap();
        assert!(sh.is_absolute());
        assert!(sh.ends_with("sh"));
    }

    #[test]
    fn test_find_binary_absolute_and_missing() {
        assert_eq!(find_binary("/bin/sh").unwrap(), PathBuf::from("/bin/sh"));
        assert!(find_binary("/definitely/not/here").is_err());
        assert!(find_binary("toadbox-no-such-binary").is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        // wait(2) encoding: exit code in the high byte
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        // killed by SIGTERM (15)
        assert_eq!(exit_code(ExitStatus::from_raw(15)), 143);
    }
}
