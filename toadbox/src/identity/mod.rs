//! Identity remap for the built-in service account.
//!
//! When the host supplies both a uid and a gid, the account's group and user
//! ids are changed to match, then ownership is fixed on the home directory,
//! the package-manager directory and the optional workspace mount.
//!
//! Every step is best-effort: a failure is logged and recorded in the
//! [`IdentityReport`], and the sequence carries on. A step whose target
//! already holds is reported as [`StepOutcome::AlreadyApplied`] and performs
//! no modification, so running the sequence twice converges on the same
//! state without ever adding account entries.

mod system;

pub use system::{SystemAccountOps, parse_passwd_entry};

use crate::config::{IdentityTarget, Layout};
use std::path::Path;
use toadbox_shared::errors::ToadboxResult;

/// Numeric ids of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountIds {
    pub uid: u32,
    pub gid: u32,
}

/// Account database and ownership operations.
///
/// Separates what the identity manager decides from how the system applies it.
pub trait AccountOps: Send + Sync {
    /// Current ids of `account`.
    fn lookup(&self, account: &str) -> ToadboxResult<AccountIds>;

    /// Change the gid of the account's primary group.
    fn set_gid(&self, account: &str, gid: u32) -> ToadboxResult<()>;

    /// Change the uid of the account.
    fn set_uid(&self, account: &str, uid: u32) -> ToadboxResult<()>;

    /// Recursively set ownership under `path` without following symlinks.
    ///
    /// Returns the number of entries whose ownership changed.
    fn chown_tree(&self, path: &Path, uid: u32, gid: u32) -> ToadboxResult<usize>;
}

/// Result of one remap or ownership step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    AlreadyApplied,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityStep {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Everything the identity manager did, step by step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityReport {
    pub steps: Vec<IdentityStep>,
    /// Account ids after the sequence, when the account could be looked up.
    pub final_ids: Option<AccountIds>,
}

impl IdentityReport {
    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| &step.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &IdentityStep> {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, StepOutcome::Failed(_)))
    }

    /// True when no step changed anything.
    pub fn is_noop(&self) -> bool {
        self.steps
            .iter()
            .all(|step| !matches!(step.outcome, StepOutcome::Applied))
    }

    fn record(&mut self, name: impl Into<String>, outcome: StepOutcome) {
        let name = name.into();
        match &outcome {
            StepOutcome::Failed(message) => {
                tracing::warn!(step = %name, error = %message, "Identity step failed, continuing")
            }
            StepOutcome::Skipped(reason) => {
                tracing::debug!(step = %name, reason = %reason, "Identity step skipped")
            }
            other => tracing::info!(step = %name, outcome = ?other, "Identity step done"),
        }
        self.steps.push(IdentityStep { name, outcome });
    }
}

/// The account as seen by the remap: fixed name and home, current and target ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity<'a> {
    pub account: &'a str,
    pub home_dir: &'a Path,
    pub current: AccountIds,
    pub target: IdentityTarget,
}

impl Identity<'_> {
    pub fn gid_matches(&self) -> bool {
        self.current.gid == self.target.gid
    }

    pub fn uid_matches(&self) -> bool {
        self.current.uid == self.target.uid
    }
}

pub struct IdentityManager<'a> {
    ops: &'a dyn AccountOps,
    layout: &'a Layout,
}

impl<'a> IdentityManager<'a> {
    pub fn new(ops: &'a dyn AccountOps, layout: &'a Layout) -> Self {
        Self { ops, layout }
    }

    /// Run the remap sequence. No-op when `target` is `None`.
    ///
    /// Never fails: every problem ends up in the report.
    pub fn remap(&self, target: Option<IdentityTarget>) -> IdentityReport {
        let mut report = IdentityReport::default();
        let account = self.layout.account.as_str();

        let Some(target) = target else {
            tracing::info!(account, "No identity hints supplied, keeping image identity");
            report.final_ids = self.ops.lookup(account).ok();
            return report;
        };

        if !nix::unistd::Uid::effective().is_root() {
            tracing::warn!(account, "Not running as root; identity remap will likely fail");
        }

        let current = match self.ops.lookup(account) {
            Ok(ids) => ids,
            Err(e) => {
                report.record("lookup", StepOutcome::Failed(e.to_string()));
                self.fix_ownership(&mut report, target);
                return report;
            }
        };

        let identity = Identity {
            account,
            home_dir: &self.layout.home_dir,
            current,
            target,
        };
        tracing::info!(
            account,
            home = %identity.home_dir.display(),
            from_uid = identity.current.uid,
            from_gid = identity.current.gid,
            to_uid = target.uid,
            to_gid = target.gid,
            "Remapping account identity"
        );

        // Group first: usermod resolves the primary group by gid.
        let gid_outcome = if identity.gid_matches() {
            StepOutcome::AlreadyApplied
        } else {
            outcome_of(self.ops.set_gid(account, target.gid))
        };
        report.record("set_gid", gid_outcome);

        let uid_outcome = if identity.uid_matches() {
            StepOutcome::AlreadyApplied
        } else {
            outcome_of(self.ops.set_uid(account, target.uid))
        };
        report.record("set_uid", uid_outcome);

        self.fix_ownership(&mut report, target);

        report.final_ids = self.ops.lookup(account).ok();
        report
    }

    fn fix_ownership(&self, report: &mut IdentityReport, target: IdentityTarget) {
        for (dir, optional) in self.layout.owned_dirs() {
            let name = format!("chown {}", dir.display());
            if !dir.exists() {
                let outcome = if optional {
                    StepOutcome::Skipped("not present".into())
                } else {
                    StepOutcome::Failed("directory does not exist".into())
                };
                report.record(name, outcome);
                continue;
            }

            let outcome = match self.ops.chown_tree(dir, target.uid, target.gid) {
                Ok(0) => StepOutcome::AlreadyApplied,
                Ok(changed) => {
                    tracing::debug!(path = %dir.display(), changed, "Ownership fixed");
                    StepOutcome::Applied
                }
                Err(e) => StepOutcome::Failed(e.to_string()),
            };
            report.record(name, outcome);
        }
    }
}

fn outcome_of(result: ToadboxResult<()>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Applied,
        Err(e) => StepOutcome::Failed(e.to_string()),
    }
}
