//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toadbox::config::Layout;
use toadbox::identity::{AccountIds, AccountOps};
use toadbox::supervisor::{LaunchResult, ServiceHandle, ServiceLauncher, ServiceSpec};
use toadbox::{ToadboxError, ToadboxResult};

/// In-memory account database; ownership is tracked per tree root.
pub struct FakeAccounts {
    ids: Mutex<AccountIds>,
    owners: Mutex<HashMap<PathBuf, (u32, u32)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeAccounts {
    pub fn new(uid: u32, gid: u32) -> Arc<Self> {
        Arc::new(Self {
            ids: Mutex::new(AccountIds { uid, gid }),
            owners: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn ids(&self) -> AccountIds {
        *self.ids.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl AccountOps for FakeAccounts {
    fn lookup(&self, _account: &str) -> ToadboxResult<AccountIds> {
        Ok(self.ids())
    }

    fn set_gid(&self, _account: &str, gid: u32) -> ToadboxResult<()> {
        self.calls.lock().unwrap().push(format!("set_gid {gid}"));
        self.ids.lock().unwrap().gid = gid;
        Ok(())
    }

    fn set_uid(&self, _account: &str, uid: u32) -> ToadboxResult<()> {
        self.calls.lock().unwrap().push(format!("set_uid {uid}"));
        self.ids.lock().unwrap().uid = uid;
        Ok(())
    }

    fn chown_tree(&self, path: &Path, uid: u32, gid: u32) -> ToadboxResult<usize> {
        let previous = self
            .owners
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), (uid, gid));
        if previous == Some((uid, gid)) {
            return Ok(0);
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("chown {} {uid}:{gid}", path.display()));
        Ok(1)
    }
}

/// How the fake launcher answers a spec, by spec name.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Alive at the end of the window; `wait` never returns.
    Run,
    /// Alive at the end of the window; `wait` returns this code.
    RunThenExit(i32),
    /// Exited inside the window.
    Exit(i32),
    /// Could not be spawned at all.
    Missing,
}

/// Launcher that records every spec and answers from a script.
#[derive(Default)]
pub struct RecordingLauncher {
    script: HashMap<String, Behavior>,
    launched: Mutex<Vec<ServiceSpec>>,
    stopped: Arc<Mutex<Vec<String>>>,
}

impl RecordingLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(pairs: &[(&str, Behavior)]) -> Arc<Self> {
        Arc::new(Self {
            script: pairs
                .iter()
                .map(|(name, behavior)| (name.to_string(), *behavior))
                .collect(),
            launched: Mutex::new(Vec::new()),
            stopped: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Names of the handles that were asked to stop.
    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .map(|spec| spec.name.clone())
            .collect()
    }

    pub fn spec(&self, name: &str) -> Option<ServiceSpec> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .find(|spec| spec.name == name)
            .cloned()
    }
}

pub struct FakeHandle {
    name: String,
    exit: Option<i32>,
    stopped: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ServiceHandle for FakeHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn pid(&self) -> Option<u32> {
        Some(1000)
    }

    fn is_running(&mut self) -> bool {
        true
    }

    async fn wait(&mut self) -> ToadboxResult<i32> {
        match self.exit {
            Some(code) => Ok(code),
            None => std::future::pending().await,
        }
    }

    fn stop(&mut self) -> ToadboxResult<()> {
        self.stopped.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

#[async_trait]
impl ServiceLauncher for RecordingLauncher {
    async fn launch(&self, spec: &ServiceSpec, _window: Duration) -> ToadboxResult<LaunchResult> {
        self.launched.lock().unwrap().push(spec.clone());
        let handle = |exit| {
            LaunchResult::Running(Box::new(FakeHandle {
                name: spec.name.clone(),
                exit,
                stopped: self.stopped.clone(),
            }))
        };
        match self.script.get(&spec.name).copied().unwrap_or(Behavior::Run) {
            Behavior::Run => Ok(handle(None)),
            Behavior::RunThenExit(code) => Ok(handle(Some(code))),
            Behavior::Exit(code) => Ok(LaunchResult::Exited(code)),
            Behavior::Missing => Err(ToadboxError::service(&spec.name, "binary not found")),
        }
    }
}

/// Layout rooted in a temporary directory, with the home directory created.
pub fn layout_in(root: &Path) -> Layout {
    let mut layout = Layout::for_home("agent", root.join("home/agent"));
    layout.package_dir = root.join("linuxbrew");
    layout.workspace_dir = root.join("workspace");
    layout.log_dir = root.join("log");
    std::fs::create_dir_all(&layout.home_dir).unwrap();
    layout
}
