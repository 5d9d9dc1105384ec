//! # Process table: every live worker unit and what it is doing.
//!
//! The supervision actor inserts a [`ProcessEntry`] right before spawning a
//! worker unit and removes it right after the unit exits, so the table lists
//! exactly the units that are alive. The launcher's duplicate guard and
//! [`Host::processes`](crate::Host::processes) both read it.
//!
//! Each entry carries:
//! - identity: pid, name, backend type, descriptor target;
//! - the [`WorkerSignals`] block used to signal the unit;
//! - a live status (run state, activity, current statement, connected database).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use tokio::sync::watch;

use super::latch::WorkerSignals;
use crate::db::DatabaseId;
use crate::worker::{WorkerDescriptor, WorkerKind};

/// Host-assigned process identifier. Never reused within one host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a worker unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Connecting to the target database.
    Starting,
    /// In the run loop.
    Running,
    /// Applying a configuration reload.
    ReloadingConfig,
    /// Leaving the run loop.
    Terminating,
    /// The unit has exited.
    Stopped,
}

/// What the worker reports it is doing (shown by monitoring).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    Starting,
    Idle,
    Running,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Starting => "starting",
            Activity::Idle => "idle",
            Activity::Running => "running",
        }
    }
}

#[derive(Clone, Debug)]
struct ProcessStatus {
    state: RunState,
    activity: Activity,
    query: Option<Arc<str>>,
    application_name: Option<Arc<str>>,
    database: Option<DatabaseId>,
}

/// Point-in-time view of one process (see [`Host::processes`](crate::Host::processes)).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: String,
    pub backend_type: String,
    pub kind: WorkerKind,
    /// Database the descriptor was launched for (`INVALID` for static workers).
    pub target: DatabaseId,
    /// Database the unit is connected to, once connected.
    pub database: Option<DatabaseId>,
    pub application_name: Option<String>,
    pub state: RunState,
    pub activity: Activity,
    /// Statement in progress while `activity` is `Running`.
    pub query: Option<String>,
    pub started_at: SystemTime,
}

/// One live worker unit.
#[derive(Debug)]
pub struct ProcessEntry {
    pid: ProcessId,
    name: Arc<str>,
    backend_type: Arc<str>,
    kind: WorkerKind,
    target: DatabaseId,
    started_at: SystemTime,
    signals: WorkerSignals,
    status: watch::Sender<ProcessStatus>,
}

impl ProcessEntry {
    fn new(pid: ProcessId, descriptor: &WorkerDescriptor) -> Self {
        let (status, _) = watch::channel(ProcessStatus {
            state: RunState::Starting,
            activity: Activity::Starting,
            query: None,
            application_name: None,
            database: None,
        });
        Self {
            pid,
            name: Arc::from(descriptor.name.as_str()),
            backend_type: Arc::from(descriptor.backend_type.as_str()),
            kind: descriptor.kind,
            target: descriptor.main_arg,
            started_at: SystemTime::now(),
            signals: WorkerSignals::new(),
            status,
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signals(&self) -> &WorkerSignals {
        &self.signals
    }

    pub fn state(&self) -> RunState {
        self.status.borrow().state
    }

    pub fn set_state(&self, state: RunState) {
        self.status.send_modify(|s| s.state = state);
    }

    /// Reports the current activity. `query` is kept only while running.
    pub fn report_activity(&self, activity: Activity, query: Option<&str>) {
        self.status.send_modify(|s| {
            s.activity = activity;
            s.query = query.map(Arc::from);
        });
    }

    pub fn set_application_name(&self, name: &str) {
        self.status
            .send_modify(|s| s.application_name = Some(Arc::from(name)));
    }

    pub fn set_database(&self, db: DatabaseId) {
        self.status.send_modify(|s| s.database = Some(db));
    }

    /// Snapshot of this entry.
    pub fn info(&self) -> ProcessInfo {
        let status = self.status.borrow().clone();
        ProcessInfo {
            pid: self.pid,
            name: self.name.to_string(),
            backend_type: self.backend_type.to_string(),
            kind: self.kind,
            target: self.target,
            database: status.database,
            application_name: status.application_name.map(|s| s.to_string()),
            state: status.state,
            activity: status.activity,
            query: status.query.map(|s| s.to_string()),
            started_at: self.started_at,
        }
    }
}

/// Live worker units keyed by pid.
#[derive(Debug)]
pub struct ProcessTable {
    procs: RwLock<BTreeMap<ProcessId, Arc<ProcessEntry>>>,
    next_pid: AtomicU32,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            procs: RwLock::new(BTreeMap::new()),
            next_pid: AtomicU32::new(1),
        }
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh pid and inserts an entry for `descriptor`.
    pub fn insert(&self, descriptor: &WorkerDescriptor) -> Arc<ProcessEntry> {
        let pid = ProcessId(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ProcessEntry::new(pid, descriptor));
        self.procs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid, Arc::clone(&entry));
        entry
    }

    pub fn remove(&self, pid: ProcessId) -> Option<Arc<ProcessEntry>> {
        self.procs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid)
    }

    pub fn get(&self, pid: ProcessId) -> Option<Arc<ProcessEntry>> {
        self.procs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
            .cloned()
    }

    /// All live entries, ordered by pid.
    pub fn entries(&self) -> Vec<Arc<ProcessEntry>> {
        self.procs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of all live processes, ordered by pid.
    pub fn snapshot(&self) -> Vec<ProcessInfo> {
        self.entries().iter().map(|e| e.info()).collect()
    }

    pub fn pids(&self) -> Vec<ProcessId> {
        self.procs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}
