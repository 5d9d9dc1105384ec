use std::fmt;

use futures::future::BoxFuture;

use super::{ticker_main, WorkerContext, WorkerExit};
use crate::db::DatabaseId;
use crate::policies::RestartPolicy;

/// Backend type shown for every ticker unit in the process table.
pub const BACKEND_TYPE: &str = "tickvisor";

/// Name of dynamically launched ticker workers.
pub const DYNAMIC_WORKER_NAME: &str = "tickvisor worker";

/// Main entry of a worker unit.
pub type WorkerMain = fn(WorkerContext) -> BoxFuture<'static, WorkerExit>;

/// How the descriptor reached the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerKind {
    /// Registered before host start.
    Static,
    /// Registered at runtime by a launcher.
    Dynamic,
}

/// When the unit may first be spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTrigger {
    /// As soon as the actor runs.
    HostStart,
    /// Once the host is ready to accept connections.
    HostReady,
}

/// What the host should run, and how to treat its exits.
#[derive(Clone)]
pub struct WorkerDescriptor {
    pub kind: WorkerKind,
    pub name: String,
    pub backend_type: String,
    pub restart: RestartPolicy,
    pub start_trigger: StartTrigger,
    /// Database to connect to when no database name is configured.
    pub main_arg: DatabaseId,
    pub main: WorkerMain,
}

impl WorkerDescriptor {
    /// A ticker worker running [`ticker_main`], started once the host is ready.
    pub fn ticker(
        kind: WorkerKind,
        name: impl Into<String>,
        restart: RestartPolicy,
        main_arg: DatabaseId,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            backend_type: BACKEND_TYPE.to_string(),
            restart,
            start_trigger: StartTrigger::HostReady,
            main_arg,
            main: ticker_main,
        }
    }

    /// Replaces the main entry.
    pub fn with_main(mut self, main: WorkerMain) -> Self {
        self.main = main;
        self
    }

    pub fn with_start_trigger(mut self, trigger: StartTrigger) -> Self {
        self.start_trigger = trigger;
        self
    }
}

impl fmt::Debug for WorkerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("backend_type", &self.backend_type)
            .field("restart", &self.restart)
            .field("start_trigger", &self.start_trigger)
            .field("main_arg", &self.main_arg)
            .finish_non_exhaustive()
    }
}
