//! # Worker units: descriptors, context, and the ticker run loop.
//!
//! A [`WorkerDescriptor`] says what to run; the host turns each spawn of it
//! into a worker unit that executes `descriptor.main(ctx)` in its own task.
//! [`ticker_main`] is the main entry of every ticker worker.

mod descriptor;
mod run_loop;
mod tick;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ConfigStore;
use crate::core::ProcessEntry;
use crate::db::Engine;
use crate::error::WorkerError;
use crate::events::Bus;

pub use descriptor::{
    StartTrigger, WorkerDescriptor, WorkerKind, WorkerMain, BACKEND_TYPE, DYNAMIC_WORKER_NAME,
};
pub use run_loop::ticker_main;

/// Everything a worker unit gets from the host.
pub struct WorkerContext {
    /// The unit's own process-table entry (signals and status).
    pub process: Arc<ProcessEntry>,
    /// The descriptor this unit was spawned from.
    pub descriptor: Arc<WorkerDescriptor>,
    pub engine: Arc<dyn Engine>,
    /// Per-unit config store, forked from the host's at spawn time.
    pub config: ConfigStore,
    /// Cancelled when the host shuts down.
    pub shutdown: CancellationToken,
    pub bus: Bus,
}

/// How a worker unit ended.
#[derive(Debug)]
pub enum WorkerExit {
    /// Left the run loop after a terminate signal.
    Terminated,
    /// Observed host shutdown.
    HostShutdown,
    /// An unrecoverable error ended the unit.
    Failed(WorkerError),
    /// The unit panicked.
    Crashed(String),
}

impl WorkerExit {
    /// Exit status reported for every ticker unit.
    pub const EXIT_CODE: i32 = 1;

    /// Exit status. Always [`WorkerExit::EXIT_CODE`]: the host restarts per
    /// policy regardless of the cause.
    pub fn code(&self) -> i32 {
        Self::EXIT_CODE
    }

    /// Human-readable cause, if any.
    pub fn reason(&self) -> Option<String> {
        match self {
            WorkerExit::Terminated => None,
            WorkerExit::HostShutdown => Some("host shutdown".to_string()),
            WorkerExit::Failed(e) => Some(e.to_string()),
            WorkerExit::Crashed(msg) => Some(format!("panicked: {msg}")),
        }
    }
}
