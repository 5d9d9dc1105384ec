//! # Dynamic launcher: start a ticker for a database at runtime.
//!
//! ```text
//! launch(name) ─► resolve ─► find_running? ── yes ─► Ok(None)
//!                                 │ no
//!                                 ▼
//! launch_raw(db) ─► register_dynamic ── None ─► Ok(None)   (no slot / shutting down)
//!                        │
//!                        ▼
//!                 wait_for_startup()
//!                   ├─ Started(pid)  → Ok(Some(pid))
//!                   ├─ Stopped       → Err(StartupFailed)
//!                   └─ HostShutdown  → Err(HostShuttingDown)
//! ```
//!
//! The duplicate guard is check-then-act: two launches racing for the same
//! database can both pass it.

use std::sync::Arc;

use crate::core::{Host, ProcessId, StartupStatus};
use crate::db::{DatabaseId, LaunchPredicate};
use crate::error::LaunchError;
use crate::policies::RestartPolicy;
use crate::worker::{WorkerDescriptor, WorkerKind, BACKEND_TYPE, DYNAMIC_WORKER_NAME};

/// Launches dynamic ticker workers on a [`Host`].
#[derive(Clone)]
pub struct Launcher {
    host: Arc<Host>,
}

impl Launcher {
    pub fn new(host: Arc<Host>) -> Self {
        Self { host }
    }

    /// Launches a ticker for `database` unless one is already running there.
    ///
    /// Returns `Ok(None)` if a ticker is already live for the database or no
    /// worker slot is free.
    pub async fn launch(&self, database: &str) -> Result<Option<ProcessId>, LaunchError> {
        let db = self.resolve(database).await?;
        if let Some(pid) = self.find_running(db) {
            tracing::debug!(database, %pid, "ticker already running");
            return Ok(None);
        }
        self.launch_raw(db).await
    }

    /// Like [`Launcher::launch`], but only if `predicate` approves the database.
    pub async fn launch_if(
        &self,
        database: &str,
        predicate: &dyn LaunchPredicate,
    ) -> Result<Option<ProcessId>, LaunchError> {
        let db = self.resolve(database).await?;
        if !predicate
            .should_launch(db)
            .await
            .map_err(LaunchError::Predicate)?
        {
            tracing::debug!(database, "launch predicate declined");
            return Ok(None);
        }
        if let Some(pid) = self.find_running(db) {
            tracing::debug!(database, %pid, "ticker already running");
            return Ok(None);
        }
        self.launch_raw(db).await
    }

    /// Registers a ticker for `db` and waits for it to start.
    ///
    /// No duplicate check. Waits without a timeout of its own: the wait ends
    /// when the worker starts, stops, or the host shuts down.
    ///
    /// Launched tickers are never respawned: once one exits its slot is free
    /// and the caller has to launch again.
    pub async fn launch_raw(&self, db: DatabaseId) -> Result<Option<ProcessId>, LaunchError> {
        let descriptor = WorkerDescriptor::ticker(
            WorkerKind::Dynamic,
            DYNAMIC_WORKER_NAME,
            RestartPolicy::Never,
            db,
        );

        let Some(handle) = self.host.register_dynamic(descriptor) else {
            return Ok(None);
        };

        match handle.wait_for_startup().await {
            StartupStatus::Started(pid) => {
                tracing::info!(%db, %pid, "ticker launched");
                Ok(Some(pid))
            }
            StartupStatus::Stopped => Err(LaunchError::StartupFailed),
            StartupStatus::HostShutdown => Err(LaunchError::HostShuttingDown),
        }
    }

    /// Finds a live ticker whose target or connected database is `db`.
    pub fn find_running(&self, db: DatabaseId) -> Option<ProcessId> {
        self.host
            .processes()
            .into_iter()
            .find(|p| p.backend_type == BACKEND_TYPE && (p.target == db || p.database == Some(db)))
            .map(|p| p.pid)
    }

    async fn resolve(&self, database: &str) -> Result<DatabaseId, LaunchError> {
        self.host
            .engine()
            .resolve_database(database)
            .await
            .map_err(LaunchError::Database)?
            .ok_or_else(|| LaunchError::UnknownDatabase(database.to_string()))
    }
}
