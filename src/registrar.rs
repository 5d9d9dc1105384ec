//! # Static registration of ticker workers.
//!
//! Called once while the host is being set up, before [`Host::start`].
//! Registration only records descriptors and reserves slots; the workers are
//! spawned by the host once it is ready.

use crate::core::Host;
use crate::db::DatabaseId;
use crate::worker::{WorkerDescriptor, WorkerKind};

/// Registers `total_workers` static ticker workers for the configured database.
///
/// Registers nothing when no database is configured. Refused registrations
/// are logged and skipped. Returns the number of descriptors accepted.
pub fn register_static_workers(host: &Host) -> usize {
    let cfg = host.config().current();

    let Some(database) = cfg.database.as_deref() else {
        tracing::debug!("no ticker database configured; skipping static workers");
        return 0;
    };

    let mut accepted = 0;
    for i in 1..=cfg.total_workers {
        let descriptor = WorkerDescriptor::ticker(
            WorkerKind::Static,
            format!("tickvisor worker {i}"),
            cfg.restart,
            DatabaseId::INVALID,
        );
        match host.register_static(descriptor) {
            Ok(()) => accepted += 1,
            Err(e) => {
                tracing::warn!(
                    worker = i,
                    database,
                    error = %e,
                    label = e.as_label(),
                    "static worker not registered"
                );
            }
        }
    }

    tracing::info!(database, accepted, total = cfg.total_workers, "static ticker workers registered");
    accepted
}
