//! # LogWriter: renders events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO worker spawned worker="tickvisor worker 1" pid=1 attempt=1
//! INFO worker initialized worker="tickvisor worker 1" pid=1 database="app"
//! WARN worker exited worker="tickvisor worker 1" pid=1 exit_code=1 reason="tick failed: ..."
//! INFO restart scheduled worker="tickvisor worker 1" delay_ms=10000
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Constructs a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let pid = e.pid.map(|p| p.0);
        let reason = e.reason.as_deref();

        match e.kind {
            EventKind::WorkerRegistered => info!(worker, "worker registered"),
            EventKind::WorkerSpawned => info!(worker, ?pid, attempt = ?e.attempt, "worker spawned"),
            EventKind::WorkerInitialized => {
                info!(worker, ?pid, database = ?reason, "worker initialized")
            }
            EventKind::WorkerExited => match reason {
                Some(reason) => {
                    warn!(worker, ?pid, exit_code = ?e.exit_code, reason, "worker exited")
                }
                None => info!(worker, ?pid, exit_code = ?e.exit_code, "worker exited"),
            },
            EventKind::RestartScheduled => {
                info!(worker, delay_ms = ?e.delay_ms, attempt = ?e.attempt, "restart scheduled")
            }
            EventKind::TickCompleted => debug!(worker, ?pid, tick = ?e.attempt, "tick completed"),
            EventKind::ConfigReloaded => info!(worker, ?pid, "config reloaded"),
            EventKind::ConfigRejected => warn!(worker, ?pid, ?reason, "config reload rejected"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("all workers stopped within grace"),
            EventKind::GraceExceeded => warn!("shutdown grace exceeded"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = worker, ?reason, "subscriber dropped event")
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = worker, ?reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
