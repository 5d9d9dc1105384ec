//! # Startup handshake for dynamically registered workers.
//!
//! [`Host::register_dynamic`](crate::Host::register_dynamic) returns a
//! [`WorkerHandle`]. The supervision actor keeps the matching notifier and
//! reports the first spawn through it:
//!
//! ```text
//! register_dynamic ──► (WorkerHandle, StartupNotifier)
//!                            │               │
//!   wait_for_startup() ◄─────┘               └── actor: Started(pid) | HostShutdown
//!                                                       (dropped unsent → Stopped)
//! ```
//!
//! The notifier fires at most once; restarts never report again.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::registry::ProcessId;

/// Outcome of waiting for a dynamic worker to start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupStatus {
    /// The worker unit is running with this pid.
    Started(ProcessId),
    /// The worker stopped before it could confirm startup.
    Stopped,
    /// The host is shutting down; the worker will not start.
    HostShutdown,
}

/// Caller-side handle of a dynamic registration.
#[derive(Debug)]
pub struct WorkerHandle {
    name: Arc<str>,
    rx: oneshot::Receiver<StartupStatus>,
    runtime_token: CancellationToken,
}

impl WorkerHandle {
    pub(crate) fn new(name: &str, runtime_token: CancellationToken) -> (Self, StartupNotifier) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            name: Arc::from(name),
            rx,
            runtime_token,
        };
        (handle, StartupNotifier(Some(tx)))
    }

    /// Descriptor name this handle was issued for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits until the worker confirms startup, stops, or the host shuts down.
    pub async fn wait_for_startup(self) -> StartupStatus {
        let Self {
            mut rx,
            runtime_token,
            ..
        } = self;

        tokio::select! {
            biased;
            res = &mut rx => res.unwrap_or(StartupStatus::Stopped),
            _ = runtime_token.cancelled() => StartupStatus::HostShutdown,
        }
    }
}

/// Actor-side half of the handshake.
#[derive(Debug)]
pub(crate) struct StartupNotifier(Option<oneshot::Sender<StartupStatus>>);

impl StartupNotifier {
    /// A notifier nobody listens to (static workers).
    pub(crate) fn none() -> Self {
        Self(None)
    }

    /// Reports `status` the first time it is called; later calls are no-ops.
    pub(crate) fn notify(&mut self, status: StartupStatus) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(status);
        }
    }
}
