//! # Signal flags and the worker latch.
//!
//! A worker never handles a signal inline. Raising a signal only:
//! 1. sets the atomic flag for that signal kind, and
//! 2. sets the latch (wakes the worker if it is waiting).
//!
//! The run loop consumes the flags at safe points between ticks.
//!
//! ```text
//! Host::signal(pid, Hangup) ──► hangup.store(true) ──► latch.notify_one()
//!                                                           │
//! run loop: wait(naptime) ◄─────────────────────────────────┘
//!           take(Hangup) → reload config
//! ```
//!
//! ## Rules
//! - At most one pending flag per kind: raising twice before the loop
//!   consumes the flag is the same as raising once.
//! - The latch keeps a single permit: a wake that arrives while the worker is
//!   busy makes the next wait return immediately.
//! - Host shutdown always wins over a pending latch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Signals deliverable to a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Reload configuration at the next safe point.
    Hangup,
    /// Leave the run loop after the current iteration.
    Terminate,
    /// Cancel request: the worker errors out at the next interrupt check.
    Interrupt,
}

/// Why [`WorkerSignals::wait`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeReason {
    /// The latch was set (a signal was raised).
    Latch,
    /// The naptime elapsed.
    Timeout,
    /// The host is shutting down.
    HostShutdown,
}

/// Per-process signal flags plus the latch the run loop sleeps on.
#[derive(Debug, Default)]
pub struct WorkerSignals {
    hangup: AtomicBool,
    terminate: AtomicBool,
    interrupt: AtomicBool,
    latch: Notify,
}

impl WorkerSignals {
    /// Creates an empty signal block.
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, signal: Signal) -> &AtomicBool {
        match signal {
            Signal::Hangup => &self.hangup,
            Signal::Terminate => &self.terminate,
            Signal::Interrupt => &self.interrupt,
        }
    }

    /// Sets the flag for `signal` and wakes the worker.
    pub fn raise(&self, signal: Signal) {
        self.flag(signal).store(true, Ordering::Release);
        self.latch.notify_one();
    }

    /// Returns true if `signal` is pending, without clearing it.
    pub fn is_pending(&self, signal: Signal) -> bool {
        self.flag(signal).load(Ordering::Acquire)
    }

    /// Clears `signal` and returns whether it was pending.
    pub fn take(&self, signal: Signal) -> bool {
        self.flag(signal).swap(false, Ordering::AcqRel)
    }

    /// Blocks until the latch is set, `timeout` elapses, or the host shuts down.
    ///
    /// Returning resets the latch.
    pub async fn wait(&self, timeout: Duration, shutdown: &CancellationToken) -> WakeReason {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => WakeReason::HostShutdown,
            _ = self.latch.notified() => WakeReason::Latch,
            _ = tokio::time::sleep(timeout) => WakeReason::Timeout,
        }
    }
}
