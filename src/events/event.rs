//! # Runtime events emitted by the host and its workers.
//!
//! [`EventKind`] classifies events in four groups:
//! - **Registration**: descriptors accepted by the host;
//! - **Process lifecycle**: spawn, initialization, exit, restart scheduling;
//! - **Worker activity**: ticks and config reloads;
//! - **Host**: shutdown progress and subscriber health.
//!
//! [`Event`] carries the optional metadata (worker name, pid, delay, reason).
//!
//! ## Ordering guarantees
//! Every event gets a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Event, EventKind, ProcessId};
//!
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_worker("tickvisor worker 1")
//!     .with_pid(ProcessId(7))
//!     .with_delay(Duration::from_secs(10));
//!
//! assert_eq!(ev.worker.as_deref(), Some("tickvisor worker 1"));
//! assert_eq!(ev.delay_ms, Some(10_000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::ProcessId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registration ===
    /// A descriptor was accepted and holds a worker slot.
    ///
    /// Sets: `worker`.
    WorkerRegistered,

    // === Process lifecycle ===
    /// A worker unit was spawned.
    ///
    /// Sets: `worker`, `pid`, `attempt` (1-based spawn count for the descriptor).
    WorkerSpawned,

    /// The worker connected and entered its run loop.
    ///
    /// Sets: `worker`, `pid`, `reason` (connected database).
    WorkerInitialized,

    /// The worker unit exited.
    ///
    /// Sets: `worker`, `pid`, `exit_code`, `reason` (exit cause).
    WorkerExited,

    /// The unit will be respawned after `delay_ms`.
    ///
    /// Sets: `worker`, `delay_ms`, `attempt` (spawns so far).
    RestartScheduled,

    // === Worker activity ===
    /// One tick committed.
    ///
    /// Sets: `worker`, `pid`, `attempt` (tick number within this process).
    TickCompleted,

    /// A worker applied a reloaded config.
    ///
    /// Sets: `worker`, `pid`.
    ConfigReloaded,

    /// A worker rejected a reload and kept its previous config.
    ///
    /// Sets: `worker`, `pid`, `reason`.
    ConfigRejected,

    // === Host ===
    /// Shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    /// All supervision actors stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some workers were still live.
    GraceExceeded,

    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `worker` (subscriber name), `reason`.
    SubscriberPanicked,

    /// A subscriber dropped an event (queue full or closed).
    ///
    /// Sets: `worker` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Worker (or subscriber) name, if applicable.
    pub worker: Option<Arc<str>>,
    /// Process id, if applicable.
    pub pid: Option<ProcessId>,
    /// Spawn count or tick number, depending on `kind`.
    pub attempt: Option<u64>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Process exit status.
    pub exit_code: Option<i32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with the current time and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            attempt: None,
            delay_ms: None,
            exit_code: None,
            reason: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, name: impl Into<Arc<str>>) -> Self {
        self.worker = Some(name.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: ProcessId) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a spawn count or tick number.
    #[inline]
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an exit status.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }
}
