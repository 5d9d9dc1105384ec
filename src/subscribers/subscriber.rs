//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging event handlers into the host
//! (logging, metrics, alerting on crash loops, ...).
//!
//! Each subscriber gets:
//! - a **dedicated worker task** (runs independently);
//! - a **bounded queue** (capacity via [`Subscribe::queue_capacity`]);
//! - **panic isolation** (panics are reported as `EventKind::SubscriberPanicked`).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use tickvisor::{Event, EventKind, Subscribe};
//!
//! struct CrashAlert;
//!
//! #[async_trait]
//! impl Subscribe for CrashAlert {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::WorkerExited) && ev.reason.is_some() {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "crash-alert" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for host observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event. Events arrive in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity (clamped to at least 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
