//! Restart policy for worker units.
//!
//! ## Quick wiring
//! ```text
//! TickerConfig { restart: RestartPolicy, .. }
//!      └─► WorkerDescriptor { restart, .. }
//!           └─► core::host supervision actor:
//!                - Never     → release slot after the unit exits
//!                - After(d)  → publish RestartScheduled, sleep d, respawn
//! ```

mod restart;

pub use restart::{RestartPolicy, RESTART_DISABLED};
