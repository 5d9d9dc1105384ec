//! # Host runtime configuration.
//!
//! [`HostConfig`] holds the settings of the host itself (not of the ticker):
//! shutdown grace, the worker slot limit and the event bus size.
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for workers on shutdown
//! - `bus_capacity` is clamped to a minimum of 1

use std::time::Duration;

/// Global configuration for the worker host.
///
/// ## Field semantics
/// - `grace`: maximum wait for workers to stop after shutdown is requested
/// - `max_worker_processes`: number of worker slots (static and dynamic share them)
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// When shutdown is requested:
    /// - every worker observes host shutdown at its next wait
    /// - the host waits up to `grace` for all supervision actors to finish
    /// - if exceeded, `RuntimeError::GraceExceeded` lists the stuck pids
    pub grace: Duration,

    /// Number of worker slots.
    ///
    /// A registered descriptor holds its slot until its actor finishes (restart
    /// delays included). A registration with no free slot is refused.
    pub max_worker_processes: usize,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Receivers lagging more than `bus_capacity` events skip the older ones.
    pub bus_capacity: usize,
}

impl HostConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for HostConfig {
    /// - `grace = 10s`
    /// - `max_worker_processes = 8`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            max_worker_processes: 8,
            bus_capacity: 1024,
        }
    }
}
