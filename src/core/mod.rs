//! Host runtime: worker slots, supervision, the process table and signals.
//!
//! - [`Host`] and [`HostBuilder`] own the runtime.
//! - The process table lists live worker units with their [`WorkerSignals`].
//! - [`WorkerHandle`] carries the startup handshake of a dynamic registration.

mod actor;
mod builder;
mod config;
mod handle;
mod host;
mod latch;
mod registry;
mod shutdown;

pub use builder::HostBuilder;
pub use config::HostConfig;
pub use handle::{StartupStatus, WorkerHandle};
pub use host::Host;
pub use latch::{Signal, WakeReason, WorkerSignals};
pub use registry::{Activity, ProcessEntry, ProcessId, ProcessInfo, RunState};
