//! # tickvisor
//!
//! **Tickvisor** runs supervised heartbeat workers against a database.
//!
//! Each worker connects to one database and, every `naptime` seconds, runs
//! one statement inside its own transaction (a *tick*). Workers react to
//! signals between ticks: hang-up reloads configuration, terminate stops the
//! loop, interrupt cancels the unit. The host restarts static units after
//! `restart_time`; launched units are never respawned.
//!
//! ## Architecture
//! ```text
//!   register_static_workers()          Launcher::launch(db)
//!   (before start)                     (runtime, with duplicate guard)
//!            │                                   │
//!            ▼                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Host (worker supervisor)                                         │
//! │  - worker slots (max_worker_processes)                            │
//! │  - ProcessTable (live units, signal flags, activity)              │
//! │  - Bus (broadcast events) ──► SubscriberSet ──► LogWriter, ...    │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!   │ WorkerActor │   │ WorkerActor │   │ WorkerActor │   one per descriptor
//!   │ (restarts)  │   │ (restarts)  │   │ (restarts)  │
//!   └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!          ▼                 ▼                 ▼
//!     ticker_main        ticker_main       ticker_main     one task per unit
//!     wait → tick        wait → tick       wait → tick
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tickvisor::{
//!     ConfigStore, Host, HostConfig, Launcher, MemoryEngine, MemorySettings, TickerSettings,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = MemoryEngine::new();
//!     engine.create_database("app");
//!
//!     let config = ConfigStore::load(MemorySettings::new(TickerSettings::default()))?;
//!     let host = Host::builder(HostConfig::default(), Arc::new(engine.clone()), config).build();
//!     host.start();
//!
//!     let launcher = Launcher::new(Arc::clone(&host));
//!     let pid = launcher.launch("app").await?;
//!     assert!(pid.is_some());
//!
//!     // a ticker is already running for "app"
//!     assert_eq!(launcher.launch("app").await?, None);
//!
//!     host.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod db;
mod error;
mod events;
mod launcher;
mod policies;
mod registrar;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use crate::config::{
    ConfigStore, FileSettings, MemorySettings, SettingsSource, TickerConfig, TickerSettings,
    DEFAULT_STATEMENT,
};
pub use crate::core::{
    Activity, Host, HostBuilder, HostConfig, ProcessEntry, ProcessId, ProcessInfo, RunState,
    Signal, StartupStatus, WakeReason, WorkerHandle, WorkerSignals,
};
pub use db::{
    ConnectTarget, DatabaseId, Engine, Heartbeat, LaunchPredicate, MemoryEngine, Session,
    Transaction, TxCounters,
};
#[cfg(feature = "postgres")]
pub use db::{PgEngine, ReplicationSets};
pub use error::{ConfigError, DbError, LaunchError, RegisterError, RuntimeError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use launcher::Launcher;
pub use policies::{RestartPolicy, RESTART_DISABLED};
pub use registrar::register_static_workers;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use worker::{
    ticker_main, StartTrigger, WorkerContext, WorkerDescriptor, WorkerExit, WorkerKind,
    WorkerMain, BACKEND_TYPE, DYNAMIC_WORKER_NAME,
};
