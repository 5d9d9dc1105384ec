//! Error types used by the tickvisor host, launcher, and workers.
//!
//! - [`ConfigError`]: invalid or unreadable ticker settings (non-fatal on reload).
//! - [`RegisterError`]: a descriptor was refused by the host.
//! - [`LaunchError`]: a dynamic launch did not produce a running worker.
//! - [`DbError`]: failures reported by an [`Engine`](crate::Engine).
//! - [`WorkerError`]: unrecoverable errors that terminate a worker unit.
//! - [`RuntimeError`]: errors raised by the host runtime itself.
//!
//! Every enum provides `as_label` (a stable snake_case label for logs/metrics).

use std::time::Duration;

use thiserror::Error;

use crate::core::ProcessId;

/// # Errors produced while loading or validating ticker settings.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings source could not be read or deserialized.
    #[error("failed to load ticker settings: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Tick interval is below one second.
    #[error("naptime must be at least 1 second, got {0}")]
    InvalidNaptime(i64),

    /// Restart interval is neither the disabled sentinel nor a non-negative value.
    #[error("restart_time must be -1 (disabled) or >= 0, got {0}")]
    InvalidRestartTime(i64),

    /// Static worker count is below one.
    #[error("total_workers must be at least 1, got {0}")]
    InvalidWorkerCount(i64),

    /// The tick statement is empty.
    #[error("tick statement must not be empty")]
    EmptyStatement,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Load(_) => "config_load",
            ConfigError::InvalidNaptime(_) => "config_invalid_naptime",
            ConfigError::InvalidRestartTime(_) => "config_invalid_restart_time",
            ConfigError::InvalidWorkerCount(_) => "config_invalid_worker_count",
            ConfigError::EmptyStatement => "config_empty_statement",
        }
    }
}

/// # Errors returned when the host refuses a worker descriptor.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Static registration is only accepted before the host starts.
    #[error("static workers must be registered before the host starts")]
    TooLate,

    /// Every worker slot is in use.
    #[error("no free worker slots")]
    NoFreeSlots,

    /// The host is shutting down.
    #[error("host is shutting down")]
    HostShuttingDown,
}

impl RegisterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegisterError::TooLate => "register_too_late",
            RegisterError::NoFreeSlots => "register_no_free_slots",
            RegisterError::HostShuttingDown => "register_host_shutting_down",
        }
    }
}

/// # Errors produced by a dynamic launch.
///
/// Slot exhaustion is **not** an error: the launcher returns `Ok(None)` for it.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The target database name does not resolve.
    #[error("database \"{0}\" does not exist")]
    UnknownDatabase(String),

    /// The worker was registered but stopped before it confirmed startup.
    #[error("could not start background worker")]
    StartupFailed,

    /// The host began shutting down while the launcher was waiting.
    #[error("cannot start background workers while the host is shutting down")]
    HostShuttingDown,

    /// The launch predicate could not be evaluated.
    #[error("launch predicate failed: {0}")]
    Predicate(#[source] DbError),

    /// Resolving the target database failed.
    #[error(transparent)]
    Database(DbError),
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::UnknownDatabase(_) => "launch_unknown_database",
            LaunchError::StartupFailed => "launch_startup_failed",
            LaunchError::HostShuttingDown => "launch_host_shutting_down",
            LaunchError::Predicate(_) => "launch_predicate_failed",
            LaunchError::Database(_) => "launch_database",
        }
    }

    /// Returns an operator-facing hint, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            LaunchError::StartupFailed => Some("More details may be available in the server log."),
            LaunchError::HostShuttingDown => {
                Some("Stop all remaining workers and restart the host.")
            }
            _ => None,
        }
    }
}

/// # Errors reported by a database engine.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DbError {
    /// The requested database does not exist.
    #[error("database {0} does not exist")]
    UnknownDatabase(String),

    /// A statement failed (missing relation, syntax error, ...).
    #[error("statement failed: {0}")]
    Statement(String),

    /// The connection could not be established or was lost.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Error raised by the PostgreSQL driver.
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] sqlx::Error),
}

impl DbError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DbError::UnknownDatabase(_) => "db_unknown_database",
            DbError::Statement(_) => "db_statement",
            DbError::Connection(_) => "db_connection",
            #[cfg(feature = "postgres")]
            DbError::Postgres(_) => "db_postgres",
        }
    }
}

/// # Unrecoverable worker errors.
///
/// None of these are caught inside the run loop: they end the worker unit and
/// the host applies the descriptor's restart policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker could not connect to its target database.
    #[error("could not connect: {0}")]
    Connect(#[source] DbError),

    /// A tick failed; the transaction was rolled back.
    #[error("tick failed: {0}")]
    Tick(#[source] DbError),

    /// An interrupt (cancel request) was honored.
    #[error("canceling statement due to user request")]
    Canceled,
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Connect(_) => "worker_connect",
            WorkerError::Tick(_) => "worker_tick",
            WorkerError::Canceled => "worker_canceled",
        }
    }
}

/// # Errors produced by the host runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some workers were still live.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Workers still in the process table.
        stuck: Vec<ProcessId>,
    },

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signals(_) => "runtime_signals",
        }
    }
}
