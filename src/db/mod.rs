//! # Database engine seam.
//!
//! Workers never talk to a driver directly. They go through three traits:
//!
//! ```text
//! Engine ──connect(target, application_name)──► Session ──begin()──► Transaction
//!   │                                                                  ├─ execute(statement)
//!   └─ resolve_database(name) → DatabaseId                             └─ commit()  (drop = rollback)
//! ```
//!
//! ## Rules
//! - A [`Session`] belongs to exactly one worker and is never shared.
//! - [`Session::begin`] opens the transaction and establishes its read snapshot.
//! - A [`Transaction`] dropped without [`Transaction::commit`] rolls back.
//!
//! Implementations:
//! - [`MemoryEngine`] in-process engine with a heartbeat table (tests, embedding);
//! - `PgEngine` PostgreSQL through `sqlx` (feature `postgres`).

use std::fmt;

use async_trait::async_trait;

use crate::error::DbError;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{Heartbeat, MemoryEngine, TxCounters};
#[cfg(feature = "postgres")]
pub use postgres::{PgEngine, ReplicationSets};

/// Engine-assigned database identifier (an oid).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseId(pub u32);

impl DatabaseId {
    /// "No database given": the worker must rely on the configured name.
    pub const INVALID: DatabaseId = DatabaseId(0);

    /// Returns true unless this is [`DatabaseId::INVALID`].
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a worker picks the database it connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Connect by database name.
    Name(String),
    /// Connect by database identifier.
    Id(DatabaseId),
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Name(name) => write!(f, "\"{name}\""),
            ConnectTarget::Id(id) => write!(f, "oid {id}"),
        }
    }
}

/// A database engine workers can connect to.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Opens a dedicated session on `target`, labelled with `application_name`.
    async fn connect(
        &self,
        target: &ConnectTarget,
        application_name: &str,
    ) -> Result<Box<dyn Session>, DbError>;

    /// Resolves a database name; `Ok(None)` if it does not exist.
    async fn resolve_database(&self, name: &str) -> Result<Option<DatabaseId>, DbError>;
}

/// A dedicated connection owned by one worker.
#[async_trait]
pub trait Session: Send {
    /// Identifier of the database this session is connected to.
    fn database(&self) -> DatabaseId;

    /// Starts a transaction and takes its snapshot.
    async fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, DbError>;
}

/// An open transaction. Dropping it without commit rolls back.
#[async_trait]
pub trait Transaction: Send {
    /// Executes one statement; returns the number of affected rows.
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError>;

    /// Commits and closes the transaction.
    async fn commit(self: Box<Self>) -> Result<(), DbError>;
}

/// External decision on whether a database should get a ticker at all.
///
/// Used by [`Launcher::launch_if`](crate::Launcher::launch_if).
#[async_trait]
pub trait LaunchPredicate: Send + Sync {
    /// Returns true if a worker should be launched for `database`.
    async fn should_launch(&self, database: DatabaseId) -> Result<bool, DbError>;
}
