//! # In-memory engine.
//!
//! A tiny engine with one heartbeat table per database. Every successful
//! statement counts as one heartbeat update; commit applies the updates and
//! bumps the heartbeat sequence.
//!
//! Used by the test-suite and by embedders that want the supervision logic
//! without a real database.
//!
//! ## Failure switches
//! - [`MemoryEngine::drop_heartbeat`] removes the heartbeat table: every
//!   statement then fails as if the relation was renamed or dropped.
//! - Unknown names/ids fail [`Engine::connect`] with `DbError::UnknownDatabase`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ConnectTarget, DatabaseId, Engine, LaunchPredicate, Session, Transaction};
use crate::error::DbError;

/// First identifier handed out (keeps small ids free, like system catalogs do).
const FIRST_DATABASE_ID: u32 = 16384;

/// Name reported when the heartbeat table is missing.
const HEARTBEAT_RELATION: &str = "tickvisor.heartbeat";

/// Last committed heartbeat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    /// Number of committed heartbeat updates (strictly increasing).
    pub seq: u64,
    /// Commit time of the last update.
    pub at: DateTime<Utc>,
}

/// Transaction counters for one database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxCounters {
    /// Transactions opened.
    pub begun: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions dropped without commit.
    pub rolled_back: u64,
}

#[derive(Debug)]
struct MemoryDatabase {
    name: String,
    has_heartbeat_table: bool,
    heartbeat: Option<Heartbeat>,
    replicated: bool,
    tx: TxCounters,
}

#[derive(Debug)]
struct State {
    next_id: u32,
    databases: BTreeMap<DatabaseId, MemoryDatabase>,
}

/// Shared in-memory engine. Cloning is cheap and clones share state.
#[derive(Clone, Debug)]
pub struct MemoryEngine {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an engine without databases.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: FIRST_DATABASE_ID,
                databases: BTreeMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a database (with its heartbeat table) and returns its id.
    pub fn create_database(&self, name: impl Into<String>) -> DatabaseId {
        let mut state = self.lock();
        let id = DatabaseId(state.next_id);
        state.next_id += 1;
        state.databases.insert(
            id,
            MemoryDatabase {
                name: name.into(),
                has_heartbeat_table: true,
                heartbeat: None,
                replicated: false,
                tx: TxCounters::default(),
            },
        );
        id
    }

    /// Returns the last committed heartbeat, if any.
    pub fn heartbeat(&self, db: DatabaseId) -> Option<Heartbeat> {
        self.lock().databases.get(&db).and_then(|d| d.heartbeat)
    }

    /// Removes the heartbeat table; subsequent statements fail.
    pub fn drop_heartbeat(&self, db: DatabaseId) {
        if let Some(d) = self.lock().databases.get_mut(&db) {
            d.has_heartbeat_table = false;
        }
    }

    /// Re-creates the heartbeat table (keeps the last heartbeat value).
    pub fn restore_heartbeat(&self, db: DatabaseId) {
        if let Some(d) = self.lock().databases.get_mut(&db) {
            d.has_heartbeat_table = true;
        }
    }

    /// Marks whether the database has replicated tables.
    pub fn set_replicated(&self, db: DatabaseId, replicated: bool) {
        if let Some(d) = self.lock().databases.get_mut(&db) {
            d.replicated = replicated;
        }
    }

    /// Returns transaction counters for `db`.
    pub fn transactions(&self, db: DatabaseId) -> TxCounters {
        self.lock()
            .databases
            .get(&db)
            .map(|d| d.tx)
            .unwrap_or_default()
    }

    fn find(&self, target: &ConnectTarget) -> Result<DatabaseId, DbError> {
        let state = self.lock();
        match target {
            ConnectTarget::Id(id) if state.databases.contains_key(id) => Ok(*id),
            ConnectTarget::Id(id) => Err(DbError::UnknownDatabase(format!("with oid {id}"))),
            ConnectTarget::Name(name) => state
                .databases
                .iter()
                .find(|(_, d)| &d.name == name)
                .map(|(id, _)| *id)
                .ok_or_else(|| DbError::UnknownDatabase(format!("\"{name}\""))),
        }
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn connect(
        &self,
        target: &ConnectTarget,
        _application_name: &str,
    ) -> Result<Box<dyn Session>, DbError> {
        let db = self.find(target)?;
        Ok(Box::new(MemorySession {
            engine: self.clone(),
            db,
        }))
    }

    async fn resolve_database(&self, name: &str) -> Result<Option<DatabaseId>, DbError> {
        match self.find(&ConnectTarget::Name(name.to_string())) {
            Ok(id) => Ok(Some(id)),
            Err(DbError::UnknownDatabase(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LaunchPredicate for MemoryEngine {
    async fn should_launch(&self, database: DatabaseId) -> Result<bool, DbError> {
        self.lock()
            .databases
            .get(&database)
            .map(|d| d.replicated)
            .ok_or_else(|| DbError::UnknownDatabase(format!("with oid {database}")))
    }
}

struct MemorySession {
    engine: MemoryEngine,
    db: DatabaseId,
}

#[async_trait]
impl Session for MemorySession {
    fn database(&self) -> DatabaseId {
        self.db
    }

    async fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, DbError> {
        let mut state = self.engine.lock();
        let d = state
            .databases
            .get_mut(&self.db)
            .ok_or_else(|| DbError::Connection(format!("database {} was dropped", self.db)))?;
        d.tx.begun += 1;

        Ok(Box::new(MemoryTransaction {
            engine: self.engine.clone(),
            db: self.db,
            updates: 0,
            finished: false,
        }))
    }
}

struct MemoryTransaction {
    engine: MemoryEngine,
    db: DatabaseId,
    updates: u64,
    finished: bool,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn execute(&mut self, _statement: &str) -> Result<u64, DbError> {
        let state = self.engine.lock();
        match state.databases.get(&self.db) {
            Some(d) if d.has_heartbeat_table => {
                self.updates += 1;
                Ok(1)
            }
            Some(_) => Err(DbError::Statement(format!(
                "relation \"{HEARTBEAT_RELATION}\" does not exist"
            ))),
            None => Err(DbError::Connection(format!(
                "database {} was dropped",
                self.db
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let mut this = self;
        {
            let mut state = this.engine.lock();
            let d = state.databases.get_mut(&this.db).ok_or_else(|| {
                DbError::Connection(format!("database {} was dropped", this.db))
            })?;

            if this.updates > 0 {
                let seq = d.heartbeat.map_or(0, |h| h.seq) + this.updates;
                d.heartbeat = Some(Heartbeat {
                    seq,
                    at: Utc::now(),
                });
            }
            d.tx.committed += 1;
        }
        this.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(d) = self.engine.lock().databases.get_mut(&self.db) {
            d.tx.rolled_back += 1;
        }
    }
}
