//! PostgreSQL engine backed by `sqlx`.
//!
//! Every worker gets its own [`PgConnection`]; there is no pool because a
//! session is never shared. Database names and oids are resolved through
//! `pg_database` on a maintenance connection built from the base options.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    postgres::{types::Oid, PgConnectOptions},
    ConnectOptions as _, Connection as _, PgConnection, Postgres,
};
use tracing::instrument;

use super::{ConnectTarget, DatabaseId, Engine, LaunchPredicate, Session, Transaction};
use crate::error::DbError;

/// Engine connecting to a PostgreSQL cluster.
#[derive(Clone, Debug)]
pub struct PgEngine {
    base: PgConnectOptions,
}

impl PgEngine {
    /// Creates an engine from a connection URL. The URL's database is used
    /// for catalog lookups; workers connect to their own target database.
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        Ok(Self::new(PgConnectOptions::from_str(url)?))
    }

    /// Creates an engine from explicit connect options.
    pub fn new(base: PgConnectOptions) -> Self {
        Self { base }
    }

    async fn maintenance(&self) -> Result<PgConnection, DbError> {
        Ok(self
            .base
            .clone()
            .application_name("tickvisor launcher")
            .connect()
            .await?)
    }

    /// Looks up the name of a database by oid.
    #[instrument(skip(self), err)]
    pub async fn database_name(&self, id: DatabaseId) -> Result<Option<String>, DbError> {
        let mut conn = self.maintenance().await?;
        let name = sqlx::query_scalar::<_, String>("SELECT datname FROM pg_database WHERE oid = $1")
            .bind(Oid(id.0))
            .fetch_optional(&mut conn)
            .await?;
        Ok(name)
    }
}

#[async_trait]
impl Engine for PgEngine {
    #[instrument(skip(self), err)]
    async fn connect(
        &self,
        target: &ConnectTarget,
        application_name: &str,
    ) -> Result<Box<dyn Session>, DbError> {
        let name = match target {
            ConnectTarget::Name(name) => name.clone(),
            ConnectTarget::Id(id) => self
                .database_name(*id)
                .await?
                .ok_or_else(|| DbError::UnknownDatabase(format!("with oid {id}")))?,
        };

        let mut conn = self
            .base
            .clone()
            .database(&name)
            .application_name(application_name)
            .connect()
            .await?;

        let Oid(oid) = sqlx::query_scalar::<_, Oid>(
            "SELECT oid FROM pg_database WHERE datname = current_database()",
        )
        .fetch_one(&mut conn)
        .await?;

        Ok(Box::new(PgSession {
            conn,
            db: DatabaseId(oid),
        }))
    }

    #[instrument(skip(self), err)]
    async fn resolve_database(&self, name: &str) -> Result<Option<DatabaseId>, DbError> {
        let mut conn = self.maintenance().await?;
        let oid = sqlx::query_scalar::<_, Oid>("SELECT oid FROM pg_database WHERE datname = $1")
            .bind(name)
            .fetch_optional(&mut conn)
            .await?;
        Ok(oid.map(|Oid(o)| DatabaseId(o)))
    }
}

struct PgSession {
    conn: PgConnection,
    db: DatabaseId,
}

#[async_trait]
impl Session for PgSession {
    fn database(&self) -> DatabaseId {
        self.db
    }

    async fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, DbError> {
        let tx = self.conn.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

struct PgTransaction<'c> {
    tx: sqlx::Transaction<'c, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction<'_> {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        let done = sqlx::query(statement).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Launch predicate: true when the database has at least one table in a
/// logical replication set.
///
/// Connects to the target database and checks `pglogical.replication_set_table`.
/// A database without the `pglogical` schema is reported as not replicated.
#[derive(Clone, Debug)]
pub struct ReplicationSets {
    engine: PgEngine,
}

impl ReplicationSets {
    /// Creates the predicate on top of `engine`.
    pub fn new(engine: PgEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl LaunchPredicate for ReplicationSets {
    #[instrument(skip(self), err)]
    async fn should_launch(&self, database: DatabaseId) -> Result<bool, DbError> {
        let name = self
            .engine
            .database_name(database)
            .await?
            .ok_or_else(|| DbError::UnknownDatabase(format!("with oid {database}")))?;

        let mut conn = self
            .engine
            .base
            .clone()
            .database(&name)
            .application_name("tickvisor launcher")
            .connect()
            .await?;

        let replicated = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pglogical.replication_set_table)",
        )
        .fetch_one(&mut conn)
        .await;

        match replicated {
            Ok(r) => Ok(r),
            // undefined_table: the schema is absent
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42P01") => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
