//! Persistence layer — libSQL handle, transactions, and schema migrations.
//!
//! The handle owns exactly one connection behind an async mutex. Every unit
//! of work (a single statement or a whole transaction) holds the lock for its
//! duration, so a transaction never interleaves with another request.

pub mod migrations;

use std::future::Future;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::DatabaseError;

/// Shared database handle, constructed once at startup and injected into
/// the service layer.
pub struct Store {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection for a unit of work that needs no transaction.
    pub async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// Lock the connection and open a transaction on it.
    ///
    /// The returned handle derefs to [`Connection`], so repositories can run
    /// inside it unchanged. Finish it with [`StoreTx::finish`].
    pub async fn begin(&self) -> Result<StoreTx<'_>, DatabaseError> {
        let guard = self.conn.lock().await;
        let tx = guard
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin transaction: {e}")))?;
        Ok(StoreTx { tx, _guard: guard })
    }
}

/// An open transaction holding the connection lock.
///
/// Dropping it without committing rolls the transaction back before the
/// lock is released (fields drop in declaration order).
pub struct StoreTx<'a> {
    tx: Transaction,
    _guard: MutexGuard<'a, Connection>,
}

impl StoreTx<'_> {
    pub async fn commit(self) -> Result<(), DatabaseError> {
        let StoreTx { tx, _guard } = self;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit: {e}")))
    }

    pub async fn rollback(self) -> Result<(), DatabaseError> {
        let StoreTx { tx, _guard } = self;
        tx.rollback()
            .await
            .map_err(|e| DatabaseError::Query(format!("rollback: {e}")))
    }

    /// Commit when `result` is `Ok`, roll back otherwise, and hand the
    /// result back to the caller.
    pub async fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DatabaseError>,
    {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = self.rollback().await {
                    warn!(error = %rb, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl Deref for StoreTx<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

/// Run `work` inside a savepoint named `name`.
///
/// On error everything `work` wrote is undone and the error is returned.
/// Savepoints nest, so this is atomic on its own and also inside an outer
/// [`StoreTx`]. `work` is a lazy future, so nothing runs before the
/// savepoint exists.
pub async fn atomically<T, F>(conn: &Connection, name: &'static str, work: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    conn.execute(&format!("SAVEPOINT {name}"), ())
        .await
        .map_err(|e| DatabaseError::Query(format!("savepoint {name}: {e}")))?;

    match work.await {
        Ok(value) => {
            conn.execute(&format!("RELEASE SAVEPOINT {name}"), ())
                .await
                .map_err(|e| DatabaseError::Query(format!("release {name}: {e}")))?;
            Ok(value)
        }
        Err(e) => {
            // ROLLBACK TO keeps the savepoint open, so it still needs a RELEASE.
            let undo = format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};");
            if let Err(rb) = conn.execute_batch(&undo).await {
                warn!(savepoint = name, error = %rb, "Savepoint rollback failed");
            }
            Err(e)
        }
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // RFC 3339 is the canonical write format
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_time(chrono::NaiveTime::MIN).and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Read the single integer in the first column of the first row.
pub(crate) async fn query_scalar(
    conn: &Connection,
    op: &str,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Option<i64>, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::from_libsql(op, e))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(Some(
            row.get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("{op} row: {e}")))?,
        )),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("{op} row: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count_rows(conn: &Connection, sql: &str) -> i64 {
        query_scalar(conn, "count", sql, ()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let count = count_rows(
            &conn,
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='todo_tags'",
        )
        .await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("todos.db");
        let store = Store::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(store);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let result = conn
            .execute(
                "INSERT INTO todos (owner_id, name, created_at) VALUES (999, 'orphan', '2026-01-01')",
                (),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn finish_commits_on_ok() {
        let store = Store::new_memory().await.unwrap();
        let tx = store.begin().await.unwrap();
        let work = tx
            .execute(
                "INSERT INTO accounts (username, password_digest, created_at) VALUES ('ann', 'x', '2026-01-01')",
                (),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("insert", e));
        tx.finish(work).await.unwrap();

        let conn = store.conn().await;
        assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM accounts").await, 1);
    }

    #[tokio::test]
    async fn finish_rolls_back_on_err() {
        let store = Store::new_memory().await.unwrap();
        let tx = store.begin().await.unwrap();
        tx.execute(
            "INSERT INTO accounts (username, password_digest, created_at) VALUES ('ann', 'x', '2026-01-01')",
            (),
        )
        .await
        .unwrap();
        let failed: Result<(), DatabaseError> = Err(DatabaseError::Query("forced".into()));
        assert!(tx.finish(failed).await.is_err());

        let conn = store.conn().await;
        assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM accounts").await, 0);
    }

    #[tokio::test]
    async fn savepoint_undoes_partial_work() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;

        let result: Result<(), DatabaseError> = atomically(&conn, "sp_test", async {
            conn.execute(
                "INSERT INTO accounts (username, password_digest, created_at) VALUES ('ann', 'x', '2026-01-01')",
                (),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("insert", e))?;
            Err(DatabaseError::Query("forced".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM accounts").await, 0);
    }

    #[tokio::test]
    async fn savepoint_keeps_successful_work() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;

        atomically(&conn, "sp_test", async {
            conn.execute(
                "INSERT INTO accounts (username, password_digest, created_at) VALUES ('ann', 'x', '2026-01-01')",
                (),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("insert", e))?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM accounts").await, 1);
    }
}
