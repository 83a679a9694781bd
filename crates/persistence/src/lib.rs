//! Persistence layer for the momentum screener
//!
//! SQLite storage for the stock master list, daily prices, benchmark history,
//! indicator snapshots and signals.

pub mod repository;
pub mod schema;

pub use sqlx::sqlite::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file at `path` and ensure the schema exists
    pub async fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Connection(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .pragma("cache_size", "-8000");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;

        let db = Self { pool };
        db.create_schema().await?;

        info!(path = %path.display(), "SQLite database ready");
        Ok(db)
    }

    /// Single-connection in-memory database (tests, one-off runs)
    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.create_schema().await?;
        Ok(db)
    }

    async fn create_schema(&self) -> DbResult<()> {
        sqlx::raw_sql(schema::CREATE_TABLES)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Schema(e.to_string()))?;
        debug!("Schema verified");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.create_schema().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["benchmark_history", "indicators", "prices", "signals", "stocks"]
        );
    }

    #[tokio::test]
    async fn test_file_database_reopens() {
        let dir = std::env::temp_dir().join(format!("momentum-db-{}", std::process::id()));
        let path = dir.join("nested").join("screener.db");

        let db = Database::new(&path).await.unwrap();
        sqlx::query("INSERT INTO stocks (symbol) VALUES ('TCS.NS')")
            .execute(db.pool())
            .await
            .unwrap();
        db.pool().close().await;

        let reopened = Database::new(&path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stocks")
            .fetch_one(reopened.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        reopened.pool().close().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unusable_parent_directory_is_a_connection_error() {
        let blocker = std::env::temp_dir().join(format!("momentum-file-{}", std::process::id()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = Database::new(blocker.join("data").join("screener.db")).await;
        std::fs::remove_file(&blocker).ok();

        match result {
            Err(DbError::Connection(msg)) => {
                assert!(msg.contains("momentum-file-"), "unexpected message: {msg}")
            }
            Err(other) => panic!("expected a connection error, got {other}"),
            Ok(_) => panic!("expected a connection error"),
        }
    }
}
