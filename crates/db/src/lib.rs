pub mod migrate;
pub mod repo;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Create a SQLite connection pool with WAL mode enabled.
///
/// `:memory:` gives a private in-memory database; the pool is limited to a
/// single connection in that case so every query sees the same database.
pub async fn connect(db_path: &str) -> Result<SqlitePool, DbError> {
    let in_memory = db_path == ":memory:";

    // Ensure parent directory exists
    if !in_memory {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut opts = SqliteConnectOptions::from_str(db_path)?.create_if_missing(true);
    if !in_memory {
        opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
    }

    let mut pool_opts = SqlitePoolOptions::new().max_connections(5);
    if in_memory {
        pool_opts = pool_opts
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_opts.connect_with(opts).await?;

    Ok(pool)
}
