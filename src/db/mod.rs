/// Database layer for the films catalog
///
/// Manages the SQLite connection pool and the embedded migrations that
/// create the `users` and `films` tables.

use crate::error::{CatalogError, CatalogResult};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> CatalogResult<SqlitePool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    sqlx::sqlite::SqliteJournalMode::Wal
                } else {
                    sqlx::sqlite::SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Run migrations embedded at compile time from ./migrations
pub async fn run_migrations(pool: &SqlitePool) -> CatalogResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| CatalogError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> CatalogResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Migrated pool in a scratch directory, plus a couple of known users
#[cfg(test)]
pub async fn test_pool(dir: &Path) -> SqlitePool {
    let pool = create_pool(&dir.join("catalog.sqlite"), DatabaseOptions::default())
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();

    for (id, name) in [("alice", "Alice"), ("bob", "Bob")] {
        sqlx::query("INSERT INTO users (id, user_name, email) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(format!("{}@example.com", id))
            .execute(&pool)
            .await
            .unwrap();
    }

    pool
}
