//! Database access for huerto-dash
//!
//! The SQLite file lives in the root folder and holds the last good dataset.

pub mod cache;

use huerto_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

pub use cache::{load_snapshot, save_snapshot};

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the cache tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_records (
            fecha TEXT PRIMARY KEY,
            temperatura REAL NOT NULL,
            humedad REAL NOT NULL,
            conductibilidad REAL NOT NULL,
            estado INTEGER NOT NULL CHECK (estado IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Single row: id is pinned to 1
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_snapshot (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            refreshed_at TEXT NOT NULL,
            record_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (dataset_records, dataset_snapshot)");

    Ok(())
}
