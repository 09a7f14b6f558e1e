//! Database access for KeyFit
//!
//! **[KF-DB-010]** All KeyFit services share one SQLite database in the root
//! folder. Table creation is idempotent; every service may call
//! `init_database` at startup.

pub mod records;

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Initialize database connection pool, creating the file and tables on
/// first run.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows the web application to read while a sync run writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create the compatibility tables if they don't exist (idempotent).
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transponder_records (
            guid TEXT PRIMARY KEY,
            make TEXT NOT NULL,
            model TEXT NOT NULL,
            year_start INTEGER NOT NULL,
            year_end INTEGER,
            transponder_type TEXT NOT NULL DEFAULT '',
            chip_types TEXT NOT NULL DEFAULT '[]',
            compatible_parts TEXT NOT NULL DEFAULT '[]',
            frequency TEXT,
            notes TEXT,
            non_transponder INTEGER NOT NULL DEFAULT 0,
            source TEXT,
            confidence REAL NOT NULL DEFAULT 0.0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // (make, model, year_start) is the natural key; upserts rely on it
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_transponder_natural_key
        ON transponder_records(make, model, year_start)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
