//! Database access for ordr-rv
//!
//! One SQLite file holding the latest reconciliation report per document.

pub mod reports;

pub use reports::SqliteReportStore;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT_MS: u64 = 5000;
const MAX_CONNECTIONS: u32 = 8;

/// Initialize database connection pool and tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }

    tracing::debug!(path = %db_path.display(), "Connecting to database");

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true),
        )
        .await
        .context("Failed to open report database")?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create ordr-rv tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS validation_reports (
            document_id INTEGER PRIMARY KEY,
            freshness INTEGER NOT NULL,
            produced_at TEXT NOT NULL,
            report TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create validation_reports table")?;

    tracing::info!("Database tables initialized (validation_reports)");

    Ok(())
}
