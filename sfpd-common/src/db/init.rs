//! Database initialization
//!
//! Opens (or creates) the SQLite coordinate cache and makes sure its table
//! and index exist. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the coordinate cache at `db_path`, creating file and schema if needed
pub async fn init_cache_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // One connection: the cache has a single writer
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new cache database: {}", db_path.display());
    } else {
        info!("Opened existing cache database: {}", db_path.display());
    }

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_coordinates_table(&pool).await?;

    Ok(pool)
}

/// Create the `coordinates` table and its lookup index
pub async fn create_coordinates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coordinates (
            lng REAL,
            lat REAL,
            neighborhood TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS coordinates_idx ON coordinates (lng, lat)")
        .execute(pool)
        .await?;

    Ok(())
}
