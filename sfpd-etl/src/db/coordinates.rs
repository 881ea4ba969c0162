//! Coordinate cache table operations
//!
//! Keys are compared as REAL values. Callers pass `f64` on both the insert
//! and the lookup path so the stored and queried representations match.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// One `coordinates` row
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub lng: f64,
    pub lat: f64,
    pub neighborhood: String,
}

/// Stored neighborhood for an exact (lng, lat) match
pub async fn find_neighborhood(
    pool: &SqlitePool,
    lng: f64,
    lat: f64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT neighborhood FROM coordinates WHERE lng = ? AND lat = ? LIMIT 1")
        .bind(lng)
        .bind(lat)
        .fetch_optional(pool)
        .await
}

pub async fn insert_entry(pool: &SqlitePool, entry: &CacheEntry) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO coordinates (lng, lat, neighborhood) VALUES (?, ?, ?)")
        .bind(entry.lng)
        .bind(entry.lat)
        .bind(&entry.neighborhood)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert many entries with one multi-row INSERT statement
///
/// Returns the number of rows written. An empty slice is a no-op.
pub async fn insert_batch(pool: &SqlitePool, entries: &[CacheEntry]) -> Result<u64, sqlx::Error> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO coordinates (lat, lng, neighborhood) ");
    builder.push_values(entries, |mut row, entry| {
        row.push_bind(entry.lat)
            .push_bind(entry.lng)
            .push_bind(&entry.neighborhood);
    });

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn count_entries(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM coordinates")
        .fetch_one(pool)
        .await
}
