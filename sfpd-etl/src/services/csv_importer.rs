//! Bulk import of a known coordinate → neighborhood mapping
//!
//! Reads `lat,lng,neighborhood` rows (header skipped) straight into the
//! cache table, bypassing the geocoder. Rows already cached are skipped;
//! new rows are written in multi-row INSERTs of up to [`IMPORT_BATCH_SIZE`].
//!
//! The existence check and the batched insert are not atomic. Run a single
//! importer per cache file.

use crate::db::coordinates::{self, CacheEntry};
use crate::error::{EtlError, EtlResult};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;

pub const IMPORT_BATCH_SIZE: usize = 500;

/// Outcome of one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub rows_read: usize,
    pub inserted: usize,
    /// Rows whose coordinates were already cached or already queued
    pub skipped: usize,
    /// INSERT statements issued
    pub batches: usize,
}

/// Import `csv_path` into the cache in batches of [`IMPORT_BATCH_SIZE`]
pub async fn import_cache(pool: &SqlitePool, csv_path: &Path) -> EtlResult<ImportStats> {
    import_cache_batched(pool, csv_path, IMPORT_BATCH_SIZE).await
}

pub async fn import_cache_batched(
    pool: &SqlitePool,
    csv_path: &Path,
    batch_size: usize,
) -> EtlResult<ImportStats> {
    if batch_size == 0 {
        return Err(EtlError::Import("batch size must be positive".to_string()));
    }

    tracing::info!(path = %csv_path.display(), batch_size, "Importing coordinate mapping");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)?;

    let mut stats = ImportStats::default();
    let mut buffer: Vec<CacheEntry> = Vec::with_capacity(batch_size);
    let mut queued: HashSet<(u64, u64)> = HashSet::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        stats.rows_read += 1;

        // Header is line 1
        let entry = parse_row(&record, index + 2)?;
        let key = (entry.lng.to_bits(), entry.lat.to_bits());

        if queued.contains(&key)
            || coordinates::find_neighborhood(pool, entry.lng, entry.lat)
                .await?
                .is_some()
        {
            stats.skipped += 1;
            continue;
        }

        queued.insert(key);
        buffer.push(entry);

        if buffer.len() >= batch_size {
            flush(pool, &mut buffer, &mut queued, &mut stats).await?;
        }
    }

    flush(pool, &mut buffer, &mut queued, &mut stats).await?;

    tracing::info!(
        rows_read = stats.rows_read,
        inserted = stats.inserted,
        skipped = stats.skipped,
        batches = stats.batches,
        "Coordinate import complete"
    );

    Ok(stats)
}

async fn flush(
    pool: &SqlitePool,
    buffer: &mut Vec<CacheEntry>,
    queued: &mut HashSet<(u64, u64)>,
    stats: &mut ImportStats,
) -> EtlResult<()> {
    if buffer.is_empty() {
        return Ok(());
    }

    let written = coordinates::insert_batch(pool, buffer).await?;
    stats.inserted += written as usize;
    stats.batches += 1;
    tracing::debug!(batch = stats.batches, rows = written, "Flushed import batch");

    buffer.clear();
    queued.clear();
    Ok(())
}

fn parse_row(record: &csv::StringRecord, line: usize) -> EtlResult<CacheEntry> {
    let field = |i: usize, name: &str| {
        record
            .get(i)
            .ok_or_else(|| EtlError::Import(format!("line {}: missing {} column", line, name)))
    };
    let number = |i: usize, name: &str| -> EtlResult<f64> {
        let raw = field(i, name)?;
        raw.trim().parse::<f64>().map_err(|_| {
            EtlError::Import(format!("line {}: {} '{}' is not a number", line, name, raw))
        })
    };

    Ok(CacheEntry {
        lat: number(0, "lat")?,
        lng: number(1, "lng")?,
        neighborhood: field(2, "neighborhood")?.to_string(),
    })
}
