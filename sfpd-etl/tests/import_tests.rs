//! Coordinate mapping CSV import

mod helpers;

use helpers::memory_pool;
use sfpd_etl::db::coordinates::{self, CacheEntry};
use sfpd_etl::services::csv_importer::{import_cache, import_cache_batched, IMPORT_BATCH_SIZE};
use sfpd_etl::EtlError;
use std::fmt::Write as _;
use std::path::PathBuf;

fn write_csv(dir: &tempfile::TempDir, rows: &[(f64, f64, &str)]) -> PathBuf {
    let mut body = String::from("lat,lng,neighborhood\n");
    for (lat, lng, name) in rows {
        writeln!(body, "{},{},{}", lat, lng, name).unwrap();
    }
    let path = dir.path().join("locations.csv");
    std::fs::write(&path, body).unwrap();
    path
}

/// `n` distinct coordinate rows
fn distinct_rows(n: usize) -> Vec<(f64, f64, &'static str)> {
    (0..n)
        .map(|i| (37.70 + i as f64 * 0.0001, -122.50 + i as f64 * 0.0001, "Sunset"))
        .collect()
}

#[tokio::test]
async fn test_import_all_new_rows_with_partial_final_batch() {
    let dir = tempfile::tempdir().unwrap();
    let rows = distinct_rows(1201);
    let path = write_csv(&dir, &rows);
    let pool = memory_pool().await;

    let stats = import_cache(&pool, &path).await.unwrap();

    assert_eq!(IMPORT_BATCH_SIZE, 500);
    assert_eq!(stats.rows_read, 1201);
    assert_eq!(stats.inserted, 1201);
    assert_eq!(stats.skipped, 0);
    // 500 + 500 + 201
    assert_eq!(stats.batches, 3);
    assert_eq!(coordinates::count_entries(&pool).await.unwrap(), 1201);
}

#[tokio::test]
async fn test_exact_multiple_of_batch_size_has_no_empty_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, &distinct_rows(6));
    let pool = memory_pool().await;

    let stats = import_cache_batched(&pool, &path, 3).await.unwrap();

    assert_eq!(stats.inserted, 6);
    assert_eq!(stats.batches, 2);
}

#[tokio::test]
async fn test_existing_pairs_are_not_duplicated() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        &[
            (37.7749, -122.419, "Mission District"),
            (37.7599, -122.4148, "Mission"),
        ],
    );
    let pool = memory_pool().await;
    coordinates::insert_entry(
        &pool,
        &CacheEntry {
            lng: -122.419,
            lat: 37.7749,
            neighborhood: "Mission District".to_string(),
        },
    )
    .await
    .unwrap();

    let stats = import_cache(&pool, &path).await.unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(coordinates::count_entries(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_reimport_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, &distinct_rows(10));
    let pool = memory_pool().await;

    import_cache(&pool, &path).await.unwrap();
    let stats = import_cache(&pool, &path).await.unwrap();

    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.skipped, 10);
    assert_eq!(stats.batches, 0);
    assert_eq!(coordinates::count_entries(&pool).await.unwrap(), 10);
}

#[tokio::test]
async fn test_repeated_row_within_pending_batch_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        &[
            (37.79, -122.41, "Chinatown"),
            (37.79, -122.41, "Chinatown"),
            (37.80, -122.41, "North Beach"),
        ],
    );
    let pool = memory_pool().await;

    let stats = import_cache(&pool, &path).await.unwrap();

    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(coordinates::count_entries(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_imported_columns_land_in_lat_lng_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, &[(37.7749, -122.419, "Mission District")]);
    let pool = memory_pool().await;

    import_cache(&pool, &path).await.unwrap();

    let stored = coordinates::find_neighborhood(&pool, -122.419, 37.7749)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some("Mission District"));
}

#[tokio::test]
async fn test_header_only_file_imports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, &[]);
    let pool = memory_pool().await;

    let stats = import_cache(&pool, &path).await.unwrap();
    assert_eq!(stats, Default::default());
}

#[tokio::test]
async fn test_missing_file_is_import_error() {
    let pool = memory_pool().await;
    let err = import_cache(&pool, &PathBuf::from("/nonexistent/locations.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::Import(_)));
}
