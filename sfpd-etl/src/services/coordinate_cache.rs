//! Read-through neighborhood cache
//!
//! Serves repeat coordinates from the local `coordinates` table and only
//! calls the geocoder on a miss. Entries are never updated or evicted.

use crate::db::coordinates::{self, CacheEntry};
use crate::error::EtlResult;
use crate::models::LocationLookup;
use crate::services::geocode_client::Geocoder;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

/// Coordinate → neighborhood cache backed by SQLite
pub struct CoordinateCache<G> {
    pool: SqlitePool,
    geocoder: G,
    /// Held across lookup-then-insert so a miss is inserted once
    write_lock: Mutex<()>,
}

impl<G: Geocoder> CoordinateCache<G> {
    pub fn new(pool: SqlitePool, geocoder: G) -> Self {
        Self {
            pool,
            geocoder,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Resolve (lng, lat), geocoding and persisting on a miss
    pub async fn lookup(&self, lng: f64, lat: f64) -> EtlResult<LocationLookup> {
        let _guard = self.write_lock.lock().await;

        if let Some(neighborhood) = coordinates::find_neighborhood(&self.pool, lng, lat).await? {
            tracing::trace!(lng, lat, neighborhood = %neighborhood, "Cache hit");
            return Ok(LocationLookup {
                lng,
                lat,
                neighborhood,
            });
        }

        let result = self.geocoder.reverse_geocode(lng, lat).await?;
        let entry = CacheEntry {
            lng,
            lat,
            neighborhood: result.neighborhood,
        };
        coordinates::insert_entry(&self.pool, &entry).await?;

        tracing::debug!(lng, lat, neighborhood = %entry.neighborhood, "Cache miss stored");

        Ok(LocationLookup {
            lng,
            lat,
            neighborhood: entry.neighborhood,
        })
    }
}
