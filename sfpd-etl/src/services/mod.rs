//! ETL services
//!
//! Leaf-first: geocoding, caching, feed retrieval, mapping import,
//! warehouse loading.

pub mod coordinate_cache;
pub mod csv_importer;
pub mod feed_fetcher;
pub mod geocode_client;
pub mod warehouse;

pub use coordinate_cache::CoordinateCache;
pub use feed_fetcher::{FeedFetcher, IncidentFeed};
pub use geocode_client::{DstkClient, Geocoder};
pub use warehouse::{SqlxWarehouse, Warehouse, WarehouseLoader};
