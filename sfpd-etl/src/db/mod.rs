//! Database access for sfpd-etl
//!
//! Schema creation lives in `sfpd_common::db::init`.

pub mod coordinates;

pub use sfpd_common::db::init::init_cache_database;
