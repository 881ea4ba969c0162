//! Error types for sfpd-etl
//!
//! Nothing recovers locally: every error propagates to the command that
//! triggered it and aborts the invocation.

use crate::services::feed_fetcher::FetchError;
use crate::services::geocode_client::GeocodeError;
use thiserror::Error;

/// ETL error type
#[derive(Debug, Error)]
pub enum EtlError {
    /// Reverse geocoding failed (transport, status or malformed response)
    #[error("Geocoder unavailable: {0}")]
    GeocodeUnavailable(#[from] GeocodeError),

    /// Incident feed or bulk archive could not be fetched
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A warehouse statement failed
    #[error("Warehouse load failed: {0}")]
    Load(String),

    /// Coordinate mapping CSV could not be read
    #[error("Import failed: {0}")]
    Import(String),

    /// Incident record lacks usable coordinates
    #[error("Invalid incident record: {0}")]
    InvalidRecord(String),

    /// Subcommand not recognized by the CLI
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Local cache database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// sfpd-common error (config, templates)
    #[error("Common error: {0}")]
    Common(#[from] sfpd_common::Error),
}

impl From<csv::Error> for EtlError {
    fn from(err: csv::Error) -> Self {
        EtlError::Import(err.to_string())
    }
}

/// Result type for ETL operations
pub type EtlResult<T> = Result<T, EtlError>;
