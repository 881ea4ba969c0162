//! Reverse geocoding client
//!
//! Resolves a coordinate pair to a neighborhood through the Data Science
//! Toolkit `coordinates2politics` API. The service takes (latitude,
//! longitude), the reverse of the (lng, lat) order used everywhere else in
//! the ETL.

use crate::models::NEIGHBORHOOD_UNKNOWN;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sfpd_common::config::GeocoderConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

const USER_AGENT: &str = concat!("sfpd-etl/", env!("CARGO_PKG_VERSION"));
const NEIGHBORHOOD_TYPE: &str = "neighborhood";

/// Geocoder client errors
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Neighborhood-level result of a reverse geocode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeocodeResult {
    /// Neighborhood name, or `"N/A"` when none is known
    pub neighborhood: String,
}

/// One element of the `coordinates2politics` response array
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoliticsResponse {
    /// Null when the point is outside every known boundary
    pub politics: Option<Vec<PoliticalEntity>>,
}

/// Political boundary containing the queried point
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoliticalEntity {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    /// Administrative level, e.g. "country", "city", "neighborhood"
    pub friendly_type: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
}

/// Reverse geocoding seam
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve (lng, lat) to a neighborhood
    async fn reverse_geocode(&self, lng: f64, lat: f64) -> Result<GeocodeResult, GeocodeError>;
}

#[async_trait]
impl<G: Geocoder + ?Sized> Geocoder for Arc<G> {
    async fn reverse_geocode(&self, lng: f64, lat: f64) -> Result<GeocodeResult, GeocodeError> {
        (**self).reverse_geocode(lng, lat).await
    }
}

/// Pick the first neighborhood-level entity from the first response element
///
/// Anything short of a named neighborhood normalizes to `"N/A"`.
pub fn neighborhood_from_politics(response: &[PoliticsResponse]) -> String {
    response
        .first()
        .and_then(|r| r.politics.as_ref())
        .and_then(|politics| {
            politics
                .iter()
                .find(|p| p.friendly_type.as_deref() == Some(NEIGHBORHOOD_TYPE))
        })
        .and_then(|p| p.name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| NEIGHBORHOOD_UNKNOWN.to_string())
}

/// Spaces outgoing requests by reserving time slots
///
/// Each caller takes the next free slot and pushes the following one out by
/// `interval`, so concurrent callers queue up instead of bursting.
struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(min_interval_ms),
            next_slot: Mutex::new(None),
        }
    }

    async fn pace(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next_slot).map_or(now, |at| at.max(now));
            *next_slot = Some(slot + self.interval);
            slot
        };

        let delay = slot.saturating_duration_since(Instant::now());
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Pacing geocoder request");
            tokio::time::sleep_until(slot).await;
        }
    }
}

/// Data Science Toolkit geocoding client
pub struct DstkClient {
    http_client: reqwest::Client,
    base_url: String,
    pacer: RequestPacer,
}

impl DstkClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pacer: RequestPacer::new(config.min_interval_ms),
        })
    }

    /// Raw `coordinates2politics` call, argument order (lat, lng)
    pub async fn coordinates_to_politics(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Vec<PoliticsResponse>, GeocodeError> {
        self.pacer.pace().await;

        let url = format!("{}/coordinates2politics/{}%2c{}", self.base_url, lat, lng);
        tracing::debug!(lat, lng, url = %url, "Querying geocoder");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| GeocodeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeocodeError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| GeocodeError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for DstkClient {
    async fn reverse_geocode(&self, lng: f64, lat: f64) -> Result<GeocodeResult, GeocodeError> {
        let politics = self.coordinates_to_politics(lat, lng).await?;
        let neighborhood = neighborhood_from_politics(&politics);

        tracing::debug!(lng, lat, neighborhood = %neighborhood, "Reverse geocoded");

        Ok(GeocodeResult { neighborhood })
    }
}
