//! Shared stand-ins for integration tests
//!
//! In-process fakes for the geocoder, incident feed and warehouse, plus a
//! local axum server for exercising the real HTTP clients.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use sfpd_common::config::WarehouseConfig;
use sfpd_common::{Statement, TemplateRenderer};
use sfpd_etl::services::feed_fetcher::{FetchError, IncidentFeed};
use sfpd_etl::services::geocode_client::{GeocodeError, GeocodeResult, Geocoder};
use sfpd_etl::services::warehouse::{default_sql_dir, Warehouse, WarehouseLoader};
use sfpd_etl::{EtlError, EtlResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory cache database with the `coordinates` table
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sfpd_common::db::init::create_coordinates_table(&pool)
        .await
        .unwrap();
    pool
}

/// Geocoder answering every pair with one neighborhood, counting calls
pub struct CountingGeocoder {
    neighborhood: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<(f64, f64)>>,
}

impl CountingGeocoder {
    pub fn new(neighborhood: &str) -> Self {
        Self {
            neighborhood: neighborhood.to_string(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (lng, lat) pairs in call order
    pub fn seen(&self) -> Vec<(f64, f64)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn reverse_geocode(&self, lng: f64, lat: f64) -> Result<GeocodeResult, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((lng, lat));
        Ok(GeocodeResult {
            neighborhood: self.neighborhood.clone(),
        })
    }
}

/// Geocoder whose transport always fails
pub struct FailingGeocoder;

#[async_trait]
impl Geocoder for FailingGeocoder {
    async fn reverse_geocode(&self, _lng: f64, _lat: f64) -> Result<GeocodeResult, GeocodeError> {
        Err(GeocodeError::NetworkError("connection refused".to_string()))
    }
}

/// Feed serving a fixed document
pub struct StaticFeed(pub Value);

#[async_trait]
impl IncidentFeed for StaticFeed {
    async fn fetch_latest(&self) -> Result<Value, FetchError> {
        Ok(self.0.clone())
    }
}

/// Warehouse recording every statement instead of executing it
#[derive(Default)]
pub struct RecordingWarehouse {
    statements: Mutex<Vec<Statement>>,
    fail_when_sql_contains: Option<String>,
}

impl RecordingWarehouse {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            statements: Mutex::new(Vec::new()),
            fail_when_sql_contains: Some(fragment.to_string()),
        }
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn count_matching(&self, fragment: &str) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.sql.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn execute(&self, statement: &Statement) -> EtlResult<u64> {
        if let Some(fragment) = &self.fail_when_sql_contains {
            if statement.sql.contains(fragment.as_str()) {
                return Err(EtlError::Load(format!("rejected: {}", fragment)));
            }
        }
        self.statements.lock().unwrap().push(statement.clone());
        Ok(1)
    }
}

/// Loader over a shared recording warehouse with the shipped templates
pub fn recording_loader(
    warehouse: &Arc<RecordingWarehouse>,
) -> WarehouseLoader<Arc<RecordingWarehouse>> {
    WarehouseLoader::new(
        Arc::clone(warehouse),
        TemplateRenderer::default(),
        default_sql_dir(),
        &WarehouseConfig::default(),
    )
}

/// Incident properties with every field the insert template references
pub fn sample_incident(num: u64, x: f64, y: f64) -> Value {
    json!({
        "IncidntNum": num.to_string(),
        "Category": "LARCENY/THEFT",
        "Descript": "GRAND THEFT FROM LOCKED AUTO",
        "DayOfWeek": "Monday",
        "Date": "2015-06-01T00:00:00",
        "Time": "18:30",
        "PdDistrict": "MISSION",
        "Resolution": "NONE",
        "Address": "800 Block of VALENCIA ST",
        "X": x.to_string(),
        "Y": y.to_string(),
        "Location": format!("({}, {})", y, x),
        "PdId": format!("{}06244", num)
    })
}

/// Feed document wrapping the given property bags
pub fn feed_document(properties: Vec<Value>) -> Value {
    let features: Vec<Value> = properties
        .into_iter()
        .map(|p| json!({"type": "Feature", "properties": p}))
        .collect();
    json!({"type": "FeatureCollection", "features": features})
}

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
