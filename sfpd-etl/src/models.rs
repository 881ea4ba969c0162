//! Records flowing through the pipeline

use crate::error::{EtlError, EtlResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sfpd_common::TemplateContext;

/// Neighborhood value stored when the geocoder knows no neighborhood
pub const NEIGHBORHOOD_UNKNOWN: &str = "N/A";

/// Incremental feed document: `{ features: [ { properties: {...} } ] }`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeedDocument {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Feature {
    pub properties: Incident,
}

/// Loosely structured incident property bag
///
/// Carries at least `X` (longitude) and `Y` (latitude); every other field
/// is forwarded to the warehouse as-is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Incident(pub Map<String, Value>);

impl Incident {
    /// Build an incident from a bulk CSV row keyed by the header row
    pub fn from_csv_record(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Incident coordinates as (longitude, latitude)
    ///
    /// `X`/`Y` may be JSON numbers or numeric strings.
    pub fn coordinates(&self) -> EtlResult<(f64, f64)> {
        Ok((self.coordinate("X")?, self.coordinate("Y")?))
    }

    fn coordinate(&self, field: &str) -> EtlResult<f64> {
        let value = self
            .get(field)
            .ok_or_else(|| EtlError::InvalidRecord(format!("missing '{}' coordinate", field)))?;

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        parsed.ok_or_else(|| {
            EtlError::InvalidRecord(format!("'{}' is not a number: {}", field, value))
        })
    }

    /// Every property stringified into a template context
    pub fn to_context(&self) -> TemplateContext {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect()
    }
}

/// Result of resolving a coordinate pair to a neighborhood
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationLookup {
    pub lng: f64,
    pub lat: f64,
    pub neighborhood: String,
}

impl LocationLookup {
    /// `lng,lat,neighborhood` line printed by the CLI
    pub fn csv_line(&self) -> String {
        format!("{},{},{}", self.lng, self.lat, self.neighborhood)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
