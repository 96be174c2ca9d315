//! Data models for the ingest and forecast pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// ---

/// The five environmental variables every reading may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Temperature,
    Humidity,
    WindSpeed,
    Radiation,
    Precipitation,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::Temperature,
        Variable::Humidity,
        Variable::WindSpeed,
        Variable::Radiation,
        Variable::Precipitation,
    ];

    /// Key used in prediction mappings and JSON payloads.
    pub fn name(self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::Humidity => "humidity",
            Variable::WindSpeed => "wind_speed",
            Variable::Radiation => "radiation",
            Variable::Precipitation => "precipitation",
        }
    }

    pub fn of(self, m: &Measurements) -> Option<f64> {
        match self {
            Variable::Temperature => m.temperature,
            Variable::Humidity => m.humidity,
            Variable::WindSpeed => m.wind_speed,
            Variable::Radiation => m.radiation,
            Variable::Precipitation => m.precipitation,
        }
    }
}

/// Optional measurement set shared by payloads and stored readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    // ---
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub radiation: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
}

/// Body of `POST /api/v1/ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPayload {
    // ---
    pub device_id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl IngestPayload {
    /// Reject payloads that must never reach storage.
    ///
    /// Coordinates are only checked for being real numbers; timestamps are
    /// accepted in any order and at any distance from now.
    pub fn validate(&self) -> AppResult<()> {
        // ---
        if self.device_id.trim().is_empty() {
            return Err(AppError::Validation("device_id must not be empty".into()));
        }
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(AppError::Validation("lat/lon must be finite numbers".into()));
        }
        Ok(())
    }

    /// Build the row to persist, stamping `now` when the client sent no `ts`.
    pub fn into_new_reading(self, now: DateTime<Utc>) -> NewReading {
        // ---
        let raw = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        NewReading {
            device_id: self.device_id,
            lat: self.lat,
            lon: self.lon,
            ts: self.ts.unwrap_or(now),
            measurements: self.measurements,
            raw,
        }
    }
}

/// A validated reading on its way into the store.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub device_id: String,
    pub lat: f64,
    pub lon: f64,
    pub ts: DateTime<Utc>,
    pub measurements: Measurements,
    pub raw: serde_json::Value,
}

/// A registered sensor station.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Device {
    // ---
    pub id: i64,
    pub device_id: String,
    pub lat: f64,
    pub lon: f64,
    pub last_seen: DateTime<Utc>,
}

/// A persisted reading. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    // ---
    pub id: i64,
    pub device_fk: i64,
    pub device_id: String,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub measurements: Measurements,
    pub raw: serde_json::Value,
}

/// Numeric predictions keyed by variable name.
pub type Predictions = BTreeMap<String, Vec<f64>>;

/// The current forecast of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    // ---
    pub device_id: String,
    pub pred_ts: DateTime<Utc>,
    pub for_ts: Vec<DateTime<Utc>>,
    pub predictions: Predictions,
    pub model_version: String,
}

// ---

#[derive(Debug, Serialize)]
pub struct IngestAck {
    pub status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceOut {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
}

impl From<Device> for DeviceOut {
    fn from(d: Device) -> Self {
        DeviceOut {
            device_id: d.device_id,
            last_seen: d.last_seen,
            lat: d.lat,
            lon: d.lon,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatestOut {
    pub device_id: String,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl From<SensorReading> for LatestOut {
    fn from(r: SensorReading) -> Self {
        LatestOut {
            device_id: r.device_id,
            ts: r.ts,
            measurements: r.measurements,
        }
    }
}

/// Response of the forecast endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastOut {
    pub device_id: String,
    pub pred_ts: DateTime<Utc>,
    pub for_ts: Vec<DateTime<Utc>>,
    pub predictions: Predictions,
    pub model_version: String,
}

impl From<Forecast> for ForecastOut {
    fn from(f: Forecast) -> Self {
        ForecastOut {
            device_id: f.device_id,
            pred_ts: f.pred_ts,
            for_ts: f.for_ts,
            predictions: f.predictions,
            model_version: f.model_version,
        }
    }
}
