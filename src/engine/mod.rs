//! Pluggable forecast engines.
//!
//! The pipeline only depends on [`ForecastEngine`]: given a device and its
//! reading window, produce an 8-hour forecast or fail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Predictions, SensorReading};

mod http;
mod persistence;

pub use http::HttpForecastEngine;
pub use persistence::PersistenceEngine;

/// Number of hourly steps in every forecast.
pub const HORIZON_HOURS: usize = 8;

// ---

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model returned HTTP {0}")]
    Status(u16),

    #[error("invalid forecast: {0}")]
    InvalidForecast(String),

    #[error("no readings to forecast from")]
    EmptyWindow,
}

/// What an engine returns on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineForecast {
    pub for_ts: Vec<DateTime<Utc>>,
    pub predictions: Predictions,
    pub model_version: String,
}

impl EngineForecast {
    /// Check the horizon shape: 8 timestamps and 8 values per variable.
    pub fn validate(self) -> Result<Self, EngineError> {
        // ---
        if self.for_ts.len() != HORIZON_HOURS {
            return Err(EngineError::InvalidForecast(format!(
                "expected {} timestamps, got {}",
                HORIZON_HOURS,
                self.for_ts.len()
            )));
        }
        if let Some((name, values)) = self
            .predictions
            .iter()
            .find(|(_, v)| v.len() != HORIZON_HOURS)
        {
            return Err(EngineError::InvalidForecast(format!(
                "{} has {} values",
                name,
                values.len()
            )));
        }
        Ok(self)
    }
}

#[async_trait]
pub trait ForecastEngine: Send + Sync {
    async fn predict(
        &self,
        device_id: &str,
        window: &[SensorReading],
    ) -> Result<EngineForecast, EngineError>;
}

/// The next `HORIZON_HOURS` hourly ticks after `from`.
pub fn hourly_ticks(from: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    (1..=HORIZON_HOURS as i64)
        .map(|h| from + chrono::Duration::hours(h))
        .collect()
}
