//! Forecast engine backed by an external model service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Measurements, SensorReading};

use super::{EngineError, EngineForecast, ForecastEngine};

// ---

/// Calls `POST {base_url}/predict` with the device window.
#[derive(Clone)]
pub struct HttpForecastEngine {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    device_id: &'a str,
    window: Vec<WindowPoint<'a>>,
}

#[derive(Serialize)]
struct WindowPoint<'a> {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    measurements: &'a Measurements,
}

impl HttpForecastEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        // ---
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ForecastEngine for HttpForecastEngine {
    async fn predict(
        &self,
        device_id: &str,
        window: &[SensorReading],
    ) -> Result<EngineForecast, EngineError> {
        // ---
        let url = format!("{}/predict", self.base_url);
        let body = PredictRequest {
            device_id,
            window: window
                .iter()
                .map(|r| WindowPoint {
                    ts: r.ts,
                    measurements: &r.measurements,
                })
                .collect(),
        };

        tracing::debug!(
            "Requesting forecast for {} ({} readings) from {}",
            device_id,
            window.len(),
            url
        );

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Status(status.as_u16()));
        }

        response.json::<EngineForecast>().await?.validate()
    }
}
