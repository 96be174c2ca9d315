//! On-demand forecasts.
//!
//! A device needs a full window of [`WINDOW_SIZE`] readings before the
//! forecast engine is consulted. Shorter histories get a deterministic demo
//! forecast, and devices with no readings get an empty one. Engine failures
//! degrade to an empty forecast tagged with the error; only storage failures
//! are returned as errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{hourly_ticks, EngineForecast, ForecastEngine, HORIZON_HOURS};
use crate::error::AppResult;
use crate::metrics::{ForecastOutcome, Metrics};
use crate::models::{Forecast, ForecastOut, Predictions, SensorReading, Variable};
use crate::store::Storage;
use crate::text::{summarize, PredictionText};

/// Readings fed to the engine.
pub const WINDOW_SIZE: usize = 24;

pub const DEMO_MODEL_VERSION: &str = "demo_forecast";
pub const NO_DATA_MODEL_VERSION: &str = "no_data";

// ---

/// Starting value and hourly step of each demo series.
fn demo_profile(var: Variable) -> (f64, f64) {
    match var {
        Variable::Temperature => (25.0, 0.5),
        Variable::Humidity => (60.0, 2.0),
        Variable::WindSpeed => (3.0, 0.3),
        Variable::Radiation => (400.0, 50.0),
        Variable::Precipitation => (0.0, 0.0),
    }
}

/// Precipitation in the demo forecast: dry for five hours, then a drizzle.
const DEMO_DRIZZLE_MM: f64 = 0.1;
const DEMO_DRY_HOURS: usize = 5;

/// Whether the demo series starts from the device's latest recorded value.
fn demo_seeds_from_readings(var: Variable) -> bool {
    matches!(var, Variable::Temperature | Variable::Humidity)
}

/// Deterministic placeholder forecast from a short window.
pub fn demo_forecast(device_id: &str, window: &[SensorReading], now: DateTime<Utc>) -> ForecastOut {
    // ---
    let mut predictions = Predictions::new();

    for var in Variable::ALL {
        let values = if var == Variable::Precipitation {
            (0..HORIZON_HOURS)
                .map(|i| if i < DEMO_DRY_HOURS { 0.0 } else { DEMO_DRIZZLE_MM })
                .collect()
        } else {
            let (default, step) = demo_profile(var);
            let seed = if demo_seeds_from_readings(var) {
                window
                    .iter()
                    .rev()
                    .find_map(|r| var.of(&r.measurements))
                    .unwrap_or(default)
            } else {
                default
            };
            (0..HORIZON_HOURS).map(|i| seed + i as f64 * step).collect()
        };
        predictions.insert(var.name().to_string(), values);
    }

    ForecastOut {
        device_id: device_id.to_string(),
        pred_ts: now,
        for_ts: hourly_ticks(now),
        predictions,
        model_version: DEMO_MODEL_VERSION.to_string(),
    }
}

/// Forecast with no timestamps or values, tagged by `model_version`.
pub fn empty_forecast(device_id: &str, model_version: &str, now: DateTime<Utc>) -> ForecastOut {
    ForecastOut {
        device_id: device_id.to_string(),
        pred_ts: now,
        for_ts: Vec::new(),
        predictions: Predictions::new(),
        model_version: model_version.to_string(),
    }
}

/// Response of the prediction-text endpoints.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PredictionTextOut {
    Ready {
        device_id: String,
        model_version: String,
        generated_at: DateTime<Utc>,
        prediction_text: PredictionText,
    },
    InsufficientData {
        device_id: String,
        status: &'static str,
        message: &'static str,
        prediction_text: serde_json::Map<String, serde_json::Value>,
    },
}

#[derive(Clone)]
pub struct ForecastService {
    storage: Arc<dyn Storage>,
    engine: Arc<dyn ForecastEngine>,
    metrics: Metrics,
}

impl ForecastService {
    pub fn new(storage: Arc<dyn Storage>, engine: Arc<dyn ForecastEngine>, metrics: Metrics) -> Self {
        Self {
            storage,
            engine,
            metrics,
        }
    }

    /// Current 8-hour forecast for `device_id`.
    ///
    /// A successful engine prediction replaces the device's stored forecast.
    pub async fn forecast(&self, device_id: &str) -> AppResult<ForecastOut> {
        // ---
        let window = self.storage.window(device_id, WINDOW_SIZE).await?;
        self.forecast_from_window(device_id, &window).await
    }

    async fn forecast_from_window(
        &self,
        device_id: &str,
        window: &[SensorReading],
    ) -> AppResult<ForecastOut> {
        // ---
        let now = Utc::now();

        if window.is_empty() {
            tracing::debug!("No readings for {}, returning empty forecast", device_id);
            self.metrics.forecast(ForecastOutcome::NoData);
            return Ok(empty_forecast(device_id, NO_DATA_MODEL_VERSION, now));
        }

        if window.len() < WINDOW_SIZE {
            tracing::debug!(
                "Only {} of {} readings for {}, returning demo forecast",
                window.len(),
                WINDOW_SIZE,
                device_id
            );
            self.metrics.forecast(ForecastOutcome::Demo);
            return Ok(demo_forecast(device_id, window, now));
        }

        let result = self
            .engine
            .predict(device_id, window)
            .await
            .and_then(EngineForecast::validate);

        let predicted = match result {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Forecast engine failed for {}: {}", device_id, e);
                self.metrics.forecast(ForecastOutcome::EngineError);
                return Ok(empty_forecast(device_id, &format!("error: {}", e), now));
            }
        };

        let forecast = Forecast {
            device_id: device_id.to_string(),
            pred_ts: now,
            for_ts: predicted.for_ts,
            predictions: predicted.predictions,
            model_version: predicted.model_version,
        };

        match self.storage.find_device(device_id).await? {
            Some(device) => self.storage.store_forecast(&device, &forecast).await?,
            None => tracing::warn!("Device {} vanished before its forecast was stored", device_id),
        }

        self.metrics.forecast(ForecastOutcome::Engine);
        Ok(forecast.into())
    }

    /// Human-readable description of the current forecast.
    pub async fn prediction_text(&self, device_id: &str) -> AppResult<PredictionTextOut> {
        // ---
        let window = self.storage.window(device_id, WINDOW_SIZE).await?;
        if window.is_empty() {
            return Ok(PredictionTextOut::InsufficientData {
                device_id: device_id.to_string(),
                status: "insufficient_data",
                message: "At least one sensor reading is required.",
                prediction_text: serde_json::Map::new(),
            });
        }

        let forecast = self.forecast_from_window(device_id, &window).await?;
        Ok(PredictionTextOut::Ready {
            device_id: forecast.device_id,
            prediction_text: summarize(&forecast.predictions),
            model_version: forecast.model_version,
            generated_at: Utc::now(),
        })
    }
}
