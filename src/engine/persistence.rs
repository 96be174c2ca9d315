//! Baseline engine used when no model service is configured.
//!
//! A persistence forecast: each variable keeps its last observed value for
//! the whole horizon. Variables never observed in the window are omitted.

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Predictions, SensorReading, Variable};

use super::{hourly_ticks, EngineError, EngineForecast, ForecastEngine, HORIZON_HOURS};

pub const PERSISTENCE_MODEL_VERSION: &str = "persistence-v1";

#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceEngine;

#[async_trait]
impl ForecastEngine for PersistenceEngine {
    async fn predict(
        &self,
        _device_id: &str,
        window: &[SensorReading],
    ) -> Result<EngineForecast, EngineError> {
        // ---
        if window.is_empty() {
            return Err(EngineError::EmptyWindow);
        }

        let mut predictions = Predictions::new();
        for var in Variable::ALL {
            let last = window.iter().rev().find_map(|r| var.of(&r.measurements));
            if let Some(value) = last {
                predictions.insert(var.name().to_string(), vec![value; HORIZON_HOURS]);
            }
        }

        Ok(EngineForecast {
            for_ts: hourly_ticks(Utc::now()),
            predictions,
            model_version: PERSISTENCE_MODEL_VERSION.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Measurements;

    fn reading(id: i64, temperature: Option<f64>, humidity: Option<f64>) -> SensorReading {
        // ---
        SensorReading {
            id,
            device_fk: 1,
            device_id: "d".into(),
            ts: Utc::now(),
            measurements: Measurements {
                temperature,
                humidity,
                ..Default::default()
            },
            raw: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_repeats_last_observed_values() {
        // ---
        let window = vec![
            reading(1, Some(18.0), Some(70.0)),
            reading(2, Some(19.5), None),
        ];
        let forecast = PersistenceEngine.predict("d", &window).await.unwrap();

        assert_eq!(forecast.predictions["temperature"], vec![19.5; 8]);
        assert_eq!(forecast.predictions["humidity"], vec![70.0; 8]);
        assert!(!forecast.predictions.contains_key("radiation"));
        assert_eq!(forecast.model_version, PERSISTENCE_MODEL_VERSION);
        assert!(forecast.validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_window_fails() {
        // ---
        let result = PersistenceEngine.predict("d", &[]).await;
        assert!(matches!(result, Err(EngineError::EmptyWindow)));
    }
}
