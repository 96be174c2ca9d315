//! Background forecast refresh after ingest.
//!
//! Ingest submits a device id to a bounded queue and returns immediately. A
//! single worker drains the queue and runs each refresh as its own detached
//! task. Results are never reported back to the submitter: failures are
//! logged and counted, not retried, and a full queue drops the job.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::engine::{EngineForecast, ForecastEngine};
use crate::forecast::WINDOW_SIZE;
use crate::metrics::Metrics;
use crate::models::Forecast;
use crate::store::Storage;

// ---

/// Result of one refresh, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Stored,
    NoReadings,
    NoDevice,
    EngineFailed,
    StoreFailed,
}

/// Submission handle of the forecast job queue.
#[derive(Clone)]
pub struct ForecastJobs {
    tx: mpsc::Sender<String>,
    metrics: Metrics,
}

impl ForecastJobs {
    /// Start the worker. It exits once every handle has been dropped.
    pub fn start(
        storage: Arc<dyn Storage>,
        engine: Arc<dyn ForecastEngine>,
        metrics: Metrics,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        // ---
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(rx, storage, engine, metrics.clone()));
        (Self { tx, metrics }, worker)
    }

    /// Queue a refresh for `device_id` without waiting.
    pub fn submit(&self, device_id: &str) {
        // ---
        match self.tx.try_send(device_id.to_string()) {
            Ok(()) => self.metrics.job_submitted(),
            Err(TrySendError::Full(id)) => {
                tracing::warn!("Forecast queue full, dropping refresh for {}", id);
                self.metrics.job_dropped();
            }
            Err(TrySendError::Closed(id)) => {
                tracing::warn!("Forecast queue closed, dropping refresh for {}", id);
                self.metrics.job_dropped();
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<String>,
    storage: Arc<dyn Storage>,
    engine: Arc<dyn ForecastEngine>,
    metrics: Metrics,
) {
    // ---
    tracing::debug!("Forecast worker started");

    while let Some(device_id) = rx.recv().await {
        let storage = Arc::clone(&storage);
        let engine = Arc::clone(&engine);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let outcome = refresh_forecast(storage.as_ref(), engine.as_ref(), &device_id).await;
            match outcome {
                JobOutcome::Stored => metrics.job_stored(),
                JobOutcome::EngineFailed | JobOutcome::StoreFailed => metrics.job_failed(),
                JobOutcome::NoReadings | JobOutcome::NoDevice => {}
            }
        });
    }

    tracing::debug!("Forecast worker stopped");
}

/// Recompute and store the forecast of one device.
///
/// Unlike on-demand requests, any non-empty window is sent to the engine.
pub async fn refresh_forecast(
    storage: &dyn Storage,
    engine: &dyn ForecastEngine,
    device_id: &str,
) -> JobOutcome {
    // ---
    let window = match storage.window(device_id, WINDOW_SIZE).await {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!("Forecast job for {}: window read failed: {}", device_id, e);
            return JobOutcome::StoreFailed;
        }
    };

    if window.is_empty() {
        return JobOutcome::NoReadings;
    }

    let predicted = match engine
        .predict(device_id, &window)
        .await
        .and_then(EngineForecast::validate)
    {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Forecast job for {}: engine failed: {}", device_id, e);
            return JobOutcome::EngineFailed;
        }
    };

    let device = match storage.find_device(device_id).await {
        Ok(Some(d)) => d,
        Ok(None) => return JobOutcome::NoDevice,
        Err(e) => {
            tracing::warn!("Forecast job for {}: device lookup failed: {}", device_id, e);
            return JobOutcome::StoreFailed;
        }
    };

    let forecast = Forecast {
        device_id: device_id.to_string(),
        pred_ts: Utc::now(),
        for_ts: predicted.for_ts,
        predictions: predicted.predictions,
        model_version: predicted.model_version,
    };

    match storage.store_forecast(&device, &forecast).await {
        Ok(()) => {
            tracing::debug!(
                "Forecast job for {}: stored {} from {} readings",
                device_id,
                forecast.model_version,
                window.len()
            );
            JobOutcome::Stored
        }
        Err(e) => {
            tracing::warn!("Forecast job for {}: store failed: {}", device_id, e);
            JobOutcome::StoreFailed
        }
    }
}
