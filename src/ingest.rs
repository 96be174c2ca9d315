//! Ingest pipeline: validate, persist atomically, then schedule a refresh.

use std::sync::Arc;

use chrono::Utc;

use crate::audit::AuditEvent;
use crate::error::AppResult;
use crate::jobs::ForecastJobs;
use crate::metrics::Metrics;
use crate::models::{IngestAck, IngestPayload};
use crate::store::Storage;

// ---

#[derive(Clone)]
pub struct IngestPipeline {
    storage: Arc<dyn Storage>,
    jobs: ForecastJobs,
    metrics: Metrics,
}

impl IngestPipeline {
    pub fn new(storage: Arc<dyn Storage>, jobs: ForecastJobs, metrics: Metrics) -> Self {
        Self {
            storage,
            jobs,
            metrics,
        }
    }

    /// Store one reading on behalf of `actor`.
    ///
    /// The forecast refresh is only queued after the write has committed; its
    /// outcome never affects the returned acknowledgement.
    pub async fn ingest(
        &self,
        payload: IngestPayload,
        actor: &str,
        origin: &str,
    ) -> AppResult<IngestAck> {
        // ---
        payload.validate()?;

        let details = serde_json::json!({ "payload": &payload });
        let reading = payload.into_new_reading(Utc::now());
        let audit = AuditEvent::data_access(
            actor,
            "sensor_reading",
            &reading.device_id,
            "create",
            origin,
            details,
        );

        let device = match self.storage.ingest(&reading, &audit).await {
            Ok(device) => device,
            Err(e) => {
                self.metrics.ingest_failed();
                return Err(e.into());
            }
        };

        tracing::debug!(
            "Ingested reading for {} (device #{}) at {}",
            device.device_id,
            device.id,
            reading.ts
        );
        self.metrics.ingest_accepted();
        self.jobs.submit(&device.device_id);

        Ok(IngestAck { status: "ingested" })
    }
}
