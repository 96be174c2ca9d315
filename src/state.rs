//! Shared application state handed to every route.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::JwtAuth;
use crate::engine::ForecastEngine;
use crate::forecast::ForecastService;
use crate::ingest::IngestPipeline;
use crate::jobs::ForecastJobs;
use crate::metrics::Metrics;
use crate::rate_limit::ClientKey;
use crate::store::Storage;
use crate::Config;

// ---

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub ingest: IngestPipeline,
    pub forecasts: ForecastService,
    pub auth: JwtAuth,
    pub clients: ClientKey,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire services together and start the background forecast worker.
    ///
    /// The returned handle completes after the last `AppState` clone is dropped.
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        engine: Arc<dyn ForecastEngine>,
    ) -> (Self, JoinHandle<()>) {
        // ---
        let metrics = Metrics::new();
        let (jobs, worker) = ForecastJobs::start(
            Arc::clone(&storage),
            Arc::clone(&engine),
            metrics.clone(),
            config.job_queue_capacity as usize,
        );

        let state = AppState {
            ingest: IngestPipeline::new(Arc::clone(&storage), jobs, metrics.clone()),
            forecasts: ForecastService::new(Arc::clone(&storage), engine, metrics.clone()),
            auth: JwtAuth::new(&config.jwt_secret),
            clients: ClientKey::new(config.trust_forwarded_for),
            storage,
            metrics,
            config,
        };
        (state, worker)
    }
}
