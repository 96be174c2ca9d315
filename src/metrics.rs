//! Process-wide counters exposed on `GET /metrics` in Prometheus text format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ---

#[derive(Default)]
struct Counters {
    ingest_accepted: AtomicU64,
    ingest_failed: AtomicU64,
    forecast_engine: AtomicU64,
    forecast_demo: AtomicU64,
    forecast_no_data: AtomicU64,
    forecast_engine_error: AtomicU64,
    jobs_submitted: AtomicU64,
    jobs_dropped: AtomicU64,
    jobs_stored: AtomicU64,
    jobs_failed: AtomicU64,
}

/// How an on-demand forecast request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastOutcome {
    Engine,
    Demo,
    NoData,
    EngineError,
}

#[derive(Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_accepted(&self) {
        bump(&self.counters.ingest_accepted);
    }

    pub fn ingest_failed(&self) {
        bump(&self.counters.ingest_failed);
    }

    pub fn forecast(&self, outcome: ForecastOutcome) {
        let c = &self.counters;
        bump(match outcome {
            ForecastOutcome::Engine => &c.forecast_engine,
            ForecastOutcome::Demo => &c.forecast_demo,
            ForecastOutcome::NoData => &c.forecast_no_data,
            ForecastOutcome::EngineError => &c.forecast_engine_error,
        });
    }

    pub fn job_submitted(&self) {
        bump(&self.counters.jobs_submitted);
    }

    pub fn job_dropped(&self) {
        bump(&self.counters.jobs_dropped);
    }

    pub fn job_stored(&self) {
        bump(&self.counters.jobs_stored);
    }

    pub fn job_failed(&self) {
        bump(&self.counters.jobs_failed);
    }

    /// Render the current values.
    pub fn render(&self) -> String {
        // ---
        let c = &self.counters;
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        let mut out = String::new();

        let _ = writeln!(out, "# TYPE weathercast_ingest_total counter");
        let _ = writeln!(
            out,
            "weathercast_ingest_total{{result=\"accepted\"}} {}",
            load(&c.ingest_accepted)
        );
        let _ = writeln!(
            out,
            "weathercast_ingest_total{{result=\"failed\"}} {}",
            load(&c.ingest_failed)
        );

        let _ = writeln!(out, "# TYPE weathercast_forecast_requests_total counter");
        for (outcome, counter) in [
            ("engine", &c.forecast_engine),
            ("demo", &c.forecast_demo),
            ("no_data", &c.forecast_no_data),
            ("engine_error", &c.forecast_engine_error),
        ] {
            let _ = writeln!(
                out,
                "weathercast_forecast_requests_total{{outcome=\"{}\"}} {}",
                outcome,
                load(counter)
            );
        }

        let _ = writeln!(out, "# TYPE weathercast_forecast_jobs_total counter");
        for (state, counter) in [
            ("submitted", &c.jobs_submitted),
            ("dropped", &c.jobs_dropped),
            ("stored", &c.jobs_stored),
            ("failed", &c.jobs_failed),
        ] {
            let _ = writeln!(
                out,
                "weathercast_forecast_jobs_total{{state=\"{}\"}} {}",
                state,
                load(counter)
            );
        }

        out
    }
}
