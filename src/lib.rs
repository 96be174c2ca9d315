//! Sensor ingest and short-horizon forecast service.
//!
//! Readings arrive through `POST /api/v1/ingest`, are persisted together with
//! their device in one transaction, and trigger a best-effort background
//! forecast refresh. Forecast endpoints read the 24 most recent readings of a
//! device and either consult the forecast engine or fall back to a demo or
//! empty forecast.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): the
//! binary only talks to `config`, `schema`, `store`, `engine`, `state`, and
//! the `routes` gateway.

pub mod audit;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;
pub mod text;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
