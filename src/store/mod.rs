//! Storage collaborators for devices, readings, and forecasts.
//!
//! Handlers and background jobs only see these traits. Two backends exist:
//! [`PgStorage`] for production and [`MemoryStorage`] for the standalone demo
//! mode and tests.

use async_trait::async_trait;

use crate::audit::AuditEvent;
use crate::error::StoreResult;
use crate::models::{Device, Forecast, NewReading, SensorReading};

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

// ---

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn find_device(&self, device_id: &str) -> StoreResult<Option<Device>>;

    /// All known devices, most recently seen first.
    async fn list_devices(&self) -> StoreResult<Vec<Device>>;
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Reading with the greatest timestamp for `device_id`.
    async fn latest(&self, device_id: &str) -> StoreResult<Option<SensorReading>>;

    /// The `n` most recent readings by timestamp, ordered oldest to newest.
    async fn window(&self, device_id: &str, n: usize) -> StoreResult<Vec<SensorReading>>;
}

#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Replace the current forecast of `device`.
    async fn store_forecast(&self, device: &Device, forecast: &Forecast) -> StoreResult<()>;

    async fn current_forecast(&self, device_id: &str) -> StoreResult<Option<Forecast>>;
}

#[async_trait]
pub trait Storage: DeviceRegistry + ReadingStore + ForecastStore {
    /// Upsert the device, insert the reading and record the audit event as
    /// one unit. On error none of the three is visible.
    async fn ingest(&self, reading: &NewReading, audit: &AuditEvent) -> StoreResult<Device>;
}
