//! In-memory storage backend.
//!
//! Owned by the process that creates it and shared through `Arc`; used for
//! the standalone demo mode and as the test double of [`PgStorage`](super::PgStorage).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::audit::{self, AuditEvent};
use crate::error::{StoreError, StoreResult};
use crate::models::{Device, Forecast, NewReading, SensorReading};

use super::{DeviceRegistry, ForecastStore, ReadingStore, Storage};

// ---

#[derive(Default)]
struct MemoryState {
    devices: HashMap<String, Device>,
    readings: Vec<SensorReading>,
    forecasts: HashMap<String, Forecast>,
    audit: Vec<AuditEvent>,
    next_device_id: i64,
    next_reading_id: i64,
    fail_reading_inserts: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }

    /// Make every following reading insert fail after the device upsert step.
    pub fn fail_reading_inserts(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_reading_inserts = fail;
        }
    }

    pub fn reading_count(&self, device_id: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.readings.iter().filter(|r| r.device_id == device_id).count())
            .unwrap_or(0)
    }

    /// Number of retained forecasts across all devices.
    pub fn forecast_count(&self) -> usize {
        self.state.lock().map(|s| s.forecasts.len()).unwrap_or(0)
    }

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.lock().map(|s| s.audit.clone()).unwrap_or_default()
    }
}

/// Readings of one device sorted by timestamp, insertion order breaking ties.
fn sorted_for<'a>(state: &'a MemoryState, device_id: &str) -> Vec<&'a SensorReading> {
    let mut rows: Vec<&SensorReading> = state
        .readings
        .iter()
        .filter(|r| r.device_id == device_id)
        .collect();
    rows.sort_by(|a, b| a.ts.cmp(&b.ts).then(a.id.cmp(&b.id)));
    rows
}

#[async_trait]
impl DeviceRegistry for MemoryStorage {
    async fn find_device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        Ok(self.lock()?.devices.get(device_id).cloned())
    }

    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        let mut devices: Vec<Device> = self.lock()?.devices.values().cloned().collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(devices)
    }
}

#[async_trait]
impl ReadingStore for MemoryStorage {
    async fn latest(&self, device_id: &str) -> StoreResult<Option<SensorReading>> {
        let state = self.lock()?;
        Ok(sorted_for(&state, device_id).last().map(|r| (*r).clone()))
    }

    async fn window(&self, device_id: &str, n: usize) -> StoreResult<Vec<SensorReading>> {
        // ---
        let state = self.lock()?;
        let rows = sorted_for(&state, device_id);
        let skip = rows.len().saturating_sub(n);
        Ok(rows.into_iter().skip(skip).cloned().collect())
    }
}

#[async_trait]
impl ForecastStore for MemoryStorage {
    async fn store_forecast(&self, device: &Device, forecast: &Forecast) -> StoreResult<()> {
        self.lock()?
            .forecasts
            .insert(device.device_id.clone(), forecast.clone());
        Ok(())
    }

    async fn current_forecast(&self, device_id: &str) -> StoreResult<Option<Forecast>> {
        Ok(self.lock()?.forecasts.get(device_id).cloned())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ingest(&self, reading: &NewReading, event: &AuditEvent) -> StoreResult<Device> {
        // ---
        let mut state = self.lock()?;

        // Stage the upsert; nothing touches `state` until every step succeeded
        let device = match state.devices.get(&reading.device_id) {
            Some(existing) => Device {
                lat: reading.lat,
                lon: reading.lon,
                last_seen: Utc::now(),
                ..existing.clone()
            },
            None => Device {
                id: state.next_device_id + 1,
                device_id: reading.device_id.clone(),
                lat: reading.lat,
                lon: reading.lon,
                last_seen: Utc::now(),
            },
        };

        if state.fail_reading_inserts {
            return Err(StoreError::Unavailable(format!(
                "reading insert failed for {}",
                reading.device_id
            )));
        }

        let row = SensorReading {
            id: state.next_reading_id + 1,
            device_fk: device.id,
            device_id: device.device_id.clone(),
            ts: reading.ts,
            measurements: reading.measurements.clone(),
            raw: reading.raw.clone(),
        };
        audit::log_data_access(event);

        // Commit
        state.next_device_id = state.next_device_id.max(device.id);
        state.next_reading_id = row.id;
        state.devices.insert(device.device_id.clone(), device.clone());
        state.readings.push(row);
        state.audit.push(event.clone());

        Ok(device)
    }
}
