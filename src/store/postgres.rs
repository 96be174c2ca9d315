//! PostgreSQL storage backend.
//!
//! Every operation borrows one pooled connection (or one transaction) for its
//! own duration; sqlx returns it to the pool on drop, including on error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Postgres, Transaction};

use crate::audit::{self, AuditEvent};
use crate::error::StoreResult;
use crate::models::{Device, Forecast, Measurements, NewReading, Predictions, SensorReading};

use super::{DeviceRegistry, ForecastStore, ReadingStore, Storage};

// ---

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: i64,
    device_fk: i64,
    device_id: String,
    ts: DateTime<Utc>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
    radiation: Option<f64>,
    precipitation: Option<f64>,
    raw: serde_json::Value,
}

impl From<ReadingRow> for SensorReading {
    fn from(row: ReadingRow) -> Self {
        SensorReading {
            id: row.id,
            device_fk: row.device_fk,
            device_id: row.device_id,
            ts: row.ts,
            measurements: Measurements {
                temperature: row.temperature,
                humidity: row.humidity,
                wind_speed: row.wind_speed,
                radiation: row.radiation,
                precipitation: row.precipitation,
            },
            raw: row.raw,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ForecastRow {
    device_id: String,
    pred_ts: DateTime<Utc>,
    for_ts: Vec<DateTime<Utc>>,
    predictions: Json<Predictions>,
    model_version: String,
}

const READING_COLUMNS: &str = "id, device_fk, device_id, ts, temperature, humidity, \
                               wind_speed, radiation, precipitation, raw";

/// Create the device on first sight, otherwise refresh its location and
/// `last_seen`. Concurrent upserts of one device resolve last-writer-wins.
async fn upsert_device(
    tx: &mut Transaction<'_, Postgres>,
    device_id: &str,
    lat: f64,
    lon: f64,
) -> Result<Device, sqlx::Error> {
    // ---
    sqlx::query_as::<_, Device>(
        r#"
        INSERT INTO devices (device_id, lat, lon, last_seen)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (device_id) DO UPDATE SET
            lat = EXCLUDED.lat,
            lon = EXCLUDED.lon,
            last_seen = EXCLUDED.last_seen
        RETURNING id, device_id, lat, lon, last_seen
        "#,
    )
    .bind(device_id)
    .bind(lat)
    .bind(lon)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
}

async fn insert_reading(
    tx: &mut Transaction<'_, Postgres>,
    device: &Device,
    reading: &NewReading,
) -> Result<(), sqlx::Error> {
    // ---
    let m = &reading.measurements;
    sqlx::query(
        r#"
        INSERT INTO sensor_readings (
            device_fk, device_id, ts,
            temperature, humidity, wind_speed, radiation, precipitation,
            raw
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(device.id)
    .bind(&device.device_id)
    .bind(reading.ts)
    .bind(m.temperature)
    .bind(m.humidity)
    .bind(m.wind_speed)
    .bind(m.radiation)
    .bind(m.precipitation)
    .bind(&reading.raw)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    event: &AuditEvent,
) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO audit_log (
            id, at, actor, resource_type, resource_id, action, origin, details
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(event.id)
    .bind(event.at)
    .bind(&event.actor)
    .bind(&event.resource_type)
    .bind(&event.resource_id)
    .bind(&event.action)
    .bind(&event.origin)
    .bind(&event.details)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl DeviceRegistry for PgStorage {
    async fn find_device(&self, device_id: &str) -> StoreResult<Option<Device>> {
        // ---
        let device = sqlx::query_as::<_, Device>(
            "SELECT id, device_id, lat, lon, last_seen FROM devices WHERE device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        // ---
        let devices = sqlx::query_as::<_, Device>(
            "SELECT id, device_id, lat, lon, last_seen FROM devices ORDER BY last_seen DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }
}

#[async_trait]
impl ReadingStore for PgStorage {
    async fn latest(&self, device_id: &str) -> StoreResult<Option<SensorReading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_readings \
             WHERE device_id = $1 ORDER BY ts DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(SensorReading::from))
    }

    async fn window(&self, device_id: &str, n: usize) -> StoreResult<Vec<SensorReading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM ( \
                 SELECT {READING_COLUMNS} FROM sensor_readings \
                 WHERE device_id = $1 ORDER BY ts DESC, id DESC LIMIT $2 \
             ) recent ORDER BY ts ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ReadingRow>(&sql)
            .bind(device_id)
            .bind(i64::try_from(n).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(SensorReading::from).collect())
    }
}

#[async_trait]
impl ForecastStore for PgStorage {
    async fn store_forecast(&self, device: &Device, forecast: &Forecast) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO forecasts (device_fk, device_id, pred_ts, for_ts, predictions, model_version)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (device_fk) DO UPDATE SET
                pred_ts = EXCLUDED.pred_ts,
                for_ts = EXCLUDED.for_ts,
                predictions = EXCLUDED.predictions,
                model_version = EXCLUDED.model_version
            "#,
        )
        .bind(device.id)
        .bind(&device.device_id)
        .bind(forecast.pred_ts)
        .bind(&forecast.for_ts)
        .bind(Json(&forecast.predictions))
        .bind(&forecast.model_version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn current_forecast(&self, device_id: &str) -> StoreResult<Option<Forecast>> {
        // ---
        let row = sqlx::query_as::<_, ForecastRow>(
            r#"
            SELECT device_id, pred_ts, for_ts, predictions, model_version
            FROM forecasts WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Forecast {
            device_id: r.device_id,
            pred_ts: r.pred_ts,
            for_ts: r.for_ts,
            predictions: r.predictions.0,
            model_version: r.model_version,
        }))
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn ingest(&self, reading: &NewReading, event: &AuditEvent) -> StoreResult<Device> {
        // ---
        // Dropping `tx` on any early return rolls the whole unit back
        let mut tx = self.pool.begin().await?;

        let device = upsert_device(&mut tx, &reading.device_id, reading.lat, reading.lon).await?;
        insert_reading(&mut tx, &device, reading).await?;
        insert_audit(&mut tx, event).await?;
        tx.commit().await?;

        audit::log_data_access(event);
        Ok(device)
    }
}
