//! Database schema management for `codemetal-weathercast`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `devices`, `sensor_readings`, `forecasts` (one current row per
/// device) and `audit_log`. Safe to call on every startup; no-op if objects
/// already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Device identity, upserted on every ingest
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id         BIGSERIAL PRIMARY KEY,
            device_id  TEXT             NOT NULL UNIQUE,
            lat        DOUBLE PRECISION NOT NULL,
            lon        DOUBLE PRECISION NOT NULL,
            last_seen  TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Append-only readings; device_id is denormalized for windowed reads
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id             BIGSERIAL PRIMARY KEY,
            device_fk      BIGINT      NOT NULL REFERENCES devices (id),
            device_id      TEXT        NOT NULL,
            ts             TIMESTAMPTZ NOT NULL,
            temperature    DOUBLE PRECISION,
            humidity       DOUBLE PRECISION,
            wind_speed     DOUBLE PRECISION,
            radiation      DOUBLE PRECISION,
            precipitation  DOUBLE PRECISION,
            raw            JSONB       NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS forecasts (
            device_fk      BIGINT PRIMARY KEY REFERENCES devices (id),
            device_id      TEXT          NOT NULL,
            pred_ts        TIMESTAMPTZ   NOT NULL,
            for_ts         TIMESTAMPTZ[] NOT NULL,
            predictions    JSONB         NOT NULL,
            model_version  TEXT          NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id             UUID PRIMARY KEY,
            at             TIMESTAMPTZ NOT NULL,
            actor          TEXT        NOT NULL,
            resource_type  TEXT        NOT NULL,
            resource_id    TEXT        NOT NULL,
            action         TEXT        NOT NULL,
            origin         TEXT        NOT NULL,
            details        JSONB       NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Window reads: most recent N per device
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_device_ts
            ON sensor_readings (device_id, ts DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_forecasts_device_id
            ON forecasts (device_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
