//! Post a day of hourly readings for three demo stations.
//!
//! Environment:
//! - `BASE_URL` (default `http://localhost:8080`)
//! - `API_TOKEN`, or `JWT_SECRET` to mint a short-lived token
use std::env;
use std::f64::consts::PI;

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use dotenvy::dotenv;
use serde_json::json;

use weathercast::auth::issue_token;

struct Station {
    device_id: &'static str,
    lat: f64,
    lon: f64,
    base_temp: f64,
    base_humidity: f64,
}

const STATIONS: [Station; 3] = [
    Station {
        device_id: "station-001",
        lat: 12.9716,
        lon: 77.5946,
        base_temp: 24.0,
        base_humidity: 65.0,
    },
    Station {
        device_id: "station-002",
        lat: 28.6139,
        lon: 77.2090,
        base_temp: 27.5,
        base_humidity: 55.0,
    },
    Station {
        device_id: "station-003",
        lat: 19.0760,
        lon: 72.8777,
        base_temp: 29.0,
        base_humidity: 78.0,
    },
];

const HOURS: i64 = 24;

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    tracing_subscriber::fmt().compact().init();

    let base = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let token = match env::var("API_TOKEN") {
        Ok(t) => t,
        Err(_) => {
            let secret = env::var("JWT_SECRET")
                .map_err(|_| anyhow!("API_TOKEN or JWT_SECRET must be set"))?;
            issue_token(&secret, "test-data-generator", Duration::hours(1))?
        }
    };

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/ingest", base);
    let now = Utc::now();
    let mut failures = 0;

    for (s, station) in STATIONS.iter().enumerate() {
        tracing::info!("Processing device: {}", station.device_id);

        for i in 0..HOURS {
            // Daily temperature cycle plus a deterministic wobble per station
            let phase = i as f64 * PI / 12.0;
            let wobble = ((i as f64) * 1.7 + s as f64).sin();
            let daylight = (6..=18).contains(&i);

            let body = json!({
                "device_id": station.device_id,
                "lat": station.lat,
                "lon": station.lon,
                "ts": now - Duration::hours(HOURS - i),
                "temperature": round1(station.base_temp + phase.sin() * 5.0 + wobble),
                "humidity": round1(station.base_humidity + wobble * 8.0),
                "wind_speed": round1(6.0 + wobble * 4.0),
                "radiation": if daylight { (phase.sin().max(0.0) * 900.0).round() } else { 0.0 },
                "precipitation": if wobble > 0.8 { round1(wobble * 2.0) } else { 0.0 },
            });

            let response = client
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(r) if r.status().is_success() => {
                    tracing::info!("  [OK] hour {}: {}", i + 1, body["temperature"]);
                }
                Ok(r) => {
                    failures += 1;
                    let status = r.status();
                    let text = r.text().await.unwrap_or_default();
                    tracing::warn!("  [FAIL] hour {}: {} - {}", i + 1, status, text);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!("  [ERROR] hour {}: {}", i + 1, e);
                }
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} readings failed to post", failures));
    }
    tracing::info!("Posted {} readings to {}", STATIONS.len() as i64 * HOURS, base);
    Ok(())
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
