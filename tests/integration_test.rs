mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tokio_test::assert_ok;

use common::{
    get, get_forwarded, post_json, send, spawn_app, spawn_app_with, token, wait_until,
    ScriptedEngine,
};
use weathercast::store::{DeviceRegistry, ForecastStore};

fn hour(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 30, 0, 0, 0).unwrap() + Duration::hours(i)
}

#[tokio::test]
async fn health_is_public() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let (status, body) = send(&app.router, get("/healthz", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn ingest_requires_bearer_token() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let body = json!({"device_id": "station-001", "lat": 1.0, "lon": 2.0});

    let (status, _) = send(&app.router, post_json("/api/v1/ingest", None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, post_json("/api/v1/ingest", Some("garbage"), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.store.reading_count("station-001"), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_ingest_is_a_client_error() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let t = token();

    // Missing coordinates
    let (status, body) = send(
        &app.router,
        post_json("/api/v1/ingest", Some(&t), json!({"device_id": "d", "lat": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Non-numeric measurement
    let (status, _) = send(
        &app.router,
        post_json(
            "/api/v1/ingest",
            Some(&t),
            json!({"device_id": "d", "lat": 1.0, "lon": 2.0, "temperature": "warm"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(assert_ok!(app.store.find_device("d").await).is_none());
    Ok(())
}

#[tokio::test]
async fn station_001_full_window_reaches_engine() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let t = token();

    for i in 0..24 {
        let body = json!({
            "device_id": "station-001",
            "lat": 12.9716,
            "lon": 77.5946,
            "ts": hour(i),
            "temperature": 20.0 + i as f64 * 0.1,
        });
        let (status, ack) = send(&app.router, post_json("/api/v1/ingest", Some(&t), body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"status": "ingested"}));
    }

    // One background refresh per ingest
    assert!(wait_until(|| app.engine.call_count() == 24).await);

    let before = Utc::now();
    let (status, forecast) = send(
        &app.router,
        get("/api/v1/predict?device_id=station-001", Some(&t)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let calls = app.engine.calls();
    assert_eq!(calls.len(), 25);
    let window = &calls[24];
    assert_eq!(window.len(), 24);
    assert!(window.windows(2).all(|w| w[0].ts <= w[1].ts));
    assert_eq!(window[0].ts, hour(0));
    assert!((window[23].measurements.temperature.unwrap() - 22.3).abs() < 1e-9);

    let pred_ts: DateTime<Utc> = serde_json::from_value(forecast["pred_ts"].clone())?;
    assert!(pred_ts >= before && pred_ts - before < Duration::seconds(5));
    assert_eq!(forecast["for_ts"].as_array().unwrap().len(), 8);
    assert_eq!(forecast["model_version"], "scripted-25");
    Ok(())
}

#[tokio::test]
async fn background_failure_never_fails_ingest() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::failing());
    let body = json!({"device_id": "station-009", "lat": 1.0, "lon": 2.0, "temperature": 18.0});

    let (status, ack) = send(&app.router, post_json("/api/v1/ingest", Some(&token()), body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({"status": "ingested"}));
    assert!(wait_until(|| app.engine.call_count() == 1).await);
    assert_eq!(app.store.forecast_count(), 0);
    assert_eq!(app.store.reading_count("station-009"), 1);
    Ok(())
}

#[tokio::test]
async fn new_device_gets_demo_forecast() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let body = json!({"device_id": "new-dev", "lat": 19.07, "lon": 72.87, "temperature": 25.0, "humidity": 60.0});
    let (status, _) = send(&app.router, post_json("/api/v1/ingest", Some(&token()), body)).await;
    assert_eq!(status, StatusCode::OK);

    let expected = json!([25.0, 25.5, 26.0, 26.5, 27.0, 27.5, 28.0, 28.5]);
    for (uri, bearer) in [
        ("/api/v1/predict?device_id=new-dev", Some(token())),
        ("/api/v1/public/predict?device_id=new-dev", None),
    ] {
        let (status, forecast) = send(&app.router, get(uri, bearer.as_deref())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(forecast["model_version"], "demo_forecast");
        assert_eq!(forecast["predictions"]["temperature"], expected);
        assert_eq!(forecast["predictions"]["humidity"][1], 62.0);
        assert_eq!(forecast["for_ts"].as_array().unwrap().len(), 8);
    }
    Ok(())
}

#[tokio::test]
async fn unknown_device_gets_empty_forecast() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let (status, forecast) = send(
        &app.router,
        get("/api/v1/predict?device_id=nobody", Some(&token())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(forecast["for_ts"], json!([]));
    assert_eq!(forecast["predictions"], json!({}));
    assert_eq!(forecast["model_version"], "no_data");
    assert_eq!(app.engine.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_insert_rolls_back_device_upsert() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let t = token();
    let first = json!({"device_id": "d", "lat": 1.0, "lon": 2.0});
    send(&app.router, post_json("/api/v1/ingest", Some(&t), first)).await;
    let before = assert_ok!(app.store.find_device("d").await);

    app.store.fail_reading_inserts(true);
    let moved = json!({"device_id": "d", "lat": 50.0, "lon": 8.0});
    let (status, body) = send(&app.router, post_json("/api/v1/ingest", Some(&t), moved)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STORAGE_ERROR");
    assert_eq!(app.store.reading_count("d"), 1);
    assert_eq!(assert_ok!(app.store.find_device("d").await), before);
    Ok(())
}

#[tokio::test]
async fn repeated_forecasts_overwrite() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let t = token();
    for i in 0..24 {
        let body = json!({"device_id": "d", "lat": 1.0, "lon": 2.0, "ts": hour(i), "temperature": 10.0});
        send(&app.router, post_json("/api/v1/ingest", Some(&t), body)).await;
    }
    // Background writes must land before the on-demand ones
    let all_stored = "weathercast_forecast_jobs_total{state=\"stored\"} 24";
    assert!(wait_until(|| app.metrics.render().contains(all_stored)).await);

    send(&app.router, get("/api/v1/predict?device_id=d", Some(&t))).await;
    let (_, second) = send(&app.router, get("/api/v1/predict?device_id=d", Some(&t))).await;

    let current = assert_ok!(app.store.current_forecast("d").await).unwrap();
    assert_eq!(app.store.forecast_count(), 1);
    assert_eq!(current.model_version, "scripted-26");
    assert_eq!(second["model_version"], "scripted-26");
    Ok(())
}

#[tokio::test]
async fn devices_and_latest() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let t = token();
    for (i, temp) in [(3, 21.0), (1, 19.0)] {
        let body = json!({"device_id": "station-002", "lat": 28.61, "lon": 77.21, "ts": hour(i), "temperature": temp});
        send(&app.router, post_json("/api/v1/ingest", Some(&t), body)).await;
    }

    let (status, devices) = send(&app.router, get("/api/v1/devices", Some(&t))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(devices.as_array().unwrap().len(), 1);
    assert_eq!(devices[0]["device_id"], "station-002");
    assert_eq!(devices[0]["lat"], 28.61);

    // Latest is by timestamp, not arrival
    let (_, latest) = send(&app.router, get("/api/v1/latest?device_id=station-002", Some(&t))).await;
    assert_eq!(latest["temperature"], 21.0);

    let (status, absent) = send(&app.router, get("/api/v1/public/latest?device_id=none", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(absent.is_null());
    Ok(())
}

#[tokio::test]
async fn prediction_text_without_readings() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let (status, body) = send(
        &app.router,
        get("/api/v1/prediction-text?device_id=ghost", Some(&token())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "insufficient_data");
    assert_eq!(body["prediction_text"], json!({}));
    Ok(())
}

#[tokio::test]
async fn public_surface_can_be_disabled() -> Result<()> {
    // ---
    let app = spawn_app_with(ScriptedEngine::succeeding(), false);
    let (status, _) = send(&app.router, get("/api/v1/public/devices", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, get("/api/v1/devices", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn predict_is_rate_limited() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    for _ in 0..30 {
        let (status, _) = send(&app.router, get("/api/v1/public/predict?device_id=x", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app.router, get("/api/v1/public/predict?device_id=x", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // Other routes keep their own quota
    let (status, _) = send(&app.router, get("/api/v1/public/devices", None)).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn metrics_report_outcomes() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    send(&app.router, get("/api/v1/public/predict?device_id=x", None)).await;

    let (status, body) = send(&app.router, get("/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("weathercast_forecast_requests_total{outcome=\"no_data\"} 1"));
    Ok(())
}

#[tokio::test]
async fn forwarded_header_does_not_reset_quota() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let mut accepted = 0;
    for i in 0..40 {
        let request = get_forwarded("/api/v1/public/predict?device_id=x", &format!("10.0.0.{}", i));
        let (status, _) = send(&app.router, request).await;
        if status == StatusCode::OK {
            accepted += 1;
        } else {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(accepted, 30);
    Ok(())
}

#[tokio::test]
async fn forwarded_header_is_not_the_audit_origin() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let mut request = post_json(
        "/api/v1/ingest",
        Some(&token()),
        json!({"device_id": "d", "lat": 1.0, "lon": 2.0}),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse()?);
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);

    let events = app.store.audit_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].origin, "unknown");
    Ok(())
}

#[tokio::test]
async fn missing_device_id_uses_error_envelope() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    for uri in ["/api/v1/predict", "/api/v1/latest", "/api/v1/prediction-text"] {
        let (status, body) = send(&app.router, get(uri, Some(&token()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{}", uri);
    }
    Ok(())
}

#[tokio::test]
async fn demo_wind_and_radiation_start_from_fixed_values() -> Result<()> {
    // ---
    let app = spawn_app(ScriptedEngine::succeeding());
    let body = json!({
        "device_id": "windy",
        "lat": 1.0,
        "lon": 2.0,
        "wind_speed": 12.0,
        "radiation": 0.0,
        "temperature": 18.0,
    });
    send(&app.router, post_json("/api/v1/ingest", Some(&token()), body)).await;

    let (_, forecast) = send(&app.router, get("/api/v1/predict?device_id=windy", Some(&token()))).await;
    assert_eq!(forecast["model_version"], "demo_forecast");
    assert_eq!(forecast["predictions"]["wind_speed"][0], 3.0);
    assert_eq!(forecast["predictions"]["radiation"][0], 400.0);
    assert_eq!(forecast["predictions"]["radiation"][1], 450.0);
    assert_eq!(forecast["predictions"]["temperature"][0], 18.0);
    Ok(())
}
