#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use weathercast::engine::{hourly_ticks, EngineError, EngineForecast, ForecastEngine};
use weathercast::metrics::Metrics;
use weathercast::models::{Predictions, SensorReading};
use weathercast::store::{MemoryStorage, Storage};
use weathercast::{routes, AppState, Config};

pub const SECRET: &str = "integration-secret";

// ---

/// Engine that records every window it is given.
pub struct ScriptedEngine {
    fail: bool,
    calls: Mutex<Vec<Vec<SensorReading>>>,
}

impl ScriptedEngine {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<SensorReading>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ForecastEngine for ScriptedEngine {
    async fn predict(
        &self,
        _device_id: &str,
        window: &[SensorReading],
    ) -> Result<EngineForecast, EngineError> {
        // ---
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(window.to_vec());
            calls.len()
        };
        if self.fail {
            return Err(EngineError::InvalidForecast("model exploded".into()));
        }

        let mut predictions = Predictions::new();
        predictions.insert("temperature".into(), vec![19.0; 8]);
        Ok(EngineForecast {
            for_ts: hourly_ticks(Utc::now()),
            predictions,
            model_version: format!("scripted-{}", n),
        })
    }
}

pub fn test_config(public_api: bool) -> Config {
    // ---
    Config {
        db_url: None,
        db_pool_max: 1,
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: SECRET.into(),
        model_url: None,
        model_timeout_secs: 1,
        job_queue_capacity: 64,
        cors_origins: vec!["http://localhost:5173".into()],
        public_api,
        trust_forwarded_for: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStorage,
    pub engine: Arc<ScriptedEngine>,
    pub metrics: Metrics,
}

pub fn spawn_app(engine: Arc<ScriptedEngine>) -> TestApp {
    spawn_app_with(engine, true)
}

pub fn spawn_app_with(engine: Arc<ScriptedEngine>, public_api: bool) -> TestApp {
    // ---
    let store = MemoryStorage::new();
    let storage: Arc<dyn Storage> = Arc::new(store.clone());
    let (state, _worker) = AppState::new(test_config(public_api), storage, engine.clone());

    let metrics = state.metrics.clone();

    TestApp {
        router: routes::router(state),
        metrics,
        store,
        engine,
    }
}

pub fn token() -> String {
    weathercast::auth::issue_token(SECRET, "integration-tester", chrono::Duration::hours(1))
        .unwrap()
}

pub fn post_json(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    // ---
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    // ---
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::empty()).unwrap()
}

/// Unauthenticated GET claiming to come from `forwarded_for`.
pub fn get_forwarded(uri: &str, forwarded_for: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", forwarded_for)
        .body(Body::empty())
        .unwrap()
}

/// Run one request; non-JSON bodies come back as `Value::String`.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    // ---
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

/// Poll `cond` for up to two seconds.
pub async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
