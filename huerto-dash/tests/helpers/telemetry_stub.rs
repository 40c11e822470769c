//! Local stand-in for the SenseCAP telemetry API
//!
//! Serves canned bodies per `device_eui` on 127.0.0.1 with an OS-assigned
//! port and records every query it receives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use serde_json::{json, Value};

use huerto_common::config::Credentials;

/// Credentials the stub accepts
pub const KEY_ID: &str = "user";
pub const SECRET: &str = "pass";
/// `base64("user:pass")`
const EXPECTED_AUTH: &str = "Basic dXNlcjpwYXNz";

pub const TEMPERATURE: &str = "4102";
pub const HUMIDITY: &str = "4103";
pub const CONDUCTIVITY: &str = "4108";

pub fn credentials() -> Credentials {
    Credentials {
        key_id: KEY_ID.to_string(),
        secret: SECRET.to_string(),
    }
}

#[derive(Clone, Default)]
struct StubState {
    responses: Arc<HashMap<String, (StatusCode, String)>>,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    delay: Duration,
}

pub struct TelemetryStub {
    pub url: String,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl TelemetryStub {
    /// Queries received so far, in arrival order
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }
}

async fn list_telemetry_data(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.requests.lock().unwrap().push(query.clone());
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == EXPECTED_AUTH);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, String::new());
    }

    let device = query.get("device_eui").cloned().unwrap_or_default();
    state
        .responses
        .get(&device)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, String::new()))
}

/// Start the stub with `(status, body)` per device EUI
pub async fn spawn(responses: HashMap<String, (StatusCode, String)>) -> TelemetryStub {
    spawn_with_delay(responses, Duration::ZERO).await
}

/// Like [`spawn`], but every answer is held back by `delay`
pub async fn spawn_with_delay(
    responses: HashMap<String, (StatusCode, String)>,
    delay: Duration,
) -> TelemetryStub {
    let state = StubState {
        responses: Arc::new(responses),
        requests: Arc::default(),
        delay,
    };
    let requests = Arc::clone(&state.requests);

    let app = Router::new()
        .route("/openapi/list_telemetry_data", get(list_telemetry_data))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TelemetryStub {
        url: format!("http://{}/openapi/list_telemetry_data", addr),
        requests,
    }
}

/// Build a `data.list` body from `(type code, [(value, timestamp)])` blocks
pub fn device_body(blocks: &[(&str, Vec<(f64, &str)>)]) -> String {
    let header: Vec<Value> = blocks.iter().map(|(code, _)| json!([1, code])).collect();
    let values: Vec<Value> = blocks
        .iter()
        .map(|(_, points)| {
            Value::Array(points.iter().map(|(v, ts)| json!([v, ts])).collect())
        })
        .collect();

    json!({
        "code": "0",
        "data": { "list": [header, values] }
    })
    .to_string()
}

pub fn ok(body: String) -> (StatusCode, String) {
    (StatusCode::OK, body)
}
