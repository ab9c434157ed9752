#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pixelrelay_core::{config::Config, event::ConversionPayload};
use pixelrelay_duckdb::DuckDbBackend;
use pixelrelay_server::app::build_app;
use pixelrelay_server::publisher::{ConversionPublisher, PublishError};
use pixelrelay_server::state::AppState;

pub const PAGE: &str = "65a1f0c2b3d4e5f6a7b8c9d0";

pub fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/pixelrelay-test".to_string(),
        graph_api_base: "http://127.0.0.1:9/v17.0".to_string(),
        ..Config::default()
    }
}

/// One captured publish call.
#[derive(Debug, Clone)]
pub struct Published {
    pub pixel_id: String,
    pub access_token: String,
    pub payload: Value,
}

/// Publisher that records calls and answers with a fixed outcome.
pub struct RecordingPublisher {
    pub calls: Mutex<Vec<Published>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn calls(&self) -> Vec<Published> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ConversionPublisher for RecordingPublisher {
    async fn publish(
        &self,
        pixel_id: &str,
        access_token: &str,
        payload: &ConversionPayload,
    ) -> Result<Value, PublishError> {
        self.calls.lock().expect("lock").push(Published {
            pixel_id: pixel_id.to_string(),
            access_token: access_token.to_string(),
            payload: serde_json::to_value(payload).expect("payload json"),
        });
        if self.fail {
            Err(PublishError {
                status: Some(400),
                details: json!({ "error": { "message": "Invalid OAuth access token." } }),
            })
        } else {
            Ok(json!({ "events_received": 1, "fbtrace_id": "trace-1" }))
        }
    }
}

pub fn state_with(publisher: Arc<RecordingPublisher>) -> Arc<AppState> {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    Arc::new(AppState::with_publisher(db, test_config(), publisher))
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

pub async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response<Body> {
    build_app(Arc::clone(state))
        .oneshot(request)
        .await
        .expect("request")
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

pub async fn stored_event_count(state: &Arc<AppState>) -> i64 {
    let conn = state.db.conn_for_test().await;
    conn.query_row("SELECT COUNT(*) FROM conversion_events", [], |row| row.get(0))
        .expect("count")
}
