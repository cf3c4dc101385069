//! In-process stand-in for AWS JSON-protocol endpoints.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Answers every request with one fixed response and records
/// `(x-amz-target, body)` pairs.
#[derive(Clone)]
pub struct FakeAws {
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
    status: u16,
    body: String,
}

impl FakeAws {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            requests: Arc::default(),
            status,
            body: body.to_string(),
        }
    }

    /// Serve on an ephemeral port and return the endpoint URL.
    pub async fn serve(&self) -> String {
        let app = Router::new().fallback(handle).with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn targets(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }
}

async fn handle(State(fake): State<FakeAws>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    fake.requests
        .lock()
        .unwrap()
        .push((target, String::from_utf8_lossy(&body).into_owned()));

    (
        StatusCode::from_u16(fake.status).unwrap(),
        [("content-type", "application/x-amz-json-1.1")],
        fake.body.clone(),
    )
}

/// An endpoint nothing listens on.
pub const CLOSED_ENDPOINT: &str = "http://127.0.0.1:1";
