use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// One POST received by the server, kept so tests can assert on what
/// actually reached the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordedCall {
    pub id: Uuid,
    pub path: String,
    pub body: String,
}

/// Response of `POST /echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub id: Uuid,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

/// Response of `POST /status/{code}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusReply {
    pub code: u16,
    pub status: String,
}

pub type Calls = Arc<RwLock<Vec<RecordedCall>>>;

pub fn app() -> Router {
    let calls: Calls = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/echo", post(echo))
        .route("/status/{code}", post(status))
        .route("/slow/{millis}", post(slow))
        .route("/calls", get(list_calls).delete(clear_calls))
        .with_state(calls)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    tracing::info!(addr = ?listener.local_addr().ok(), "mock server listening");
    axum::serve(listener, app()).await
}

async fn record(calls: &Calls, path: String, body: &str) -> Uuid {
    let id = Uuid::new_v4();
    tracing::debug!(%id, %path, "recorded call");
    calls.write().await.push(RecordedCall {
        id,
        path,
        body: body.to_string(),
    });
    id
}

async fn echo(State(calls): State<Calls>, headers: HeaderMap, body: String) -> Json<Echo> {
    let id = record(&calls, "/echo".to_string(), &body).await;
    let headers = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo { id, body, headers })
}

async fn status(
    State(calls): State<Calls>,
    Path(code): Path<u16>,
    body: String,
) -> Result<(StatusCode, Json<StatusReply>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    record(&calls, format!("/status/{code}"), &body).await;
    let reply = StatusReply {
        code,
        status: status.canonical_reason().unwrap_or("").to_string(),
    };
    Ok((status, Json(reply)))
}

async fn slow(
    State(calls): State<Calls>,
    Path(millis): Path<u64>,
    body: String,
) -> Json<StatusReply> {
    record(&calls, format!("/slow/{millis}"), &body).await;
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json(StatusReply {
        code: 200,
        status: "OK".to_string(),
    })
}

async fn list_calls(State(calls): State<Calls>) -> Json<Vec<RecordedCall>> {
    Json(calls.read().await.clone())
}

async fn clear_calls(State(calls): State<Calls>) -> StatusCode {
    calls.write().await.clear();
    StatusCode::NO_CONTENT
}
