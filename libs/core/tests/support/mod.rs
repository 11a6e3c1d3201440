#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How the fake backend answers `POST /api/create-session`.
#[derive(Clone)]
pub enum Behaviour {
    Healthy,
    Status(StatusCode, &'static str),
    Raw(&'static str),
    Slow(Duration),
}

#[derive(Clone, Debug)]
pub struct Captured {
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    behaviour: Behaviour,
    captured: Arc<Mutex<Vec<Captured>>>,
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Starts the fake backend, or returns `None` when binding to localhost is not permitted.
pub async fn spawn_backend(behaviour: Behaviour) -> Option<FakeBackend> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("skipping: cannot bind localhost: {err}");
            return None;
        }
    };
    Some(serve_on(listener, behaviour))
}

pub fn serve_on(listener: TcpListener, behaviour: Behaviour) -> FakeBackend {
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = FakeState {
        behaviour,
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route("/api/create-session", post(create_session))
        .with_state(state);
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app.into_make_service()).await {
            eprintln!("fake backend error: {err}");
        }
    });
    FakeBackend {
        addr,
        captured,
        server,
    }
}

/// An address nothing is listening on.
pub async fn closed_addr() -> Option<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
    let addr = listener.local_addr().ok()?;
    drop(listener);
    Some(addr)
}

pub fn healthy_payload() -> Value {
    let expires_at = time::OffsetDateTime::now_utc().unix_timestamp() + 3600;
    json!({
        "session_id": "sess_a1b2c3d4e5f60718",
        "client_secret": "cs_SECRETSECRETSECRET0000000",
        "expires_at": expires_at
    })
}

async fn create_session(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state
        .captured
        .lock()
        .unwrap()
        .push(Captured { headers, body });
    match state.behaviour {
        Behaviour::Healthy => Json(healthy_payload()).into_response(),
        Behaviour::Status(status, text) => (status, text).into_response(),
        Behaviour::Raw(text) => (StatusCode::OK, text).into_response(),
        Behaviour::Slow(delay) => {
            tokio::time::sleep(delay).await;
            Json(healthy_payload()).into_response()
        }
    }
}
