//! Local stand-in for the chat backend's session endpoint.
//!
//! ```text
//! POST /api/create-session   { "user_id": "user-42" }
//!   -> { "session_id": "sess_…", "client_secret": "cs_…", "expires_at": 1735689600 }
//! ```

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::net::TcpListener;
use tracing::{error, info};
use uuid::Uuid;

use crate::identity::VisitorIdentity;
use crate::session::{
    ChatSession, ClientSecret, IssuedSession, MemorySessionStore, SharedSessionStore,
};

pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(1);

#[derive(Clone)]
pub struct StandaloneState {
    sessions: SharedSessionStore,
    ttl: Duration,
}

impl StandaloneState {
    pub fn new(sessions: SharedSessionStore, ttl: Duration) -> Self {
        Self { sessions, ttl }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), DEFAULT_SESSION_TTL)
    }

    pub fn sessions(&self) -> &SharedSessionStore {
        &self.sessions
    }
}

pub fn router(state: Arc<StandaloneState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/create-session", post(create_session))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<StandaloneState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "standalone chat backend listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct CreateSessionBody {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn create_session(
    State(state): State<Arc<StandaloneState>>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Response, StandaloneError> {
    let visitor = VisitorIdentity::from_user_id(body.user_id.as_deref());
    let now = OffsetDateTime::now_utc();
    let session = issue_session(now, state.ttl);

    state
        .sessions
        .insert(IssuedSession {
            session: session.clone(),
            user_id: visitor.id().to_string(),
            created_at: now,
        })
        .await
        .map_err(StandaloneError)?;

    info!(
        anonymous = visitor.is_anonymous(),
        expires_at = session.expires_at.unix_timestamp(),
        "issued chat session"
    );
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(session)).into_response())
}

fn issue_session(now: OffsetDateTime, ttl: Duration) -> ChatSession {
    let session_hex = Uuid::new_v4().simple().to_string();
    let secret_hex = Uuid::new_v4().simple().to_string();
    let expires_at = (now + ttl).replace_nanosecond(0).unwrap_or(now + ttl);
    ChatSession {
        session_id: format!("sess_{}", &session_hex[..16]),
        client_secret: ClientSecret::new(format!("cs_{}", &secret_hex[..24])),
        expires_at,
    }
}

#[derive(Debug)]
struct StandaloneError(anyhow::Error);

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for StandaloneError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "failed to issue chat session");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: "internal server error",
            }),
        )
            .into_response()
    }
}
