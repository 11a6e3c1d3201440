//! Session Broker: exchanges a visitor identity for backend chat credentials.
//!
//! Every call issues exactly one uncached `POST {base}/api/create-session`. The broker never
//! retries; callers decide whether to offer a manual retry based on the returned error.

use std::{collections::VecDeque, sync::Arc, time::Instant};

use async_trait::async_trait;
use http::{StatusCode, header};
use metrics::{counter, histogram};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info};
use url::Url;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Unreachable};
use crate::identity::VisitorIdentity;
use crate::session::{ChatSession, ClientSecret};
use crate::telemetry::span_for_negotiation;

const ENDPOINT_LABEL: &str = "api.create_session";

#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn create_session(&self, identity: &VisitorIdentity) -> Result<ChatSession, BridgeError>;
}

pub type SharedSessionApi = Arc<dyn SessionApi>;

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    user_id: &'a str,
}

#[derive(Clone)]
pub struct ReqwestSessionBroker {
    client: Client,
    endpoint: Url,
}

impl ReqwestSessionBroker {
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|_| BridgeError::ConfigurationIncomplete("failed to build HTTP client"))?;
        Ok(Self::with_client(client, config))
    }

    /// Uses a caller-provided client; its timeout settings apply as-is.
    pub fn with_client(client: Client, config: &BridgeConfig) -> Self {
        Self {
            client,
            endpoint: config.session_endpoint(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SessionApi for ReqwestSessionBroker {
    async fn create_session(&self, identity: &VisitorIdentity) -> Result<ChatSession, BridgeError> {
        let span = span_for_negotiation("create_session", identity);
        async {
            info!(endpoint = %self.endpoint, "negotiating chat session");
            let started = Instant::now();
            let response = self
                .client
                .post(self.endpoint.clone())
                .header(header::CACHE_CONTROL, "no-store")
                .header(header::PRAGMA, "no-cache")
                .json(&CreateSessionRequest {
                    user_id: identity.id(),
                })
                .send()
                .await
                .map_err(|err| {
                    let err = BridgeError::from_transport(err);
                    counter!(
                        "twin_chat_errors_total",
                        "kind" => "session_transport",
                        "endpoint" => ENDPOINT_LABEL
                    )
                    .increment(1);
                    error!(error = %err.diagnostic(), "chat backend unreachable");
                    err
                })?;

            let status = response.status();
            histogram!(
                "twin_chat_session_roundtrip_seconds",
                "endpoint" => ENDPOINT_LABEL,
                "status" => status.as_str().to_string()
            )
            .record(started.elapsed().as_secs_f64());

            map_response(status, response).await
        }
        .instrument(span)
        .await
    }
}

async fn map_response(
    status: StatusCode,
    response: reqwest::Response,
) -> Result<ChatSession, BridgeError> {
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) if status.is_success() => return Err(BridgeError::from_transport(err)),
        Err(_) => "<unreadable>".to_string(),
    };

    if !status.is_success() {
        counter!(
            "twin_chat_errors_total",
            "kind" => "session_remote",
            "endpoint" => ENDPOINT_LABEL,
            "status" => status.as_str().to_string()
        )
        .increment(1);
        let err = BridgeError::rejected(status, &body);
        error!(status = status.as_u16(), detail = %err.diagnostic(), "chat backend rejected session request");
        return Err(err);
    }

    let session = match serde_json::from_str::<ChatSession>(&body) {
        Ok(session) if !session.session_id.is_empty() && !session.client_secret.is_empty() => {
            session
        }
        Ok(_) => {
            counter!(
                "twin_chat_errors_total",
                "kind" => "session_decode",
                "endpoint" => ENDPOINT_LABEL
            )
            .increment(1);
            error!(status = status.as_u16(), "chat backend returned empty session credentials");
            return Err(BridgeError::BackendRejected {
                status,
                body: "session credentials missing from response".to_string(),
            });
        }
        Err(err) => {
            counter!(
                "twin_chat_errors_total",
                "kind" => "session_decode",
                "endpoint" => ENDPOINT_LABEL
            )
            .increment(1);
            error!(
                status = status.as_u16(),
                category = ?err.classify(),
                line = err.line(),
                column = err.column(),
                "chat backend returned undecodable session"
            );
            return Err(BridgeError::rejected(status, &redact_session_body(&body)));
        }
    };

    debug!(
        expires_at = session.expires_at.unix_timestamp(),
        "chat session negotiated"
    );
    Ok(session)
}

/// A 2xx body that failed to decode may still carry live credentials; mask them before the
/// body is kept for diagnostics.
fn redact_session_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(mut value) => {
            if let Some(secret) = value.get_mut("client_secret") {
                *secret = serde_json::Value::String("<redacted>".to_string());
            }
            value.to_string()
        }
        Err(_) => body.to_string(),
    }
}

/// Scripted reply for [`MockSessionBroker`].
#[derive(Clone, Debug)]
pub enum MockReply {
    Session(ChatSession),
    Unreachable,
    Rejected(StatusCode, String),
    /// Fails with a non-retryable configuration error.
    Misconfigured,
}

/// In-process broker that records every request and replays scripted replies in order.
/// Once the script is exhausted it keeps issuing a fixed healthy session.
pub struct MockSessionBroker {
    pub requests: Mutex<Vec<VisitorIdentity>>,
    replies: Mutex<VecDeque<MockReply>>,
}

impl MockSessionBroker {
    pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub fn healthy_session() -> ChatSession {
        ChatSession {
            session_id: "sess_0000000000000000".into(),
            client_secret: ClientSecret::new("cs_000000000000000000000000"),
            expires_at: time::OffsetDateTime::now_utc() + time::Duration::hours(1),
        }
    }
}

impl Default for MockSessionBroker {
    fn default() -> Self {
        Self::new([])
    }
}

#[async_trait]
impl SessionApi for MockSessionBroker {
    async fn create_session(&self, identity: &VisitorIdentity) -> Result<ChatSession, BridgeError> {
        self.requests.lock().await.push(identity.clone());
        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(MockReply::Session(session)) => Ok(session),
            Some(MockReply::Unreachable) => Err(BridgeError::BackendUnreachable {
                reason: Unreachable::Connect,
                source: None,
            }),
            Some(MockReply::Rejected(status, body)) => Err(BridgeError::rejected(status, &body)),
            Some(MockReply::Misconfigured) => Err(BridgeError::ConfigurationIncomplete(
                "CHATKIT_DOMAIN_KEY",
            )),
            None => Ok(Self::healthy_session()),
        }
    }
}
