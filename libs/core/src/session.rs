use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Credential handed to the chat runtime. Never printed through `Debug` or `Display`.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret(<redacted>)")
    }
}

impl fmt::Display for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Backend-issued chat credentials for one negotiation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub client_secret: ClientSecret,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl ChatSession {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

/// A session issued by the dev backend, with the visitor it belongs to.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub session: ChatSession,
    pub user_id: String,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<IssuedSession>>;
    async fn insert(&self, issued: IssuedSession) -> Result<()>;
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize>;
    async fn len(&self) -> Result<usize>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<HashMap<String, IssuedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<IssuedSession>> {
        let guard = self.inner.read().await;
        Ok(guard.get(session_id).cloned())
    }

    async fn insert(&self, issued: IssuedSession) -> Result<()> {
        let mut guard = self.inner.write().await;
        let now = OffsetDateTime::now_utc();
        guard.retain(|_, existing| !existing.session.is_expired_at(now));
        guard.insert(issued.session.session_id.clone(), issued);
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize> {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, existing| !existing.session.is_expired_at(now));
        Ok(before - guard.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().await.len())
    }
}

pub type SharedSessionStore = Arc<dyn SessionStore>;
