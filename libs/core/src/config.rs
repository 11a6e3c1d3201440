use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::BridgeError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEV_DOMAIN_KEY: &str = "domain_pk_localhost_dev";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const SESSION_PATH: &str = "api/create-session";
const CHATKIT_PATH: &str = "chatkit";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Deployment {
    Development,
    Production,
}

impl Deployment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" | "local" => Some(Deployment::Development),
            "prod" | "production" => Some(Deployment::Production),
            _ => None,
        }
    }
}

/// Credential authorizing the chat runtime for one deployment domain.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DomainKey(String);

impl DomainKey {
    pub fn new(value: impl Into<String>) -> Result<Self, BridgeError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(BridgeError::ConfigurationIncomplete("domain key is empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeConfig {
    backend_base: Url,
    domain_key: DomainKey,
    deployment: Deployment,
    request_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(
        backend_base: &str,
        domain_key: DomainKey,
        deployment: Deployment,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            backend_base: parse_base(backend_base)?,
            domain_key,
            deployment,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Local development defaults: localhost backend and the dev domain key.
    pub fn development(backend_base: &str) -> Result<Self, BridgeError> {
        Self::new(
            backend_base,
            DomainKey(DEV_DOMAIN_KEY.to_string()),
            Deployment::Development,
        )
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let deployment = match get("DEPLOYMENT_ENV") {
            Some(raw) => Deployment::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown DEPLOYMENT_ENV, assuming development");
                Deployment::Development
            }),
            None => Deployment::Development,
        };

        let backend = get("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let domain_key = match (get("CHATKIT_DOMAIN_KEY"), deployment) {
            (Some(key), _) => DomainKey::new(key)?,
            (None, Deployment::Development) => DomainKey(DEV_DOMAIN_KEY.to_string()),
            (None, Deployment::Production) => {
                return Err(BridgeError::ConfigurationIncomplete(
                    "CHATKIT_DOMAIN_KEY must be set for production deployments",
                ));
            }
        };

        let timeout = match get("CHAT_SESSION_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                BridgeError::ConfigurationIncomplete(
                    "CHAT_SESSION_TIMEOUT_SECS must be a whole number of seconds",
                )
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self::new(&backend, domain_key, deployment)?
            .with_request_timeout(Duration::from_secs(timeout)))
    }

    pub fn backend_base(&self) -> &Url {
        &self.backend_base
    }

    pub fn domain_key(&self) -> &DomainKey {
        &self.domain_key
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn session_endpoint(&self) -> Url {
        self.join(SESSION_PATH)
    }

    pub fn chatkit_endpoint(&self) -> Url {
        self.join(CHATKIT_PATH)
    }

    fn join(&self, path: &str) -> Url {
        // `backend_base` always ends in '/', so joining a relative path cannot fail.
        self.backend_base
            .join(path)
            .unwrap_or_else(|_| self.backend_base.clone())
    }
}

fn parse_base(raw: &str) -> Result<Url, BridgeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::ConfigurationIncomplete("backend URL is empty"));
    }
    let mut url = Url::parse(trimmed)
        .map_err(|_| BridgeError::ConfigurationIncomplete("backend URL is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BridgeError::ConfigurationIncomplete(
            "backend URL must use http or https",
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
