use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Upper bound on the response body kept for diagnostics.
pub const MAX_BODY_SNIPPET: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreachable {
    Connect,
    Timeout,
    Transport,
}

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Unreachable::Connect => "connection refused or dropped",
            Unreachable::Timeout => "request timed out",
            Unreachable::Transport => "transport failure",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("chat backend is offline ({reason}); is the backend service running?")]
    BackendUnreachable {
        reason: Unreachable,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("chat backend rejected the session request (status {status})")]
    BackendRejected { status: StatusCode, body: String },
    #[error("chat bridge configuration incomplete: {0}")]
    ConfigurationIncomplete(&'static str),
    #[error("chat runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

impl BridgeError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            Unreachable::Timeout
        } else if err.is_connect() {
            Unreachable::Connect
        } else {
            Unreachable::Transport
        };
        BridgeError::BackendUnreachable {
            reason,
            source: Some(err),
        }
    }

    pub fn rejected(status: StatusCode, body: &str) -> Self {
        BridgeError::BackendRejected {
            status,
            body: truncate_body(body),
        }
    }

    /// Message safe to show to a visitor.
    pub fn user_message(&self) -> &'static str {
        match self {
            BridgeError::BackendUnreachable { .. } => {
                "The AI Twin backend is offline. Please make sure the backend service is running."
            }
            BridgeError::BackendRejected { .. } => {
                "The AI Twin is temporarily unavailable. Please try again."
            }
            BridgeError::ConfigurationIncomplete(_) => {
                "The AI Twin is not configured for this deployment."
            }
            BridgeError::RuntimeUnavailable(_) => "The chat panel could not be started.",
        }
    }

    /// Detail for logs and development builds. Never contains session credentials.
    pub fn diagnostic(&self) -> String {
        match self {
            BridgeError::BackendUnreachable {
                reason,
                source: Some(source),
            } => format!("backend unreachable ({reason}): {source}"),
            BridgeError::BackendUnreachable { reason, source: None } => {
                format!("backend unreachable ({reason})")
            }
            BridgeError::BackendRejected { status, body } => {
                format!("backend returned {status}: {body}")
            }
            other => other.to_string(),
        }
    }

    /// Whether the panel should offer a manual retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BridgeError::ConfigurationIncomplete(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BridgeError::BackendRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self {
            BridgeError::BackendUnreachable { .. } => "unreachable",
            BridgeError::BackendRejected { .. } => "rejected",
            BridgeError::ConfigurationIncomplete(_) => "configuration",
            BridgeError::RuntimeUnavailable(_) => "runtime",
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_SNIPPET {
        return body.to_string();
    }
    let mut end = MAX_BODY_SNIPPET;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
