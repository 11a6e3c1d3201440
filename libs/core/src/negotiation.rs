use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{Instrument, debug, warn};

use crate::broker::SharedSessionApi;
use crate::error::BridgeError;
use crate::identity::VisitorIdentity;
use crate::session::ChatSession;
use crate::telemetry::span_for_negotiation;

/// Visible state of the chat panel with respect to session negotiation.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelStatus {
    Idle,
    Negotiating,
    Ready(ChatSession),
    Unavailable {
        message: String,
        /// Diagnostic detail, only populated when diagnostics are enabled.
        detail: Option<String>,
        retryable: bool,
    },
}

#[derive(Debug)]
pub enum NegotiationOutcome {
    Applied(ChatSession),
    Failed(BridgeError),
    /// A newer negotiation started before this one resolved; its result was discarded.
    Superseded,
    /// Retry refused because the visible failure is not retryable. No request was sent.
    Declined,
}

/// Drives session negotiation for one chat panel. The most recently started request wins:
/// results of older requests that resolve late never reach the visible status.
pub struct SessionNegotiator {
    api: SharedSessionApi,
    generation: AtomicU64,
    status: watch::Sender<PanelStatus>,
    show_diagnostics: bool,
}

impl SessionNegotiator {
    pub fn new(api: SharedSessionApi) -> Self {
        let (status, _) = watch::channel(PanelStatus::Idle);
        Self {
            api,
            generation: AtomicU64::new(0),
            status,
            show_diagnostics: false,
        }
    }

    /// Exposes diagnostic detail in the visible status (development builds).
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.show_diagnostics = enabled;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> PanelStatus {
        self.status.borrow().clone()
    }

    pub async fn negotiate(&self, identity: &VisitorIdentity) -> NegotiationOutcome {
        let mut ticket = 0;
        self.status.send_modify(|status| {
            ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = PanelStatus::Negotiating;
        });

        let result = self
            .api
            .create_session(identity)
            .instrument(span_for_negotiation("negotiate", identity))
            .await;

        let next = match &result {
            Ok(session) => PanelStatus::Ready(session.clone()),
            Err(err) => {
                warn!(error = %err.diagnostic(), kind = err.kind_label(), "chat session unavailable");
                PanelStatus::Unavailable {
                    message: err.user_message().to_string(),
                    detail: self.show_diagnostics.then(|| err.diagnostic()),
                    retryable: err.is_retryable(),
                }
            }
        };

        let applied = self.status.send_if_modified(|status| {
            if self.generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *status = next;
            true
        });

        if !applied {
            debug!(ticket, "discarding superseded negotiation result");
            return NegotiationOutcome::Superseded;
        }
        match result {
            Ok(session) => NegotiationOutcome::Applied(session),
            Err(err) => NegotiationOutcome::Failed(err),
        }
    }

    /// Manual retry affordance: one new negotiation, nothing more. Only offered while the
    /// visible failure is retryable.
    pub async fn retry(&self, identity: &VisitorIdentity) -> NegotiationOutcome {
        let declined = matches!(
            *self.status.borrow(),
            PanelStatus::Unavailable {
                retryable: false,
                ..
            }
        );
        if declined {
            debug!("retry declined for non-retryable failure");
            return NegotiationOutcome::Declined;
        }
        self.negotiate(identity).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;

    use super::*;
    use crate::broker::{MockReply, MockSessionBroker};

    #[tokio::test]
    async fn success_marks_panel_ready() {
        let broker = Arc::new(MockSessionBroker::default());
        let negotiator = SessionNegotiator::new(broker.clone());
        assert_eq!(negotiator.status(), PanelStatus::Idle);

        let outcome = negotiator.negotiate(&VisitorIdentity::anonymous()).await;
        assert!(matches!(outcome, NegotiationOutcome::Applied(_)));
        assert!(matches!(negotiator.status(), PanelStatus::Ready(_)));
        assert_eq!(broker.request_count().await, 1);
    }

    #[tokio::test]
    async fn failure_hides_detail_unless_enabled() {
        let broker = Arc::new(MockSessionBroker::new([
            MockReply::Rejected(StatusCode::INTERNAL_SERVER_ERROR, "stack trace".into()),
            MockReply::Rejected(StatusCode::INTERNAL_SERVER_ERROR, "stack trace".into()),
        ]));
        let quiet = SessionNegotiator::new(broker.clone());
        quiet.negotiate(&VisitorIdentity::anonymous()).await;
        match quiet.status() {
            PanelStatus::Unavailable {
                message,
                detail,
                retryable,
            } => {
                assert!(!message.contains("stack trace"));
                assert!(detail.is_none());
                assert!(retryable);
            }
            other => panic!("unexpected status: {other:?}"),
        }

        let verbose = SessionNegotiator::new(broker).with_diagnostics(true);
        verbose.negotiate(&VisitorIdentity::anonymous()).await;
        match verbose.status() {
            PanelStatus::Unavailable { detail, .. } => {
                assert!(detail.unwrap().contains("stack trace"))
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_issues_one_request() {
        let broker = Arc::new(MockSessionBroker::new([MockReply::Unreachable]));
        let negotiator = SessionNegotiator::new(broker.clone());
        let visitor = VisitorIdentity::anonymous();

        assert!(matches!(
            negotiator.negotiate(&visitor).await,
            NegotiationOutcome::Failed(BridgeError::BackendUnreachable { .. })
        ));
        assert_eq!(broker.request_count().await, 1);

        assert!(matches!(
            negotiator.retry(&visitor).await,
            NegotiationOutcome::Applied(_)
        ));
        assert_eq!(broker.request_count().await, 2);
    }

    #[tokio::test]
    async fn non_retryable_failure_declines_retry() {
        let broker = Arc::new(MockSessionBroker::new([MockReply::Misconfigured]));
        let negotiator = SessionNegotiator::new(broker.clone());
        let visitor = VisitorIdentity::anonymous();

        assert!(matches!(
            negotiator.negotiate(&visitor).await,
            NegotiationOutcome::Failed(BridgeError::ConfigurationIncomplete(_))
        ));
        assert!(matches!(
            negotiator.status(),
            PanelStatus::Unavailable {
                retryable: false,
                ..
            }
        ));

        assert!(matches!(
            negotiator.retry(&visitor).await,
            NegotiationOutcome::Declined
        ));
        assert_eq!(broker.request_count().await, 1);
        assert!(matches!(
            negotiator.status(),
            PanelStatus::Unavailable { .. }
        ));
    }
}
