use tracing::info_span;

use crate::identity::VisitorIdentity;
use crate::mount::MountState;

/// Span for a session negotiation. Carries only whether the visitor is anonymous.
pub fn span_for_negotiation(action: &'static str, identity: &VisitorIdentity) -> tracing::Span {
    info_span!(
        "twin.session",
        action,
        anonymous = identity.is_anonymous()
    )
}

pub fn span_for_panel(action: &'static str, state: MountState) -> tracing::Span {
    info_span!("twin.panel", action, state = state.as_str())
}
