use async_trait::async_trait;

pub const ANONYMOUS_VISITOR: &str = "anonymous";

/// The visitor a session is negotiated for: an authenticated id or the anonymous marker.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct VisitorIdentity {
    id: String,
}

impl VisitorIdentity {
    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_VISITOR.to_string(),
        }
    }

    /// Missing or blank user ids map to the anonymous marker.
    pub fn from_user_id(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self { id: id.to_string() },
            None => Self::anonymous(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_VISITOR
    }
}

impl Default for VisitorIdentity {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Supplies the identity of the current visitor (the authentication provider).
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn current_identity(&self) -> VisitorIdentity;
}

#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(pub VisitorIdentity);

#[async_trait]
impl IdentitySource for StaticIdentity {
    async fn current_identity(&self) -> VisitorIdentity {
        self.0.clone()
    }
}
