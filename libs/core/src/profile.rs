use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Visitor-facing profile fields read from the content repository.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub short_bio: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<u32>,
}

impl ProfileSnapshot {
    pub fn with_first_name(first_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            ..Self::default()
        }
    }

    /// The first name, ignoring blank values.
    pub fn display_first_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn chat_profile(&self) -> anyhow::Result<Option<ProfileSnapshot>>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticProfile(pub Option<ProfileSnapshot>);

#[async_trait]
impl ProfileSource for StaticProfile {
    async fn chat_profile(&self) -> anyhow::Result<Option<ProfileSnapshot>> {
        Ok(self.0.clone())
    }
}
