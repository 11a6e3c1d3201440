//! Runtime Configuration Builder.
//!
//! [`build_config`] is a pure function of the bridge configuration, the profile snapshot, the
//! resolved theme and the dismiss callback. [`ConfigMemo`] keeps the result referentially
//! stable while `(endpoint base, theme, first name, dismiss identity)` is unchanged, so the
//! embedded runtime is not torn down on unrelated re-renders.

use std::{fmt, str::FromStr, sync::Arc};

use serde::Serialize;
use url::Url;

use crate::config::BridgeConfig;
use crate::profile::ProfileSnapshot;

pub const FALLBACK_TITLE: &str = "Portfolio Assistant";
pub const FALLBACK_GREETING: &str = "Hello! How can I help you today?";

const GRAYSCALE_HUE: u16 = 220;
const GRAYSCALE_TINT: i8 = 1;
const ACCENT_PRIMARY: &str = "#3b82f6";
const ACCENT_LEVEL: u8 = 1;
const RADIUS: &str = "soft";
const DISMISS_ICON: &str = "close";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Resolves the theme from the host's resolved and explicitly selected hints.
    /// Returns `None` while neither hint names a concrete theme (e.g. before hydration).
    pub fn resolve(resolved: Option<&str>, explicit: Option<&str>) -> Option<Theme> {
        let hints = [resolved, explicit];
        let parsed = hints.iter().flatten().filter_map(|hint| hint.parse::<Theme>().ok());
        let mut found = None;
        for theme in parsed {
            if theme == Theme::Dark {
                return Some(Theme::Dark);
            }
            found = Some(theme);
        }
        found
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    fn grayscale_shade(&self) -> i8 {
        match self {
            Theme::Light => -4,
            Theme::Dark => -1,
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

/// Callback bound to the runtime's close action. Equality is identity of the closure.
#[derive(Clone)]
pub struct DismissCallback(Arc<dyn Fn() + Send + Sync>);

impl DismissCallback {
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn invoke(&self) {
        (self.0)()
    }
}

impl PartialEq for DismissCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DismissCallback {}

impl fmt::Debug for DismissCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DismissCallback(..)")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub url: Url,
    pub domain_key: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderConfig {
    pub title: String,
    pub left_action: HeaderAction,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct HeaderAction {
    pub icon: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Palette {
    pub grayscale: Grayscale,
    pub accent: Accent,
    pub radius: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Grayscale {
    pub hue: u16,
    pub tint: i8,
    pub shade: i8,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Accent {
    pub primary: &'static str,
    pub level: u8,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StarterPrompt {
    pub icon: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScreen {
    pub greeting: String,
    pub prompts: Vec<StarterPrompt>,
}

/// Everything the embedded chat runtime is initialized with.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub api: ApiConfig,
    pub theme: Theme,
    pub header: HeaderConfig,
    pub palette: Palette,
    pub start_screen: StartScreen,
    #[serde(skip)]
    pub on_dismiss: DismissCallback,
}

impl RuntimeConfig {
    pub fn endpoint(&self) -> &Url {
        &self.api.url
    }

    pub fn domain_key(&self) -> &str {
        &self.api.domain_key
    }

    pub fn header_title(&self) -> &str {
        &self.header.title
    }

    pub fn greeting(&self) -> &str {
        &self.start_screen.greeting
    }

    /// Invoked by the runtime's close action.
    pub fn dismiss(&self) {
        self.on_dismiss.invoke()
    }
}

fn starter_prompts() -> Vec<StarterPrompt> {
    vec![
        StarterPrompt {
            icon: "suitcase",
            label: "Work",
            prompt: "Tell me about your tech background",
        },
        StarterPrompt {
            icon: "square-code",
            label: "Skills",
            prompt: "What technologies do you specialize in?",
        },
        StarterPrompt {
            icon: "cube",
            label: "Projects",
            prompt: "Show me your top-rated projects",
        },
    ]
}

pub fn build_config(
    bridge: &BridgeConfig,
    profile: Option<&ProfileSnapshot>,
    theme: Theme,
    on_dismiss: DismissCallback,
) -> RuntimeConfig {
    let first_name = profile.and_then(ProfileSnapshot::display_first_name);
    let (title, greeting) = match first_name {
        Some(name) => (
            format!("{name}'s AI Twin"),
            format!("Hello! I'm {name}. How can I help you today?"),
        ),
        None => (FALLBACK_TITLE.to_string(), FALLBACK_GREETING.to_string()),
    };

    RuntimeConfig {
        api: ApiConfig {
            url: bridge.chatkit_endpoint(),
            domain_key: bridge.domain_key().as_str().to_string(),
        },
        theme,
        header: HeaderConfig {
            title,
            left_action: HeaderAction { icon: DISMISS_ICON },
        },
        palette: Palette {
            grayscale: Grayscale {
                hue: GRAYSCALE_HUE,
                tint: GRAYSCALE_TINT,
                shade: theme.grayscale_shade(),
            },
            accent: Accent {
                primary: ACCENT_PRIMARY,
                level: ACCENT_LEVEL,
            },
            radius: RADIUS,
        },
        start_screen: StartScreen {
            greeting,
            prompts: starter_prompts(),
        },
        on_dismiss,
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct ConfigKey {
    endpoint_base: Url,
    domain_key: String,
    theme: Theme,
    first_name: Option<String>,
    on_dismiss: DismissCallback,
}

/// Memoizes [`build_config`] on its minimal input tuple.
#[derive(Debug, Default)]
pub struct ConfigMemo {
    cached: Option<(ConfigKey, Arc<RuntimeConfig>)>,
}

impl ConfigMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached config when the key is unchanged, otherwise builds a new one.
    pub fn get_or_build(
        &mut self,
        bridge: &BridgeConfig,
        profile: Option<&ProfileSnapshot>,
        theme: Theme,
        on_dismiss: &DismissCallback,
    ) -> Arc<RuntimeConfig> {
        let key = ConfigKey {
            endpoint_base: bridge.backend_base().clone(),
            domain_key: bridge.domain_key().as_str().to_string(),
            theme,
            first_name: profile
                .and_then(ProfileSnapshot::display_first_name)
                .map(str::to_string),
            on_dismiss: on_dismiss.clone(),
        };

        if let Some((cached_key, config)) = &self.cached {
            if *cached_key == key {
                return Arc::clone(config);
            }
        }

        let config = Arc::new(build_config(bridge, profile, theme, on_dismiss.clone()));
        self.cached = Some((key, Arc::clone(&config)));
        config
    }

    pub fn current(&self) -> Option<Arc<RuntimeConfig>> {
        self.cached.as_ref().map(|(_, config)| Arc::clone(config))
    }
}
