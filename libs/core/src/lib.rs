//! Chat Session Bridge for the portfolio AI Twin.
//!
//! Negotiates backend chat sessions for a visitor, derives the embedded chat runtime's
//! configuration, and sequences the runtime's mount lifecycle around the client's first paint.
#![forbid(unsafe_code)]

pub mod broker;
pub mod config;
pub mod error;
pub mod identity;
pub mod mount;
pub mod negotiation;
pub mod profile;
pub mod runtime_config;
pub mod session;
pub mod standalone;
pub mod telemetry;

pub use broker::{ReqwestSessionBroker, SessionApi, SharedSessionApi};
pub use config::{BridgeConfig, Deployment, DomainKey};
pub use error::BridgeError;
pub use identity::{IdentitySource, VisitorIdentity};
pub use mount::{MountController, MountState, PanelInputs, PanelView, RenderPass};
pub use negotiation::{NegotiationOutcome, PanelStatus, SessionNegotiator};
pub use profile::{ProfileSnapshot, ProfileSource};
pub use runtime_config::{ConfigMemo, DismissCallback, RuntimeConfig, Theme, build_config};
pub use session::{ChatSession, ClientSecret};
