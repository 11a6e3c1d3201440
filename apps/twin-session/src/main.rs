use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use time::format_description::well_known::Rfc3339;
use twin_core::standalone::{self, StandaloneState};
use twin_core::{
    BridgeConfig, ClientSecret, Deployment, DismissCallback, NegotiationOutcome, ProfileSnapshot,
    ReqwestSessionBroker, SessionNegotiator, Theme, VisitorIdentity, build_config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    twin_telemetry::install("twin-session", env!("CARGO_PKG_VERSION"))?;
    match cli.command {
        CliCommand::Create { user_id } => handle_create(user_id).await,
        CliCommand::Config { first_name, theme } => handle_config(first_name, theme),
        CliCommand::Serve { bind, ttl_secs } => handle_serve(bind, ttl_secs).await,
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "twin-session",
    version,
    about = "Chat session bridge tooling for the portfolio AI Twin"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Negotiate a chat session with the configured backend
    Create {
        /// Authenticated visitor id; omitted means anonymous.
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Print the chat runtime configuration as JSON
    Config {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long, value_enum, default_value_t = ThemeArg::Light)]
        theme: ThemeArg,
    },
    /// Run the local development session backend
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
        /// Lifetime of issued sessions.
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

async fn handle_create(user_id: Option<String>) -> Result<()> {
    let config = BridgeConfig::from_env()?;
    let broker = ReqwestSessionBroker::new(&config)?;
    let negotiator = SessionNegotiator::new(Arc::new(broker))
        .with_diagnostics(config.deployment() == Deployment::Development);
    let visitor = VisitorIdentity::from_user_id(user_id.as_deref());

    match negotiator.negotiate(&visitor).await {
        NegotiationOutcome::Applied(session) => {
            let expires = session
                .expires_at
                .format(&Rfc3339)
                .context("formatting session expiry")?;
            println!("session_id: {}", session.session_id);
            println!("client_secret: {}", secret_summary(&session.client_secret));
            println!("expires_at: {expires}");
            Ok(())
        }
        NegotiationOutcome::Failed(err) => {
            tracing::debug!(error = %err.diagnostic(), "session negotiation failed");
            let message = err.user_message();
            Err(anyhow::Error::new(err).context(message))
        }
        NegotiationOutcome::Superseded => Err(anyhow!("session negotiation was superseded")),
        NegotiationOutcome::Declined => Err(anyhow!("session negotiation was not retried")),
    }
}

/// The credential only travels to the chat runtime; the CLI reports whether one was issued.
fn secret_summary(secret: &ClientSecret) -> &'static str {
    if secret.is_empty() { "missing" } else { "present" }
}

fn handle_config(first_name: Option<String>, theme: ThemeArg) -> Result<()> {
    let config = BridgeConfig::from_env()?;
    let profile = first_name.map(ProfileSnapshot::with_first_name);
    let runtime = build_config(
        &config,
        profile.as_ref(),
        theme.into(),
        DismissCallback::noop(),
    );
    println!("{}", serde_json::to_string_pretty(&runtime)?);
    Ok(())
}

async fn handle_serve(bind: SocketAddr, ttl_secs: i64) -> Result<()> {
    if ttl_secs <= 0 {
        return Err(anyhow!("--ttl-secs must be positive"));
    }
    let state = StandaloneState::new(
        Arc::new(twin_core::session::MemorySessionStore::new()),
        time::Duration::seconds(ttl_secs),
    );
    standalone::serve(bind, Arc::new(state)).await
}
