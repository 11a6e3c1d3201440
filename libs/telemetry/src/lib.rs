//! Logging setup shared by the AI Twin binaries.

mod config;
mod tracing_init;

pub use config::TelemetryConfig;
pub use tracing_init::init_telemetry;

/// Installs the subscriber configured from the process environment.
pub fn install(service_name: &str, service_version: &str) -> anyhow::Result<()> {
    init_telemetry(TelemetryConfig::from_env(service_name, service_version))
}
