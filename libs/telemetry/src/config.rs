use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub json_logs: bool,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str, default_service_version: &str) -> Self {
        Self::from_lookup(default_service_name, default_service_version, |key| {
            env::var(key).ok()
        })
    }

    pub fn from_lookup<F>(
        default_service_name: &str,
        default_service_version: &str,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name =
            lookup("OTEL_SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string());
        let environment = lookup("DEPLOYMENT_ENV").unwrap_or_else(|| "dev".into());
        let json_logs = lookup("LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(true);

        Self {
            service_name,
            service_version: default_service_version.to_string(),
            environment,
            json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_json_logs_in_dev() {
        let cfg = TelemetryConfig::from_lookup("twin-session", "0.1.0", |_| None);
        assert_eq!(cfg.service_name, "twin-session");
        assert_eq!(cfg.environment, "dev");
        assert!(cfg.json_logs);
    }

    #[test]
    fn text_format_disables_json() {
        let cfg = TelemetryConfig::from_lookup("svc", "1", |key| match key {
            "LOG_FORMAT" => Some("Pretty".into()),
            "DEPLOYMENT_ENV" => Some("production".into()),
            "OTEL_SERVICE_NAME" => Some("portfolio-chat".into()),
            _ => None,
        });
        assert!(!cfg.json_logs);
        assert_eq!(cfg.environment, "production");
        assert_eq!(cfg.service_name, "portfolio-chat");
    }
}
