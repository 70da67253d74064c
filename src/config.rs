//! Operator configuration
//!
//! Defaults, overridden by an optional TOML file, overridden by `RMOD__`
//! environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperatorConfig {
    /// Log filter used when RUST_LOG is unset
    pub log_level: Option<String>,
    /// Requeue interval after a completed pass, in seconds
    pub requeue_interval_secs: u64,
    /// Requeue interval after a transport failure, in seconds
    pub error_requeue_secs: u64,
    /// Deadline for each remote read/write, in seconds
    pub write_timeout_secs: u64,
    /// Admission webhook; not served when unset
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Address the webhook listens on, e.g. "0.0.0.0:8443"
    pub bind_addr: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            requeue_interval_secs: 300,
            error_requeue_secs: 60,
            write_timeout_secs: 5,
            webhook: None,
        }
    }
}

impl OperatorConfig {
    /// Loads configuration, layering an optional file and environment
    /// overrides on top of the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&OperatorConfig::default())?);

        if let Some(path) = path {
            settings = settings.add_source(config::File::with_name(path));
        } else {
            let candidates = ["rmod-config.toml", "config/rmod.toml"];
            for candidate in candidates {
                if std::path::Path::new(candidate).exists() {
                    settings = settings.add_source(config::File::with_name(candidate));
                    break;
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("RMOD")
                .separator("__")
                .try_parsing(true),
        );

        settings.build()?.try_deserialize()
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn error_requeue_interval(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = OperatorConfig::default();
        assert_eq!(config.write_timeout(), Duration::from_secs(5));
        assert_eq!(config.requeue_interval(), Duration::from_secs(300));
        assert_eq!(config.error_requeue_interval(), Duration::from_secs(60));
        assert!(config.webhook.is_none());
    }
}
