//! Fleet configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use stampede_client::{ClientBuilder, RetryPolicy, SimulatorSettings, MAX_TICK_INTERVAL};
use stampede_core::DEFAULT_SERVER_URL;
use tracing::info;
use url::Url;

use crate::auth::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{FleetError, Result};

/// Run parameters. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server_url: String,
    pub client_count: u32,
    pub spawn_delay_seconds: f64,
    pub send_interval_seconds: f64,
    /// Handshake attempts per client, including the first
    pub max_retries: u32,
    pub per_attempt_timeout_seconds: u64,
    pub inter_attempt_delay_seconds: f64,
    pub username_prefix: String,
    pub move_radius: f32,
    pub frame_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

/// Token bootstrap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HTTP base, e.g. `http://127.0.0.1:9160`
    pub base_url: String,
    pub password: String,
    /// Register each user before logging in
    #[serde(default)]
    pub register: bool,
    /// Limit for each register or login request
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
}

fn default_auth_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_count: 100,
            spawn_delay_seconds: 0.05,
            send_interval_seconds: 3.0,
            max_retries: 3,
            per_attempt_timeout_seconds: 10,
            inter_attempt_delay_seconds: 1.0,
            username_prefix: "client_".to_string(),
            move_radius: 10.0,
            frame_interval_ms: 50,
            seed: None,
            auth: None,
        }
    }
}

impl FleetConfig {
    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| FleetError::Config(format!("server_url: {}", e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(FleetError::Config(format!(
                "server_url must be ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        if self.max_retries == 0 {
            return Err(FleetError::Config("max_retries must be at least 1".into()));
        }
        if self.per_attempt_timeout_seconds == 0 {
            return Err(FleetError::Config(
                "per_attempt_timeout_seconds must be at least 1".into(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(FleetError::Config("frame_interval_ms must be non-zero".into()));
        }

        seconds("spawn_delay_seconds", self.spawn_delay_seconds)?;
        seconds("inter_attempt_delay_seconds", self.inter_attempt_delay_seconds)?;
        let send_interval = seconds("send_interval_seconds", self.send_interval_seconds)?;
        if send_interval.is_zero() {
            return Err(FleetError::Config("send_interval_seconds must be non-zero".into()));
        }
        if send_interval > MAX_TICK_INTERVAL {
            return Err(FleetError::Config(format!(
                "send_interval_seconds must not exceed {}",
                MAX_TICK_INTERVAL.as_secs()
            )));
        }
        if Duration::from_millis(self.frame_interval_ms) > MAX_TICK_INTERVAL {
            return Err(FleetError::Config(format!(
                "frame_interval_ms must not exceed {}",
                MAX_TICK_INTERVAL.as_millis()
            )));
        }

        if !self.move_radius.is_finite() || self.move_radius <= 0.0 {
            return Err(FleetError::Config("move_radius must be positive".into()));
        }

        if let Some(auth) = &self.auth {
            Url::parse(&auth.base_url)
                .map_err(|e| FleetError::Config(format!("auth.base_url: {}", e)))?;
            if auth.timeout_secs == 0 {
                return Err(FleetError::Config("auth.timeout_secs must be at least 1".into()));
            }
        }

        Ok(())
    }

    pub fn spawn_delay(&self) -> Result<Duration> {
        seconds("spawn_delay_seconds", self.spawn_delay_seconds)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy {
            max_attempts: self.max_retries,
            per_attempt_timeout: Duration::from_secs(self.per_attempt_timeout_seconds),
            inter_attempt_delay: seconds("inter_attempt_delay_seconds", self.inter_attempt_delay_seconds)?,
        })
    }

    pub fn simulator_settings(&self) -> Result<SimulatorSettings> {
        Ok(SimulatorSettings {
            send_interval: seconds("send_interval_seconds", self.send_interval_seconds)?,
            frame_interval: Duration::from_millis(self.frame_interval_ms),
            move_radius: self.move_radius,
            seed: self.seed,
        })
    }

    pub fn display_name(&self, id: u32) -> String {
        format!("{}{}", self.username_prefix, id)
    }

    /// Builder for client `id`, without a token
    pub fn client_builder(&self, id: u32) -> Result<ClientBuilder> {
        Ok(ClientBuilder::new(&self.server_url, id)
            .name(&self.display_name(id))
            .retry_policy(self.retry_policy()?)
            .settings(self.simulator_settings()?))
    }
}

/// Non-negative, finite and representable as a `Duration`
fn seconds(field: &str, value: f64) -> Result<Duration> {
    if value < 0.0 {
        return Err(FleetError::Config(format!(
            "{} must be a non-negative number of seconds, got {}",
            field, value
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| FleetError::Config(format!("{} is out of range: {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FleetConfig::default();
        assert_eq!(config.server_url, "ws://127.0.0.1:9160/ws");
        assert_eq!(config.client_count, 100);
        assert_eq!(config.spawn_delay().unwrap(), Duration::from_millis(50));
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
        assert_eq!(config.simulator_settings().unwrap(), SimulatorSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_display_name() {
        let config = FleetConfig {
            username_prefix: "bot-".to_string(),
            ..Default::default()
        };
        assert_eq!(config.display_name(12), "bot-12");
    }

    #[test]
    fn test_rejects_zero_retries() {
        let config = FleetConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FleetError::Config(_))));
    }

    #[test]
    fn test_rejects_http_scheme() {
        let config = FleetConfig {
            server_url: "http://127.0.0.1:9160/ws".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FleetError::Config(_))));
    }

    #[test]
    fn test_rejects_negative_delay() {
        let config = FleetConfig {
            spawn_delay_seconds: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FleetConfig {
            inter_attempt_delay_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_seconds() {
        let config = FleetConfig {
            inter_attempt_delay_seconds: 1e300,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FleetError::Config(_))));
        assert!(config.retry_policy().is_err());

        let config = FleetConfig {
            spawn_delay_seconds: 1e300,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FleetError::Config(_))));
        assert!(config.spawn_delay().is_err());
    }

    #[test]
    fn test_rejects_oversized_intervals() {
        let config = FleetConfig {
            send_interval_seconds: 1e19,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FleetError::Config(_))));

        let config = FleetConfig {
            frame_interval_ms: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FleetError::Config(_))));

        let config = FleetConfig {
            send_interval_seconds: MAX_TICK_INTERVAL.as_secs_f64(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
