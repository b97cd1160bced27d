//! Client builder pattern

use std::sync::Arc;
use std::time::Duration;

use stampede_transport::Transport;
use url::Url;

use crate::connection::{ClientIdentity, RetryPolicy};
use crate::error::{ClientError, Result};
use crate::simulator::{ClientHandle, Simulator, SimulatorSettings, MAX_TICK_INTERVAL};

/// Builder for a simulated client
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    url: String,
    id: u32,
    name: String,
    token: Option<String>,
    policy: RetryPolicy,
    settings: SimulatorSettings,
}

impl ClientBuilder {
    /// Client `id` against the server at `url`, named `client_{id}`
    pub fn new(url: &str, id: u32) -> Self {
        Self {
            url: url.to_string(),
            id,
            name: format!("client_{}", id),
            token: None,
            policy: RetryPolicy::default(),
            settings: SimulatorSettings::default(),
        }
    }

    /// Set display name
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set authentication token
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.policy.per_attempt_timeout = timeout;
        self
    }

    pub fn inter_attempt_delay(mut self, delay: Duration) -> Self {
        self.policy.inter_attempt_delay = delay;
        self
    }

    pub fn settings(mut self, settings: SimulatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the move command period
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.settings.send_interval = interval;
        self
    }

    /// Set the motion tick period
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.settings.frame_interval = interval;
        self
    }

    pub fn move_radius(mut self, radius: f32) -> Self {
        self.settings.move_radius = radius;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.seed = Some(seed);
        self
    }

    /// Validate and assemble the simulator without starting it
    pub fn build<T: Transport>(self, transport: Arc<T>) -> Result<(Simulator<T>, Url)> {
        let url = Url::parse(&self.url)?;

        if self.policy.max_attempts == 0 {
            return Err(ClientError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.settings.send_interval.is_zero() || self.settings.frame_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "tick intervals must be non-zero".to_string(),
            ));
        }
        if self.settings.send_interval > MAX_TICK_INTERVAL || self.settings.frame_interval > MAX_TICK_INTERVAL {
            return Err(ClientError::InvalidConfig(format!(
                "tick intervals must not exceed {}s",
                MAX_TICK_INTERVAL.as_secs()
            )));
        }

        let mut identity = ClientIdentity::new(self.id, self.name);
        if let Some(token) = self.token {
            identity = identity.with_token(token);
        }

        let simulator = Simulator::new(identity, self.policy, self.settings, transport);
        Ok((simulator, url))
    }

    /// Build and start the client on its own task.
    ///
    /// Returns as soon as the task is spawned; the handshake runs in the
    /// background.
    pub fn spawn<T: Transport>(self, transport: Arc<T>) -> Result<ClientHandle> {
        let (simulator, url) = self.build(transport)?;
        Ok(simulator.spawn(url))
    }
}
