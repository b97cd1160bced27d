//! Fleet orchestrator
//!
//! The tracked client set is only ever touched by `start` and `stop`, both of
//! which take `&mut self`. Clients report back through their own status
//! channels and never mutate the set.

use std::sync::Arc;
use std::time::Duration;

use stampede_client::ClientHandle;
use stampede_transport::Transport;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::AuthClient;
use crate::config::{AuthConfig, FleetConfig};
use crate::error::Result;
use crate::status::{FleetReport, FleetStatus};

pub struct Fleet<T: Transport> {
    transport: Arc<T>,
    clients: Vec<ClientHandle>,
    running: bool,
    status: watch::Sender<FleetStatus>,
}

impl<T: Transport> Fleet<T> {
    pub fn new(transport: Arc<T>) -> Self {
        let (status, _) = watch::channel(FleetStatus::Waiting);
        Self {
            transport,
            clients: Vec::new(),
            running: false,
            status,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Tracked clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clients(&self) -> &[ClientHandle] {
        &self.clients
    }

    pub fn status(&self) -> FleetStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FleetStatus> {
        self.status.subscribe()
    }

    pub fn report(&self) -> FleetReport {
        FleetReport::from_statuses(self.clients.iter().map(ClientHandle::status))
    }

    /// Spawn `count` clients, `spawn_delay` apart. A no-op while running.
    ///
    /// Returns once every client is spawned; no connection outcome is awaited.
    /// If this future is dropped part way, the fleet stays running with the
    /// clients spawned so far, and `stop` tears them down.
    pub async fn start(&mut self, count: u32, spawn_delay: Duration, config: &FleetConfig) -> Result<()> {
        if self.running {
            debug!("Fleet already running, ignoring start");
            return Ok(());
        }
        config.validate()?;

        self.running = true;
        self.publish(FleetStatus::Creating);
        self.clients.clear();
        info!("Creating {} clients against {}", count, config.server_url);

        if let Err(e) = self.spawn_all(count, spawn_delay, config).await {
            self.stop();
            return Err(e);
        }

        self.publish(FleetStatus::Running);
        info!("All {} clients spawned", count);
        Ok(())
    }

    /// `start` with the configured count and delay
    pub async fn run_with_config(&mut self, config: &FleetConfig) -> Result<()> {
        let spawn_delay = config.spawn_delay()?;
        self.start(config.client_count, spawn_delay, config).await
    }

    /// Shut down every tracked client and forget them. A no-op when stopped.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.publish(FleetStatus::Stopping);
        info!("Stopping {} clients", self.clients.len());

        for client in &mut self.clients {
            client.shutdown();
        }
        self.clients.clear();

        self.running = false;
        self.publish(FleetStatus::Waiting);
    }

    async fn spawn_all(&mut self, count: u32, spawn_delay: Duration, config: &FleetConfig) -> Result<()> {
        let auth = match &config.auth {
            Some(auth) => Some((AuthClient::new(&auth.base_url, auth.timeout())?, auth)),
            None => None,
        };

        for id in 0..count {
            let mut builder = config.client_builder(id)?;
            if let Some((client, auth)) = &auth {
                let username = config.display_name(id);
                if let Some(token) = bootstrap_token(client, auth, &username).await {
                    builder = builder.token(&token);
                }
            }

            let handle = builder.spawn(self.transport.clone())?;
            debug!("Spawned client {}", id);
            self.clients.push(handle);

            if id + 1 < count {
                tokio::time::sleep(spawn_delay).await;
            }
        }
        Ok(())
    }

    fn publish(&self, status: FleetStatus) {
        self.status.send_replace(status);
        info!("Fleet status: {}", status);
    }
}

impl<T: Transport> Drop for Fleet<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Register (optionally) and log in. Failures leave the client without a token.
async fn bootstrap_token(client: &AuthClient, auth: &AuthConfig, username: &str) -> Option<String> {
    if auth.register {
        if let Err(e) = client.register(username, &auth.password).await {
            warn!("Register failed for {}: {}", username, e);
        }
    }

    match client.login(username, &auth.password).await {
        Ok(token) => Some(token),
        Err(e) => {
            warn!("Login failed for {}: {}, connecting without token", username, e);
            None
        }
    }
}
