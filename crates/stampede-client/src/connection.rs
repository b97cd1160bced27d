//! Connection lifecycle
//!
//! ```text
//! Idle -> Connecting -(opened)-> Connected -(close / transport closed)-> Closed
//!            |   ^
//!    timeout |   | inter-attempt delay
//!            v   |
//!          Retrying            (budget spent) -> Failed
//! ```
//!
//! The retry budget covers the initial handshake only. A connection that drops
//! after reaching `Connected` is finished.

use std::sync::Arc;
use std::time::Duration;

use stampede_core::{codec, Dispatch, Dispatcher, Envelope, Inbound, Login, Outbound, TOKEN_QUERY_PARAM};
use stampede_transport::{Transport, TransportEvent, TransportReceiver, TransportSender};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Retrying,
    Failed,
    Closed,
}

impl ConnectionState {
    /// No transition ever leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Retrying => "retrying",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot published after every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub attempts_made: u32,
}

/// Who a simulated client is. Fixed at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    id: u32,
    display_name: String,
    auth_token: Option<String>,
}

impl ClientIdentity {
    pub fn new(id: u32, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            auth_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// `base` with `?token=` appended when a token was issued
    pub fn connect_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
        }
        url
    }
}

/// Static half of the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub per_attempt_timeout: Duration,
    pub inter_attempt_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(10),
            inter_attempt_delay: Duration::from_secs(1),
        }
    }
}

struct Link<T: Transport> {
    sender: T::Sender,
    receiver: T::Receiver,
}

/// One logical connection to the game server.
///
/// `Ctx` is the state inbound handlers act on; it is handed in by the owner on
/// every [`handle_event`](Connection::handle_event) call.
pub struct Connection<T: Transport, Ctx = ()> {
    identity: ClientIdentity,
    policy: RetryPolicy,
    transport: Arc<T>,
    state: ConnectionState,
    attempts_made: u32,
    transitions: Vec<ConnectionState>,
    status: watch::Sender<ConnectionStatus>,
    link: Option<Link<T>>,
    dispatcher: Dispatcher<Ctx>,
}

impl<T: Transport, Ctx> Connection<T, Ctx> {
    pub fn new(identity: ClientIdentity, policy: RetryPolicy, transport: Arc<T>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus {
            state: ConnectionState::Idle,
            attempts_made: 0,
        });

        Self {
            identity,
            policy,
            transport,
            state: ConnectionState::Idle,
            attempts_made: 0,
            transitions: vec![ConnectionState::Idle],
            status,
            link: None,
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Handshake attempts that timed out so far
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Every state entered, starting with `Idle`
    pub fn transitions(&self) -> &[ConnectionState] {
        &self.transitions
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Register the handler for inbound payload `P`
    pub fn on<P, F>(&mut self, handler: F)
    where
        P: Inbound,
        F: Fn(&mut Ctx, P) + Send + Sync + 'static,
    {
        self.dispatcher.register::<P, F>(handler);
    }

    /// Run the handshake until connected or out of budget.
    ///
    /// Each attempt races the transport opening against the per-attempt
    /// timeout; whichever loses is dropped. Returns the resulting state, or
    /// the current state unchanged if the connection has already left `Idle`.
    pub async fn establish(&mut self, base: &Url) -> ConnectionState {
        if self.state != ConnectionState::Idle {
            return self.state;
        }

        let url = self.identity.connect_url(base);
        let id = self.identity.id;

        loop {
            self.transition(ConnectionState::Connecting);

            let attempt = open(self.transport.as_ref(), url.as_str(), id);
            let outcome = timeout(self.policy.per_attempt_timeout, attempt).await;
            match outcome {
                Ok((sender, receiver)) => {
                    self.link = Some(Link { sender, receiver });
                    self.transition(ConnectionState::Connected);
                    info!("Client {} connected", id);

                    let login = Login {
                        client_id: i64::from(id),
                        username: self.identity.display_name.clone(),
                    };
                    self.send(&login);
                    return self.state;
                }
                Err(_) => {
                    self.attempts_made += 1;
                    if self.attempts_made < self.policy.max_attempts {
                        warn!(
                            "Client {} connect timeout. Retry {}/{}",
                            id,
                            self.attempts_made + 1,
                            self.policy.max_attempts
                        );
                        self.transition(ConnectionState::Retrying);
                        sleep(self.policy.inter_attempt_delay).await;
                    } else {
                        error!(
                            "Client {} failed to connect after {} attempts",
                            id, self.policy.max_attempts
                        );
                        self.transition(ConnectionState::Failed);
                        return self.state;
                    }
                }
            }
        }
    }

    /// Fire-and-forget send. Dropped unless connected; never queued.
    pub fn send<P: Outbound>(&self, payload: &P) -> bool {
        if self.state != ConnectionState::Connected {
            trace!("Client {} not connected, dropping '{}'", self.identity.id, P::TAG);
            return false;
        }
        let Some(link) = &self.link else {
            return false;
        };

        let frame = match codec::encode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Client {} could not encode '{}': {}", self.identity.id, P::TAG, e);
                return false;
            }
        };

        match link.sender.send(frame) {
            Ok(()) => true,
            Err(e) => {
                debug!("Client {} dropped '{}': {}", self.identity.id, P::TAG, e);
                false
            }
        }
    }

    /// Next transport notification. Pending forever while there is no link.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.link.as_mut() {
            Some(link) => link
                .receiver
                .recv()
                .await
                .unwrap_or(TransportEvent::Disconnected { reason: None }),
            None => std::future::pending().await,
        }
    }

    /// Apply one transport notification.
    ///
    /// Frames are parsed and dispatched; errors are only logged; a close
    /// notification ends the connection.
    pub fn handle_event(&mut self, event: TransportEvent, ctx: &mut Ctx) -> Option<Dispatch> {
        let id = self.identity.id;
        match event {
            TransportEvent::Data(frame) => match Envelope::from_slice(&frame) {
                Ok(envelope) => Some(self.dispatcher.dispatch(ctx, &envelope)),
                Err(e) => {
                    debug!("Client {} discarding malformed frame: {}", id, e);
                    None
                }
            },
            TransportEvent::Error(e) => {
                warn!("Client {} error: {}", id, e);
                None
            }
            TransportEvent::Disconnected { reason } => {
                info!("Client {} closed: {}", id, reason.as_deref().unwrap_or("no reason"));
                self.link = None;
                if self.state == ConnectionState::Connected {
                    self.transition(ConnectionState::Closed);
                }
                None
            }
        }
    }

    /// Tear down an established connection. Does nothing in any other state.
    pub async fn close(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Some(link) = self.link.take() {
            if let Err(e) = link.sender.close().await {
                debug!("Client {} close error: {}", self.identity.id, e);
            }
        }
        self.transition(ConnectionState::Closed);
        info!("Client {} closed", self.identity.id);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(!self.state.is_terminal(), "transition out of {}", self.state);
        trace!("Client {}: {} -> {}", self.identity.id, self.state, next);
        self.state = next;
        self.transitions.push(next);
        self.status.send_replace(ConnectionStatus {
            state: next,
            attempts_made: self.attempts_made,
        });
    }
}

/// Resolves only when the transport opens. A connect error is logged and the
/// attempt is left to run out its timeout.
async fn open<T: Transport>(transport: &T, url: &str, id: u32) -> (T::Sender, T::Receiver) {
    match transport.connect(url).await {
        Ok(link) => link,
        Err(e) => {
            warn!("Client {} connect error: {}", id, e);
            std::future::pending().await
        }
    }
}

impl<T: Transport, Ctx> std::fmt::Debug for Connection<T, Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("attempts_made", &self.attempts_made)
            .finish()
    }
}
