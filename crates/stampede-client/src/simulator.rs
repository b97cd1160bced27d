//! Simulated player
//!
//! A [`Simulator`] owns one [`Connection`] and the [`Avatar`] its handlers act
//! on. It runs as a single task: the handshake first, then a loop that
//! multiplexes shutdown, inbound frames, the command tick and the motion tick.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stampede_core::{LoginResponse, MoveApproved, MoveRequest, PositionCorrection, RegisterResponse, Vector3f};
use stampede_transport::{Transport, TransportEvent};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use crate::connection::{ClientIdentity, Connection, ConnectionState, ConnectionStatus, RetryPolicy};

/// Corrections closer than this (squared units) are treated as confirmations
pub const SNAP_THRESHOLD_SQ: f32 = 0.05;

/// Interpolation stops once this close to the target
pub const ARRIVAL_EPSILON: f32 = 0.01;

/// Strictly greater-than: a squared distance equal to the threshold never snaps
pub fn exceeds_snap_threshold(distance_sq: f32) -> bool {
    distance_sq > SNAP_THRESHOLD_SQ
}

/// Local view of the simulated actor
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    client_id: u32,
    position: Vector3f,
    target: Vector3f,
    speed: f32,
    moving: bool,
}

impl Avatar {
    pub fn new(client_id: u32, position: Vector3f) -> Self {
        Self {
            client_id,
            position,
            target: position,
            speed: 0.0,
            moving: false,
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn position(&self) -> Vector3f {
        self.position
    }

    /// Last approved target
    pub fn target(&self) -> Vector3f {
        self.target
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn apply_move_approved(&mut self, approved: &MoveApproved) {
        self.target = approved.target;
        self.speed = approved.speed;
        self.moving = true;
        debug!(
            "Client {} move approved to {} at {}",
            self.client_id, approved.target, approved.speed
        );
    }

    /// Reconcile against the server position. Returns whether it snapped.
    ///
    /// The approved target and the interpolation flag are left alone.
    pub fn apply_correction(&mut self, server: Vector3f) -> bool {
        let drift = self.position.distance_squared(server);
        if !exceeds_snap_threshold(drift) {
            return false;
        }
        debug!(
            "Client {} snapped from {} to {} (drift {:.4})",
            self.client_id, self.position, server, drift
        );
        self.position = server;
        true
    }

    /// One motion step of `dt`
    pub fn advance(&mut self, dt: Duration) {
        if !self.moving {
            return;
        }
        let step = self.speed * dt.as_secs_f32();
        self.position = self.position.move_towards(self.target, step);
        if self.position.distance(self.target) < ARRIVAL_EPSILON {
            self.moving = false;
        }
    }
}

/// Longest accepted command or motion period
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing and randomness for one simulator
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorSettings {
    pub send_interval: Duration,
    pub frame_interval: Duration,
    pub move_radius: f32,
    /// Base seed; each client uses `seed + id`
    pub seed: Option<u64>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(3),
            frame_interval: Duration::from_millis(50),
            move_radius: 10.0,
            seed: None,
        }
    }
}

pub struct Simulator<T: Transport> {
    connection: Connection<T, Avatar>,
    avatar: Avatar,
    settings: SimulatorSettings,
    rng: StdRng,
}

impl<T: Transport> Simulator<T> {
    pub fn new(
        identity: ClientIdentity,
        policy: RetryPolicy,
        settings: SimulatorSettings,
        transport: Arc<T>,
    ) -> Self {
        let id = identity.id();
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(id))),
            None => StdRng::from_entropy(),
        };
        let start = random_in_sphere(&mut rng, Vector3f::ZERO, settings.move_radius);

        let mut connection = Connection::<T, Avatar>::new(identity, policy, transport);
        connection.on::<MoveApproved, _>(|avatar, msg| avatar.apply_move_approved(&msg));
        connection.on::<PositionCorrection, _>(|avatar, msg| {
            avatar.apply_correction(msg.position);
        });
        connection.on::<RegisterResponse, _>(|avatar, msg| {
            if msg.success {
                info!("Client {} registered", avatar.client_id());
            } else {
                warn!(
                    "Client {} register failed: {}",
                    avatar.client_id(),
                    server_message(&msg.message)
                );
            }
        });
        connection.on::<LoginResponse, _>(|avatar, msg| {
            if msg.success {
                info!("Client {} logged in", avatar.client_id());
            } else {
                warn!(
                    "Client {} login failed: {}",
                    avatar.client_id(),
                    server_message(&msg.message)
                );
            }
        });

        Self {
            connection,
            avatar: Avatar::new(id, start),
            settings,
            rng,
        }
    }

    pub fn connection(&self) -> &Connection<T, Avatar> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection<T, Avatar> {
        &mut self.connection
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    /// Request a move to a random point around the current position.
    ///
    /// A no-op unless connected; the random source is not advanced either.
    pub fn send_move(&mut self) -> bool {
        if !self.connection.is_connected() {
            return false;
        }
        let target = random_in_sphere(&mut self.rng, self.avatar.position, self.settings.move_radius);
        self.connection.send(&MoveRequest { target })
    }

    /// Hand one transport event to the connection with the avatar as context
    pub fn handle_event(&mut self, event: TransportEvent) {
        self.connection.handle_event(event, &mut self.avatar);
    }

    /// Drive the client until shutdown or a terminal state
    pub async fn run(mut self, url: Url, mut shutdown: oneshot::Receiver<()>) {
        let id = self.connection.identity().id();

        let state = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Client {} shut down during handshake", id);
                return;
            }
            state = self.connection.establish(&url) => state,
        };
        if state.is_terminal() {
            return;
        }

        let send_interval = self.settings.send_interval.min(MAX_TICK_INTERVAL);
        let frame_interval = self.settings.frame_interval.min(MAX_TICK_INTERVAL);
        let start = Instant::now();
        let mut commands = interval_at(start + send_interval, send_interval);
        commands.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames = interval_at(start + frame_interval, frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = start;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.connection.close().await;
                    return;
                }
                event = self.connection.next_event() => {
                    self.connection.handle_event(event, &mut self.avatar);
                    if self.connection.state().is_terminal() {
                        return;
                    }
                }
                _ = commands.tick() => {
                    self.send_move();
                }
                now = frames.tick() => {
                    self.avatar.advance(now - last_frame);
                    last_frame = now;
                }
            }
        }
    }

    /// Move onto its own task
    pub fn spawn(self, url: Url) -> ClientHandle {
        let identity = self.connection.identity().clone();
        let status = self.connection.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(url, shutdown_rx));

        ClientHandle {
            id: identity.id(),
            name: identity.display_name().to_string(),
            status,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Owner's side of a spawned simulator. Dropping it shuts the client down.
#[derive(Debug)]
pub struct ClientHandle {
    id: u32,
    name: String,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest published status; still readable after the task ends
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Signal shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn server_message(message: &str) -> &str {
    if message.is_empty() {
        "unknown error"
    } else {
        message
    }
}

/// Uniform point inside the sphere of `radius` around `center`
fn random_in_sphere<R: Rng>(rng: &mut R, center: Vector3f, radius: f32) -> Vector3f {
    loop {
        let p = Vector3f::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if p.length_squared() <= 1.0 {
            return center + p * radius;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_boundary() {
        assert!(!exceeds_snap_threshold(0.05));
        assert!(exceeds_snap_threshold(0.050_000_1));
        assert!(!exceeds_snap_threshold(0.0));
    }

    #[test]
    fn test_correction_within_threshold_is_ignored() {
        let mut avatar = Avatar::new(0, Vector3f::new(1.0, 0.0, 0.0));
        assert!(!avatar.apply_correction(Vector3f::new(1.1, 0.0, 0.0)));
        assert_eq!(avatar.position(), Vector3f::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_correction_snaps_and_keeps_target() {
        // Scenario: approved (5,0,0) at speed 2, corrected to origin at (4.9,0,0)
        let mut avatar = Avatar::new(0, Vector3f::new(4.9, 0.0, 0.0));
        avatar.apply_move_approved(&MoveApproved {
            target: Vector3f::new(5.0, 0.0, 0.0),
            speed: 2.0,
        });

        assert!(avatar.apply_correction(Vector3f::ZERO));
        assert_eq!(avatar.position(), Vector3f::ZERO);
        assert_eq!(avatar.target(), Vector3f::new(5.0, 0.0, 0.0));
        assert!(avatar.is_moving());

        avatar.advance(Duration::from_millis(500));
        assert!((avatar.position().x - 1.0).abs() < 1e-5);
        assert!(avatar.is_moving());
    }

    #[test]
    fn test_advance_stops_at_target() {
        let mut avatar = Avatar::new(0, Vector3f::new(4.9, 0.0, 0.0));
        avatar.apply_move_approved(&MoveApproved {
            target: Vector3f::new(5.0, 0.0, 0.0),
            speed: 2.0,
        });

        avatar.advance(Duration::from_secs(1));
        assert_eq!(avatar.position(), Vector3f::new(5.0, 0.0, 0.0));
        assert!(!avatar.is_moving());

        // Idle avatars stay put
        avatar.advance(Duration::from_secs(1));
        assert_eq!(avatar.position(), Vector3f::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_random_in_sphere_stays_inside() {
        let mut rng = StdRng::seed_from_u64(42);
        let center = Vector3f::new(3.0, -2.0, 1.0);
        for _ in 0..1000 {
            let p = random_in_sphere(&mut rng, center, 10.0);
            assert!(p.distance(center) <= 10.0 + 1e-4);
        }
    }

    #[test]
    fn test_server_message_fallback() {
        assert_eq!(server_message(""), "unknown error");
        assert_eq!(server_message("taken"), "taken");
    }
}
