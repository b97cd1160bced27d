//! Common test helpers and utilities for Stampede tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps), paused-clock friendly
//! - A scripted in-memory transport whose handshake outcome is chosen per attempt
//! - A minimal WebSocket game server for end-to-end runs

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use stampede_core::{codec, tag, Envelope, Login, LoginResponse, MoveApproved, MoveRequest, Payload};
use stampede_transport::{
    Result as TransportResult, Transport, TransportError, TransportEvent, TransportReceiver,
    TransportSender,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based.
///
/// Measured on the Tokio clock so it also works under `start_paused`.
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    check().await
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

// ============================================================================
// Scripted Transport
// ============================================================================

/// Outcome of one handshake attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// Open immediately
    Open,
    /// Open after a delay
    OpenAfter(Duration),
    /// Fail right away with this message
    Refuse(String),
    /// Never resolve
    Hang,
}

/// In-memory transport. Each `connect` consumes the next scripted [`Attempt`],
/// or the fallback once the script runs out.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Attempt>>,
    fallback: Attempt,
    attempt_times: Mutex<Vec<Instant>>,
    urls: Mutex<Vec<String>>,
    peers: Mutex<Vec<MockPeer>>,
}

impl ScriptedTransport {
    /// Every attempt has the same outcome
    pub fn always(attempt: Attempt) -> Self {
        Self::scripted(Vec::new(), attempt)
    }

    pub fn scripted(script: Vec<Attempt>, fallback: Attempt) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            attempt_times: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
        }
    }

    /// Number of `connect` calls so far
    pub fn attempts(&self) -> usize {
        self.attempt_times.lock().len()
    }

    /// When each `connect` call started
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempt_times.lock().clone()
    }

    /// URLs passed to `connect`, in order
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Server-side handles of every opened connection
    pub fn peers(&self) -> Vec<MockPeer> {
        self.peers.lock().clone()
    }

    pub fn peer(&self, index: usize) -> Option<MockPeer> {
        self.peers.lock().get(index).cloned()
    }

    fn open(&self, url: &str) -> (MockSender, MockReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = MockPeer {
            url: url.to_string(),
            events: tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let sender = MockSender {
            sent: peer.sent.clone(),
            connected: peer.connected.clone(),
            closed: peer.closed.clone(),
        };
        self.peers.lock().push(peer);
        (sender, MockReceiver { rx })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Sender = MockSender;
    type Receiver = MockReceiver;

    async fn connect(&self, url: &str) -> TransportResult<(MockSender, MockReceiver)> {
        self.attempt_times.lock().push(Instant::now());
        self.urls.lock().push(url.to_string());
        let attempt = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match attempt {
            Attempt::Open => Ok(self.open(url)),
            Attempt::OpenAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.open(url))
            }
            Attempt::Refuse(reason) => Err(TransportError::ConnectionFailed(reason)),
            Attempt::Hang => std::future::pending().await,
        }
    }
}

/// Test-side view of one opened mock connection
#[derive(Clone)]
pub struct MockPeer {
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Inject a raw transport event
    pub fn push(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Deliver an encoded payload as an inbound frame
    pub fn deliver<P: Payload>(&self, payload: &P) {
        let frame = codec::encode(payload).unwrap();
        self.push(TransportEvent::Data(Bytes::from(frame)));
    }

    /// Deliver arbitrary wire text
    pub fn deliver_raw(&self, frame: &str) {
        self.push(TransportEvent::Data(Bytes::from(frame.to_string())));
    }

    /// Simulate the server closing the connection
    pub fn disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.push(TransportEvent::Disconnected {
            reason: Some(reason.to_string()),
        });
    }

    /// Frames the client sent, in order
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .map(|frame| Envelope::from_slice(frame.as_bytes()).unwrap())
            .collect()
    }

    /// Whether the client closed its side
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockSender {
    sent: Arc<Mutex<Vec<String>>>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl TransportSender for MockSender {
    fn send(&self, frame: String) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(frame);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockReceiver {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for MockReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

// ============================================================================
// Test Server - RAII wrapper with proper cleanup
// ============================================================================

#[derive(Default)]
struct ServerStats {
    connections: AtomicU32,
    logins: AtomicU32,
    move_requests: AtomicU32,
    tokens: Mutex<Vec<Option<String>>>,
}

/// Minimal game server: answers `login` with `loginResponse` and approves every
/// `moveRequest` at [`TestServer::SPEED`].
pub struct TestServer {
    port: u16,
    stats: Arc<ServerStats>,
    kick: broadcast::Sender<()>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub const SPEED: f32 = 4.0;

    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let stats = Arc::new(ServerStats::default());
        let (kick, _) = broadcast::channel(4);

        let accept_stats = stats.clone();
        let accept_kick = kick.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, accept_stats.clone(), accept_kick.subscribe()));
            }
        });

        Self {
            port,
            stats,
            kick,
            handle: Some(handle),
        }
    }

    /// WebSocket URL for this server
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Completed WebSocket handshakes
    pub fn connections(&self) -> u32 {
        self.stats.connections.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> u32 {
        self.stats.logins.load(Ordering::SeqCst)
    }

    pub fn move_requests(&self) -> u32 {
        self.stats.move_requests.load(Ordering::SeqCst)
    }

    /// `token` query parameter of each handshake, in order
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.stats.tokens.lock().clone()
    }

    /// Close every open connection from the server side
    pub fn kick_all(&self) {
        let _ = self.kick.send(());
    }

    pub async fn wait_for_logins(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.stats.logins, n, max_wait).await
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(stream: TcpStream, stats: Arc<ServerStats>, mut kick: broadcast::Receiver<()>) {
    let tokens = stats.clone();
    let callback = move |req: &Request, resp: Response| {
        let token = req.uri().query().and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("token="))
                .map(str::to_string)
        });
        tokens.tokens.lock().push(token);
        Ok::<_, ErrorResponse>(resp)
    };

    let mut ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!("Test server handshake failed: {}", e);
            return;
        }
    };
    stats.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            _ = kick.recv() => {
                let _ = ws.close(None).await;
                break;
            }
            msg = ws.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(_)) => continue,
                    _ => break,
                };
                let Ok(envelope) = Envelope::from_slice(text.as_bytes()) else {
                    continue;
                };

                let reply = match envelope.tag.as_str() {
                    tag::LOGIN => envelope.decode::<Login>().ok().map(|_| {
                        stats.logins.fetch_add(1, Ordering::SeqCst);
                        codec::encode(&LoginResponse {
                            success: true,
                            message: String::new(),
                            token: None,
                        })
                    }),
                    tag::MOVE_REQUEST => envelope.decode::<MoveRequest>().ok().map(|request| {
                        stats.move_requests.fetch_add(1, Ordering::SeqCst);
                        codec::encode(&MoveApproved {
                            target: request.target,
                            speed: TestServer::SPEED,
                        })
                    }),
                    _ => None,
                };

                if let Some(Ok(frame)) = reply {
                    if ws.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
