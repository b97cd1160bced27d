//! Transport trait definitions

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Notifications delivered by an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Frame received
    Data(Bytes),
    /// Error reported by the transport; does not by itself close it
    Error(String),
    /// Connection closed (clean or error)
    Disconnected { reason: Option<String> },
}

/// Trait for sending frames.
///
/// `send` never waits: a frame that cannot be queued right now is rejected.
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Queue a text frame
    fn send(&self, frame: String) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Trait for receiving events
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next event, `None` once the transport is gone
    async fn recv(&mut self) -> Option<TransportEvent>;
}

/// Main transport trait
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The sender type for this transport
    type Sender: TransportSender + 'static;
    /// The receiver type for this transport
    type Receiver: TransportReceiver + 'static;

    /// Open a connection. Resolving `Ok` is the "opened" signal.
    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver)>;
}
