//! Stampede Transport Layer
//!
//! The capability interface a simulated client talks through, plus the
//! WebSocket implementation used against real game servers.
//!
//! A transport is "opened" when [`Transport::connect`] resolves. After that
//! the receiver yields data, error and close notifications in order.

pub mod error;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketTransport};
