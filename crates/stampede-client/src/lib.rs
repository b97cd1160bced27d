//! Stampede Client Library
//!
//! One simulated player: a [`Connection`] that runs the initial handshake under
//! a retry budget, and a [`Simulator`] that drives movement commands through it
//! while reconciling against server-authoritative positions.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stampede_client::ClientBuilder;
//! use stampede_transport::WebSocketTransport;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(WebSocketTransport::new());
//!     let mut client = ClientBuilder::new("ws://127.0.0.1:9160/ws", 0)
//!         .token("eyJhbGciOi...")
//!         .spawn(transport)?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     println!("{}", client.status().state);
//!     client.shutdown();
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod connection;
pub mod error;
pub mod simulator;

pub use builder::ClientBuilder;
pub use connection::{ClientIdentity, Connection, ConnectionState, ConnectionStatus, RetryPolicy};
pub use error::{ClientError, Result};
pub use simulator::{Avatar, ClientHandle, Simulator, SimulatorSettings, MAX_TICK_INTERVAL};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::connection::{ConnectionState, ConnectionStatus, RetryPolicy};
    pub use crate::error::{ClientError, Result};
    pub use crate::simulator::ClientHandle;
    pub use stampede_core::{MoveApproved, PositionCorrection, Vector3f};
}
