//! Stampede Core
//!
//! Wire protocol for the Stampede load-testing harness.
//!
//! This crate provides:
//! - The text envelope every message travels in ([`Envelope`])
//! - Payload schemas for each known type tag ([`types`])
//! - A per-tag handler table that decodes and routes envelopes ([`Dispatcher`])
//! - Small vector math used by the simulated actors ([`Vector3f`])

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod types;

pub use codec::{Envelope, Inbound, Outbound, Payload};
pub use dispatch::{Dispatch, Dispatcher};
pub use error::{Error, Result};
pub use types::*;

/// Default game server WebSocket endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:9160/ws";

/// Query parameter carrying the issued auth token on the connect URL
pub const TOKEN_QUERY_PARAM: &str = "token";
