//! Stampede Fleet
//!
//! Spawns and tears down a fleet of simulated clients against one game server.
//!
//! - [`Fleet`]: sequential, throttled spawning and synchronous teardown
//! - [`FleetConfig`]: TOML configuration with defaults for every field
//! - [`AuthClient`]: optional out-of-band token bootstrap over HTTP
//! - [`FleetStatus`] / [`FleetReport`]: what the fleet is doing, and how its clients fare

pub mod auth;
pub mod config;
pub mod error;
pub mod fleet;
pub mod status;

pub use auth::{AuthClient, AuthError, AuthResponse, DEFAULT_REQUEST_TIMEOUT};
pub use config::{AuthConfig, FleetConfig};
pub use error::{FleetError, Result};
pub use fleet::Fleet;
pub use status::{FleetReport, FleetStatus};
