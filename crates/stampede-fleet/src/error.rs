//! Fleet error types

use thiserror::Error;

use crate::auth::AuthError;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config render error: {0}")]
    TomlRender(#[from] toml::ser::Error),

    #[error("client error: {0}")]
    Client(#[from] stampede_client::ClientError),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
}
