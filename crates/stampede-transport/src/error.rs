//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("send queue full")]
    QueueFull,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("not connected")]
    NotConnected,
}

#[cfg(feature = "websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::Url(e) => TransportError::InvalidUrl(e.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::ConnectionClosed,
            other => TransportError::ConnectionFailed(other.to_string()),
        }
    }
}
