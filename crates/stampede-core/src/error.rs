//! Error types for the Stampede codec

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Codec error types
#[derive(Error, Debug)]
pub enum Error {
    /// Payload could not be serialized
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Payload or envelope could not be parsed
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Envelope data field is not valid base64
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// Payload requested under a schema its tag does not designate
    #[error("tag mismatch: expected {expected}, got {actual}")]
    TagMismatch {
        expected: &'static str,
        actual: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DecodeError(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::InvalidBase64(e.to_string())
    }
}
