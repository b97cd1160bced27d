//! Stampede Envelope Codec
//!
//! Every message travels as a JSON text frame:
//!
//! ```text
//! {"type": "moveApproved", "data": "eyJ0YXJnZXQiOnsiWCI6...=="}
//! ```
//!
//! `data` is the base64 of the payload's own JSON. Nothing above this module
//! looks inside it; a payload is only decoded under the schema its tag names.

use crate::types::*;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A payload schema bound to its type tag
pub trait Payload: Serialize + DeserializeOwned {
    const TAG: &'static str;
}

/// Payloads a client may send
pub trait Outbound: Payload {}

/// Payloads a client may register handlers for
pub trait Inbound: Payload {}

macro_rules! payload {
    ($ty:ty, $tag:expr, $dir:ident) => {
        impl Payload for $ty {
            const TAG: &'static str = $tag;
        }
        impl $dir for $ty {}
    };
}

payload!(Login, tag::LOGIN, Outbound);
payload!(MoveRequest, tag::MOVE_REQUEST, Outbound);
payload!(MoveApproved, tag::MOVE_APPROVED, Inbound);
payload!(PositionCorrection, tag::POSITION_CORRECTION, Inbound);
payload!(RegisterResponse, tag::REGISTER_RESPONSE, Inbound);
payload!(LoginResponse, tag::LOGIN_RESPONSE, Inbound);

/// The outer `{type, data}` wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(rename = "data", with = "opaque")]
    pub payload: Bytes,
}

impl Envelope {
    /// Serialize `payload` under its schema and wrap it
    pub fn encode<P: Payload>(payload: &P) -> Result<Self> {
        let json = serde_json::to_vec(payload).map_err(|e| Error::EncodeError(e.to_string()))?;
        Ok(Self {
            tag: P::TAG.to_string(),
            payload: Bytes::from(json),
        })
    }

    /// Decode the payload as `P`, refusing if the tag designates another schema
    pub fn decode<P: Payload>(&self) -> Result<P> {
        if self.tag != P::TAG {
            return Err(Error::TagMismatch {
                expected: P::TAG,
                actual: self.tag.clone(),
            });
        }
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Render as a wire text frame
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::EncodeError(e.to_string()))
    }

    /// Parse a wire frame (text or binary)
    pub fn from_slice(frame: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(frame)?)
    }
}

/// Encode a payload straight to a wire text frame
pub fn encode<P: Payload>(payload: &P) -> Result<String> {
    Envelope::encode(payload)?.to_text()
}

mod opaque {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Bytes, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let env = Envelope::encode(&Login {
            client_id: 7,
            username: "client_7".to_string(),
        })
        .unwrap();
        let text = env.to_text().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(raw["type"], "login");
        let data = STANDARD.decode(raw["data"].as_str().unwrap()).unwrap();
        let inner: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(inner["clientID"], 7);
        assert_eq!(inner["username"], "client_7");
    }

    #[test]
    fn test_decode_under_wrong_schema() {
        let env = Envelope::encode(&PositionCorrection {
            position: Vector3f::ZERO,
        })
        .unwrap();
        match env.decode::<MoveApproved>() {
            Err(Error::TagMismatch { expected, actual }) => {
                assert_eq!(expected, "moveApproved");
                assert_eq!(actual, "positionCorrection");
            }
            other => panic!("Expected TagMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_base64() {
        let result = Envelope::from_slice(br#"{"type":"login","data":"%%%"}"#);
        assert!(result.is_err());
    }
}
