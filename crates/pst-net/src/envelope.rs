//! The binary frame envelope.
//!
//! Every frame on the wire is one CBOR-encoded [`Envelope`]. CBOR keeps the
//! `data` payload as raw bytes instead of base64-inflating it the way JSON
//! would, which matters once document payloads get chunked.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors encoding or decoding a frame.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("frame decoding failed: {0}")]
    Decode(String),
}

/// What a frame is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// First frame after channel open, announcing the sender.
    Arrive,
    /// Reply to an arrive, addressed to the original sender.
    Welcome,
    /// Keepalive. Carries no payload and is never delivered upward.
    Ping,
    /// Application payload in `data`.
    Message,
}

/// Fragment bookkeeping for payloads split across frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    /// Correlation id shared by all fragments of one payload. A ULID, so
    /// concurrent large sends from the same peer cannot collide.
    pub id: String,
    pub index: u32,
    pub total: u32,
}

/// One frame on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender_id: String,
    /// Set on welcome frames (and any other directed traffic); frames with a
    /// target are dropped by every peer except the addressee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub kind: FrameKind,
    /// Free-form sender metadata exchanged during the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes_opt")]
    pub data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkHeader>,
}

impl Envelope {
    pub fn arrive(sender_id: impl Into<String>, peer_metadata: serde_json::Value) -> Self {
        Envelope {
            sender_id: sender_id.into(),
            target_id: None,
            kind: FrameKind::Arrive,
            peer_metadata: Some(peer_metadata),
            data: None,
            chunk: None,
        }
    }

    pub fn welcome(
        sender_id: impl Into<String>,
        target_id: impl Into<String>,
        peer_metadata: serde_json::Value,
    ) -> Self {
        Envelope {
            sender_id: sender_id.into(),
            target_id: Some(target_id.into()),
            kind: FrameKind::Welcome,
            peer_metadata: Some(peer_metadata),
            data: None,
            chunk: None,
        }
    }

    pub fn ping(sender_id: impl Into<String>) -> Self {
        Envelope {
            sender_id: sender_id.into(),
            target_id: None,
            kind: FrameKind::Ping,
            peer_metadata: None,
            data: None,
            chunk: None,
        }
    }

    pub fn message(sender_id: impl Into<String>, data: Vec<u8>) -> Self {
        Envelope {
            sender_id: sender_id.into(),
            target_id: None,
            kind: FrameKind::Message,
            peer_metadata: None,
            data: Some(data),
            chunk: None,
        }
    }

    /// Encode to CBOR bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| EnvelopeError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        ciborium::de::from_reader(bytes).map_err(|e| EnvelopeError::Decode(e.to_string()))
    }
}

/// Serialize `Option<Vec<u8>>` as a CBOR byte string rather than an array of
/// integers.
mod serde_bytes_opt {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_bytes(bytes),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let value = ciborium::value::Value::deserialize(d)?;
        match value {
            ciborium::value::Value::Null => Ok(None),
            ciborium::value::Value::Bytes(b) => Ok(Some(b)),
            ciborium::value::Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    item.as_integer()
                        .and_then(|i| u8::try_from(i).ok())
                        .ok_or_else(|| D::Error::custom("expected byte"))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Some),
            other => Err(D::Error::custom(format!(
                "expected bytes, got {:?}",
                other
            ))),
        }
    }
}
