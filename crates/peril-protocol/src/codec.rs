//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The pub/sub layer doesn't care HOW values are serialized: it takes any
//! [`Codec`] as a strategy object and records the codec's
//! [`content_type`](Codec::content_type) next to every payload, so the
//! receiving side can tell which decoder the bytes were meant for.
//!
//! Two codecs are provided:
//! - [`JsonCodec`]: self-describing, human-readable. Used for pause,
//!   move and war traffic.
//! - [`BincodeCodec`]: compact binary; the receiver must know the target
//!   type up front. Used for game logs.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec travels into long-lived
/// listener tasks that Tokio may run on any worker thread.
///
/// The methods are generic over the value type, so one codec value
/// serves every message type on a topic.
pub trait Codec: Send + Sync + 'static {
    /// MIME type recorded alongside encoded payloads.
    fn content_type(&self) -> &'static str;

    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns an encode error only if the value cannot be represented in
    /// this format; well-formed in-memory values always encode.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns a decode error if the bytes are malformed, truncated, or
    /// don't match the expected type. Redelivering the same bytes can never
    /// succeed, so callers treat this as terminal for the message.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes a payload after checking its recorded content type.
    ///
    /// A missing content type is accepted; a different one is rejected
    /// without attempting to parse the bytes.
    fn decode_checked<T: DeserializeOwned>(
        &self,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        match content_type {
            Some(found) if found != self.content_type() => {
                Err(ProtocolError::UnexpectedContentType {
                    expected: self.content_type(),
                    found: found.to_string(),
                })
            }
            _ => self.decode(data),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use peril_protocol::{Codec, JsonCodec, PlayingState};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&PlayingState { is_paused: true }).unwrap();
/// let decoded: PlayingState = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_paused);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::JsonEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::JsonDecode)
    }
}

// ---------------------------------------------------------------------------
// BincodeCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses `bincode`'s compact binary encoding.
///
/// The payload carries no field names or type tags: decoding only works
/// into the exact type that was encoded.
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

#[cfg(feature = "bincode")]
impl Codec for BincodeCodec {
    fn content_type(&self) -> &'static str {
        "application/x-bincode"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(value).map_err(ProtocolError::BincodeEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        bincode::deserialize(data).map_err(ProtocolError::BincodeDecode)
    }
}
