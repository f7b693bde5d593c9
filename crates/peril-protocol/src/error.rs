//! Error types for the protocol layer.
//!
//! Each crate in Peril defines its own error enum. A `ProtocolError` always
//! means the problem is in turning values into bytes or back, never in
//! the broker or the game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing to JSON failed.
    #[cfg(feature = "json")]
    #[error("json encode failed: {0}")]
    JsonEncode(serde_json::Error),

    /// The bytes are not valid JSON for the expected type.
    #[cfg(feature = "json")]
    #[error("json decode failed: {0}")]
    JsonDecode(serde_json::Error),

    /// Serializing to bincode failed.
    #[cfg(feature = "bincode")]
    #[error("bincode encode failed: {0}")]
    BincodeEncode(bincode::Error),

    /// The bytes are not a bincode encoding of the expected type
    /// (wrong type, truncated, or trailing garbage in a length field).
    #[cfg(feature = "bincode")]
    #[error("bincode decode failed: {0}")]
    BincodeDecode(bincode::Error),

    /// The payload was recorded with a content type this codec can't read.
    #[error("unexpected content type: expected {expected}, found {found}")]
    UnexpectedContentType {
        expected: &'static str,
        found: String,
    },

    /// A value decoded but violates a wire-level rule (e.g. a bad
    /// territory name in a routing key).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

