//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event name, or
    /// a payload of the wrong shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value parsed but is not valid in the protocol, e.g. a player
    /// number other than 1 or 2.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
