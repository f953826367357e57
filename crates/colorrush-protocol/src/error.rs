//! Error types for the protocol layer.
//!
//! Each crate in Colorrush defines its own error enum. A `ProtocolError`
//! always means the bytes on the wire were the problem, never the room or
//! the network.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing `type`, or a
    /// frame that isn't an object at all.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed, but its payload has the wrong shape for its
    /// `type` (e.g. `ready` with a string payload).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The frame's `type` tag names no known command.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
}

impl ProtocolError {
    /// Stable code sent to clients in `error` messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "INTERNAL",
            Self::Decode(_) | Self::InvalidMessage(_) => "INVALID_MESSAGE",
            Self::UnknownCommand(_) => "UNKNOWN_COMMAND",
        }
    }
}
