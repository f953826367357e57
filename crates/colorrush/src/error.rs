//! Unified error type for Colorrush.

use colorrush_protocol::ProtocolError;
use colorrush_room::RoomError;
use colorrush_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant generates the `From`
/// impls, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ColorRushError {
    /// A transport-level error (bind, accept, handshake, lost peer).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown command).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not found, wrong state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The connect request lacked a room id or a player name, or could
    /// not be decoded.
    #[error("invalid connect parameters: {0}")]
    InvalidParams(String),
}

impl ColorRushError {
    /// Stable code sent to clients in `error` messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "INTERNAL",
            Self::Protocol(e) => e.code(),
            Self::Room(e) => e.code(),
            Self::InvalidParams(_) => "INVALID_PARAMS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Disconnected("gone".into());
        let wrapped: ColorRushError = err.into();
        assert!(matches!(wrapped, ColorRushError::Transport(_)));
        assert!(wrapped.to_string().contains("gone"));
        assert_eq!(wrapped.code(), "INTERNAL");
    }

    #[test]
    fn test_from_protocol_error_keeps_code() {
        let err = ProtocolError::UnknownCommand("dance".into());
        let wrapped: ColorRushError = err.into();
        assert!(matches!(wrapped, ColorRushError::Protocol(_)));
        assert_eq!(wrapped.code(), "UNKNOWN_COMMAND");
    }

    #[test]
    fn test_from_room_error_keeps_code() {
        let err = RoomError::RoomNotFound(colorrush_protocol::RoomId::from("r9"));
        let wrapped: ColorRushError = err.into();
        assert!(matches!(wrapped, ColorRushError::Room(_)));
        assert_eq!(wrapped.code(), "ROOM_NOT_FOUND");
        assert_eq!(wrapped.to_string(), "room r9 not found");
    }

    #[test]
    fn test_invalid_params_code() {
        let err = ColorRushError::InvalidParams("missing room_id".into());
        assert_eq!(err.code(), "INVALID_PARAMS");
    }
}
