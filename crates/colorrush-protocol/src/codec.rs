//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust types and the bytes carried by a
//! transport frame. The rest of the stack only talks to the [`Codec`]
//! trait, so the wire format can change without touching room logic.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// ## Why the bounds
///
/// One codec instance lives inside the shared server state and is used by
/// every connection task for the lifetime of the server:
///
/// - `Send + Sync` lets that shared instance be touched from whichever
///   Tokio worker thread a connection task happens to run on.
/// - `'static` means the codec owns all its data. A value that borrows
///   from a stack frame could not be stored in state that outlives it.
///
/// ## Generic methods, not a generic trait
///
/// `Codec` is not parameterized over a message type. Instead each method
/// is generic, so the same `JsonCodec` encodes a `ServerMessage` on the
/// writer task and decodes the `{type, payload}` envelope of a client
/// frame on the read path:
///
/// ```text
/// codec.encode(&ServerMessage::GameStart(..))   // T = ServerMessage
/// codec.decode::<RawFrame>(frame)               // T = the envelope
/// ```
///
/// Decoding asks for `DeserializeOwned` rather than `Deserialize<'de>`.
/// The decoded value must not borrow from the frame buffer, because the
/// buffer is dropped as soon as the frame has been dispatched.
///
/// The price of generic methods is that `Codec` is not object safe, so
/// code that needs one takes a type parameter (`ServerState<C: Codec>`)
/// instead of a `Box<dyn Codec>`.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients speak JSON text frames, so this is the only codec the
/// server ships with.
///
/// ```rust
/// use colorrush_protocol::{Codec, JsonCodec, RoomStatus, ServerMessage, StatusNotice};
///
/// let codec = JsonCodec;
/// let msg = ServerMessage::GameStart(StatusNotice { status: RoomStatus::Playing });
///
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(bytes, br#"{"type":"game_start","payload":{"status":"playing"}}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
