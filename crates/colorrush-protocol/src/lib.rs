//! Wire protocol for Colorrush.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`]) and [`RoomStatus`].
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]) as closed tagged
//!   unions. Every frame is `{"type": ..., "payload": ...}`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room (state change)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, ErrorPayload, PlayerId, PlayerListEntry, PlayerRank,
    Recipient, RoomId, RoomStatus, ServerMessage, StatusNotice, Welcome,
};

pub use colorrush_quiz::{Color, QuizStatus};
