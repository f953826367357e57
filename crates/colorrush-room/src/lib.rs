//! Players, rooms and the room directory for Colorrush.
//!
//! A [`Room`] is shared mutable state: every connection joined to it calls
//! into it concurrently. All mutation goes through one lock per room, and
//! outbound messages are queued on per-player [`PlayerChannel`]s only after
//! that lock is released.
//!
//! # Key types
//!
//! - [`Player`]: one member with role, readiness, score, quiz engine
//! - [`PlayerChannel`] / [`OutboundReceiver`]: bounded outbound queue
//! - [`PlayerHandle`]: what a connection keeps to address its player
//! - [`Room`]: the Waiting → Playing → Finished state machine
//! - [`RoomDirectory`]: room id → room, with eviction of empty rooms
//! - [`RoomConfig`]: player limits, quiz length, scoring

mod config;
mod directory;
mod error;
mod player;
mod room;

pub use config::RoomConfig;
pub use directory::RoomDirectory;
pub use error::{ChannelError, RoomError};
pub use player::{OutboundReceiver, Player, PlayerChannel, PlayerHandle};
pub use room::{PlayerSnapshot, Room, RoomInfo};
