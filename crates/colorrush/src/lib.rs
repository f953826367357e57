//! # Colorrush
//!
//! Realtime multiplayer color-quiz lobby server.
//!
//! Players connect over WebSocket, join a room by id, and race through
//! their own color-naming quiz while the room tracks progress, scores and
//! ranking for everyone. One player per room is the host: they start and
//! reset rounds but don't play.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colorrush::prelude::*;
//!
//! # async fn start() -> Result<(), ColorRushError> {
//! let server = ColorRushServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .room_config(RoomConfig { max_players: 20, ..RoomConfig::default() })
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Clients connect to `ws://host:port/?room_id=r1&player_name=Alice&is_host=true`.

mod error;
mod handler;
mod server;

pub use error::ColorRushError;
pub use handler::ConnectParams;
pub use server::{ColorRushServer, ColorRushServerBuilder, ServerConfig};

/// Everything needed to run a server and talk to its rooms.
pub mod prelude {
    pub use crate::{
        ColorRushError, ColorRushServer, ColorRushServerBuilder, ConnectParams, ServerConfig,
    };
    pub use colorrush_protocol::{
        ClientMessage, Codec, JsonCodec, PlayerId, PlayerListEntry, PlayerRank, RoomId,
        RoomStatus, ServerMessage,
    };
    pub use colorrush_quiz::{Color, QuizStatus};
    pub use colorrush_room::{RoomConfig, RoomDirectory, RoomError};
}
