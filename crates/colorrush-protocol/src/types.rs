//! Core protocol types for Colorrush's wire format.
//!
//! Everything in this module travels on the wire as JSON. Field names are
//! camelCase because the clients are browsers.

use std::fmt;

use colorrush_quiz::QuizStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// Freshly generated (UUID v4) for every connection, so two joins with the
/// same display name still get distinct ids. Serialized as the bare UUID
/// string thanks to `#[serde(transparent)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Generates a new random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A room identifier, chosen by the host when the room is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Waiting ──(start)──→ Playing ──(all finished)──→ Finished
///    ↑                    │                           │
///    └───────────────(reset)──────────────────────────┘
/// ```
///
/// Transitions only move forward, except for an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if a round may be started from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while answers are being accepted.
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive a server message.
///
/// Room operations produce `(Recipient, ServerMessage)` pairs while holding
/// the room lock; delivery happens after the lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every player in the room, host included.
    All,
    /// One specific player.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Commands a client can send.
///
/// On the wire: `{"type": "answer", "payload": "red"}`. Unit commands may
/// omit `payload` entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Toggle the sender's ready flag.
    Ready(bool),
    /// Host only: start a round.
    StartGame,
    /// Submit one color answer.
    Answer(String),
    /// Host only: send the room back to the lobby.
    GameReset,
}

/// The untyped envelope every client frame must match before its `type`
/// tag is inspected.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl ClientMessage {
    /// Decodes a client frame.
    ///
    /// Decoding is two-step so an unknown `type` can be told apart from a
    /// malformed payload.
    ///
    /// # Errors
    /// - `ProtocolError::Decode` if the bytes aren't a `{type, payload}` object.
    /// - `ProtocolError::UnknownCommand` if `type` names no command.
    /// - `ProtocolError::InvalidMessage` if the payload has the wrong shape.
    pub fn decode(codec: &impl Codec, data: &[u8]) -> Result<Self, ProtocolError> {
        let frame: RawFrame = codec.decode(data)?;
        Self::from_frame(frame)
    }

    fn from_frame(frame: RawFrame) -> Result<Self, ProtocolError> {
        match frame.kind.as_str() {
            "ready" => frame.payload.as_bool().map(Self::Ready).ok_or_else(|| {
                ProtocolError::InvalidMessage("ready payload must be a boolean".into())
            }),
            "start_game" => Ok(Self::StartGame),
            "answer" => match frame.payload {
                serde_json::Value::String(color) => Ok(Self::Answer(color)),
                _ => Err(ProtocolError::InvalidMessage(
                    "answer payload must be a color string".into(),
                )),
            },
            "game_reset" => Ok(Self::GameReset),
            _ => Err(ProtocolError::UnknownCommand(frame.kind)),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Sent once after a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub player_id: PlayerId,
    pub room_id: RoomId,
    pub is_host: bool,
}

/// One row of the `player_list` leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerListEntry {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
    pub progress: usize,
    pub wrong_count: u32,
    pub score: i32,
    /// 1-based, contiguous, no ties.
    pub rank: usize,
}

/// One row of the final `game_rank` leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRank {
    pub id: PlayerId,
    pub name: String,
    pub score: i32,
    pub wrong_count: u32,
    pub duration_ms: u64,
    pub is_finished: bool,
}

/// Payload of room-wide status notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotice {
    pub status: RoomStatus,
}

/// A recoverable failure reported to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Messages the server sends.
///
/// On the wire: `{"type": "game_state", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Identity assigned to this connection.
    Welcome(Welcome),
    /// Ranked roster of non-host players.
    PlayerList(Vec<PlayerListEntry>),
    /// The receiving player's own quiz snapshot.
    GameState(QuizStatus),
    /// A round has started.
    GameStart(StatusNotice),
    /// Every player has finished.
    GameEnd(StatusNotice),
    /// The host sent the room back to the lobby.
    GameReset(StatusNotice),
    /// Final leaderboard, sent alongside `game_end`.
    GameRank(Vec<PlayerRank>),
    /// A recoverable failure; the connection stays open.
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Shorthand for an `error` message.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload::new(code, message))
    }

    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome(_) => "welcome",
            Self::PlayerList(_) => "player_list",
            Self::GameState(_) => "game_state",
            Self::GameStart(_) => "game_start",
            Self::GameEnd(_) => "game_end",
            Self::GameReset(_) => "game_reset",
            Self::GameRank(_) => "game_rank",
            Self::Error(_) => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
