//! Error types for the room layer.

use colorrush_protocol::{PlayerId, RoomId};
use colorrush_quiz::QuizError;

/// Errors that can occur during room and directory operations.
///
/// Every variant except [`RoomNotFound`](Self::RoomNotFound) at join time
/// and [`PlayerNotFound`](Self::PlayerNotFound) is recoverable: it is
/// reported to the offending connection and the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room is registered under this id.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// A room is already registered under this id.
    #[error("room {0} already exists")]
    RoomExists(RoomId),

    /// The room has no free slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is not a member of the room.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// The player id is already a member of the room.
    #[error("player {0} is already in the room")]
    AlreadyInRoom(PlayerId),

    /// Another member already uses this display name.
    #[error("name {0:?} is already taken in this room")]
    NameTaken(String),

    /// Only the host may do this.
    #[error("only the host can do that")]
    NotHost,

    /// The host does not play, so readiness and answers don't apply.
    #[error("not applicable for the host")]
    NotApplicableForHost,

    /// A round is already running.
    #[error("game already in progress")]
    AlreadyPlaying,

    /// The last round is over; the room must be reset before a new one.
    #[error("game already finished, reset the room first")]
    GameFinished,

    /// Too few non-host players to start.
    #[error("need at least {required} players, have {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },

    /// At least one non-host player hasn't marked ready.
    #[error("not every player is ready")]
    PlayersNotReady,

    /// Answers are only accepted while a round is running.
    #[error("game has not started")]
    GameNotStarted,

    /// A [`RoomConfig`](crate::RoomConfig) that no round could be played
    /// under.
    #[error("invalid room config: {0}")]
    InvalidConfig(&'static str),

    /// The quiz engine rejected the answer.
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl RoomError {
    /// Stable code sent to clients in `error` messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::RoomExists(_) => "ROOM_EXISTS",
            Self::RoomFull(_) => "ROOM_FULL",
            Self::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            Self::AlreadyInRoom(_) => "ALREADY_IN_ROOM",
            Self::NameTaken(_) => "NAME_TAKEN",
            Self::NotHost => "NOT_HOST",
            Self::NotApplicableForHost => "NOT_APPLICABLE_FOR_HOST",
            Self::AlreadyPlaying => "ALREADY_PLAYING",
            Self::GameFinished => "GAME_FINISHED",
            Self::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            Self::PlayersNotReady => "PLAYERS_NOT_READY",
            Self::GameNotStarted => "GAME_NOT_STARTED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Quiz(e) => e.code(),
        }
    }
}

/// Failure to queue a message on a player's outbound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel was closed, or its receiving side is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// The peer stopped draining its queue; the channel has been closed.
    #[error("outbound queue full, channel closed")]
    Overflow,
}
