//! Room configuration.

use serde::{Deserialize, Serialize};

use crate::RoomError;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a [`RoomDirectory`](crate::RoomDirectory)
/// creates.
///
/// Missing fields fall back to [`Default`] when deserializing, so a partial
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Minimum non-host players required to start a round.
    pub min_players: usize,

    /// Maximum members, host included.
    pub max_players: usize,

    /// Challenges per round.
    pub quiz_length: usize,

    /// Points added for a correct answer.
    pub correct_reward: i32,

    /// Points removed for a wrong answer.
    pub wrong_penalty: i32,

    /// When `true`, every player in a round answers the same sequence.
    /// Otherwise each player draws their own.
    pub shared_sequence: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 1,
            max_players: 10,
            quiz_length: 10,
            correct_reward: 10,
            wrong_penalty: 5,
            shared_sequence: false,
        }
    }
}

impl RoomConfig {
    /// Checks that a round can actually be started and finished.
    ///
    /// The host occupies one slot and never plays, so `max_players` must
    /// leave room for `min_players` contenders. A round needs at least one
    /// contender and at least one challenge, or it would never end.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.quiz_length == 0 {
            return Err(RoomError::InvalidConfig("quiz_length must be at least 1"));
        }
        if self.max_players == 0 {
            return Err(RoomError::InvalidConfig("max_players must be at least 1"));
        }
        if self.min_players == 0 {
            return Err(RoomError::InvalidConfig("min_players must be at least 1"));
        }
        if self.min_players >= self.max_players {
            return Err(RoomError::InvalidConfig(
                "max_players must exceed min_players to leave a slot for the host",
            ));
        }
        Ok(())
    }
}
