//! One connected participant and its outbound channel.
//!
//! The room never writes to a socket. It queues [`ServerMessage`]s on each
//! player's [`PlayerChannel`], and the connection layer drains the matching
//! [`OutboundReceiver`] from a dedicated writer task. The queue is bounded:
//! a peer that stops reading gets its channel closed instead of stalling
//! the room.

use std::sync::Arc;

use colorrush_protocol::{
    ClientMessage, PlayerId, PlayerListEntry, PlayerRank, ServerMessage,
};
use colorrush_quiz::{AnswerOutcome, QuizEngine};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::{ChannelError, Room, RoomConfig, RoomError};

// ---------------------------------------------------------------------------
// PlayerChannel
// ---------------------------------------------------------------------------

/// Sending side of a player's outbound queue.
///
/// Cheap to clone. Every clone shares the same queue and close flag.
#[derive(Debug, Clone)]
pub struct PlayerChannel {
    tx: mpsc::Sender<ServerMessage>,
    closed: Arc<watch::Sender<bool>>,
}

impl PlayerChannel {
    /// Creates a channel holding at most `capacity` undelivered messages.
    pub fn new(capacity: usize) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        let channel = Self {
            tx,
            closed: Arc::new(closed_tx),
        };
        (channel, OutboundReceiver { rx, closed: closed_rx })
    }

    /// Queues one message without waiting.
    ///
    /// A full queue closes the channel: the peer is too far behind to
    /// catch up, and dropping a single message would leave it with an
    /// inconsistent view of the room.
    pub fn send(&self, msg: ServerMessage) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::ChannelClosed);
        }
        match self.tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.close();
                Err(ChannelError::Overflow)
            }
            Err(TrySendError::Closed(_)) => {
                self.close();
                Err(ChannelError::ChannelClosed)
            }
        }
    }

    /// Marks the channel closed. Safe to call any number of times.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.tx.is_closed()
    }

    /// Resolves once the channel is closed, either explicitly, by an
    /// overflow, or because the receiver was dropped.
    ///
    /// The connection's read loop selects on this so that a peer whose
    /// queue overflowed leaves the room even while its socket is stuck.
    pub async fn closed(&self) {
        let mut flag = self.closed.subscribe();
        tokio::select! {
            _ = flag.wait_for(|closed| *closed) => {}
            () = self.tx.closed() => {}
        }
    }
}

/// Receiving side of a player's outbound queue, owned by the writer task.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<ServerMessage>,
    closed: watch::Receiver<bool>,
}

impl OutboundReceiver {
    /// Waits for the next message.
    ///
    /// Returns `None` once the channel is closed. Messages still queued at
    /// that point are discarded.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        if *self.closed.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.closed.wait_for(|closed| *closed) => None,
            msg = self.rx.recv() => msg,
        }
    }

    /// Takes the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A room member: identity, role, readiness, score and quiz progress.
#[derive(Debug)]
pub struct Player {
    id: PlayerId,
    name: String,
    is_host: bool,
    ready: bool,
    score: i32,
    engine: QuizEngine,
    channel: PlayerChannel,
    /// Position in the room's join order. Assigned by the room.
    pub(crate) join_seq: u64,
}

impl Player {
    /// Creates a player with a fresh random id and a fresh quiz engine.
    ///
    /// `host_intent` is only a request: the room decides whether the player
    /// actually becomes host when it is added.
    pub fn join(
        channel: PlayerChannel,
        name: impl Into<String>,
        host_intent: bool,
        quiz_length: usize,
    ) -> Self {
        Self {
            id: PlayerId::random(),
            name: name.into(),
            is_host: host_intent,
            ready: false,
            score: 0,
            engine: QuizEngine::new(quiz_length),
            channel,
            join_seq: 0,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    /// Queues a message for this player.
    pub fn send(&self, msg: ServerMessage) -> Result<(), ChannelError> {
        self.channel.send(msg)
    }

    /// Submits an answer to this player's engine and applies the scoring
    /// policy to the outcome.
    pub fn submit_answer(
        &mut self,
        candidate: &str,
        config: &RoomConfig,
    ) -> Result<AnswerOutcome, RoomError> {
        let outcome = self.engine.submit_answer(candidate)?;
        self.update_score(outcome.correct, config);
        Ok(outcome)
    }

    /// Adds the reward for a correct answer, subtracts the penalty for a
    /// wrong one. The wrong-answer count itself lives in the engine.
    pub fn update_score(&mut self, was_correct: bool, config: &RoomConfig) {
        if was_correct {
            self.score += config.correct_reward;
        } else {
            self.score -= config.wrong_penalty;
        }
    }

    /// Leaderboard row for the final ranking.
    pub fn rank(&self) -> PlayerRank {
        PlayerRank {
            id: self.id,
            name: self.name.clone(),
            score: self.score,
            wrong_count: self.engine.wrong_count(),
            duration_ms: u64::try_from(self.engine.elapsed().as_millis()).unwrap_or(u64::MAX),
            is_finished: self.engine.is_finished(),
        }
    }

    /// Row for the live `player_list` with the given 1-based rank.
    pub fn list_entry(&self, rank: usize) -> PlayerListEntry {
        PlayerListEntry {
            id: self.id,
            name: self.name.clone(),
            is_ready: self.ready,
            progress: self.engine.progress(),
            wrong_count: self.engine.wrong_count(),
            score: self.score,
            rank,
        }
    }

    /// Back to the lobby: fresh engine, not ready, zero score.
    pub fn reset(&mut self, quiz_length: usize) {
        self.engine = QuizEngine::new(quiz_length);
        self.ready = false;
        self.score = 0;
    }

    /// Tears down the outbound channel. Idempotent.
    pub fn close(&self) {
        self.channel.close();
    }

    pub(crate) fn channel(&self) -> &PlayerChannel {
        &self.channel
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Hosts never carry a ready flag.
    pub(crate) fn set_host(&mut self, is_host: bool) {
        self.is_host = is_host;
        if is_host {
            self.ready = false;
        }
    }

    /// Installs the engine for a new round.
    pub(crate) fn start_round(&mut self, engine: QuizEngine) {
        self.engine = engine;
        self.score = 0;
    }
}

// ---------------------------------------------------------------------------
// PlayerHandle
// ---------------------------------------------------------------------------

/// What a connection keeps after its player has joined a room.
///
/// The [`Player`] itself is owned by the room; the handle only carries
/// the identity needed to address room operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHandle {
    id: PlayerId,
    name: String,
}

impl PlayerHandle {
    pub(crate) fn new(id: PlayerId, name: String) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatches one decoded client command to the matching room operation.
    ///
    /// Start and reset are host-only. The host flag can only be taken away
    /// by removing the player, so checking it before the call is safe.
    pub async fn handle_command(&self, cmd: ClientMessage, room: &Room) -> Result<(), RoomError> {
        match cmd {
            ClientMessage::Ready(ready) => room.set_ready(self.id, ready).await,
            ClientMessage::StartGame => {
                self.require_host(room).await?;
                room.start_game().await
            }
            ClientMessage::Answer(candidate) => room.handle_answer(self.id, &candidate).await,
            ClientMessage::GameReset => {
                self.require_host(room).await?;
                room.reset_game().await
            }
        }
    }

    async fn require_host(&self, room: &Room) -> Result<(), RoomError> {
        if room.is_host(self.id).await? {
            Ok(())
        } else {
            Err(RoomError::NotHost)
        }
    }
}
