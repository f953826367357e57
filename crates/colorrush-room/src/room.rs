//! The room state machine.
//!
//! A [`Room`] owns its players behind a single `tokio::sync::Mutex`. Every
//! operation follows the same shape:
//!
//! 1. take the lock, validate, mutate
//! 2. build a list of `(Recipient, ServerMessage)` pairs and snapshot the
//!    channels they go to
//! 3. release the lock
//! 4. deliver
//!
//! Delivery only ever queues onto bounded per-player channels, so one slow
//! peer cannot hold up the room or the other peers.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use colorrush_protocol::{
    PlayerId, PlayerListEntry, PlayerRank, Recipient, RoomId, RoomStatus, ServerMessage,
    StatusNotice, Welcome,
};
use colorrush_quiz::{Challenge, QuizEngine, QuizStatus};
use tokio::sync::Mutex;

use crate::{Player, PlayerChannel, PlayerHandle, RoomConfig, RoomError};

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub player_count: usize,
    pub max_players: usize,
    pub host: Option<PlayerId>,
}

/// A snapshot of one member, as seen by the room.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub score: i32,
    pub quiz: QuizStatus,
}

/// A game room shared by every connection joined to it.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    config: RoomConfig,
    inner: Mutex<RoomInner>,
    /// Members plus joins in flight. Read by the directory, which must not
    /// take `inner`.
    occupancy: AtomicUsize,
    /// Set once the directory has dropped this room. Joins then fail.
    retired: AtomicBool,
}

#[derive(Debug)]
struct RoomInner {
    status: RoomStatus,
    host: Option<PlayerId>,
    players: HashMap<PlayerId, Player>,
    started_at: Option<Instant>,
    next_seq: u64,
}

/// Messages to send once the lock is released, and where to send them.
struct Delivery {
    outbox: Vec<(Recipient, ServerMessage)>,
    peers: Vec<(PlayerId, PlayerChannel)>,
}

impl Delivery {
    fn send(self, room_id: &RoomId) {
        for (recipient, msg) in self.outbox {
            match recipient {
                Recipient::All => {
                    for (player_id, channel) in &self.peers {
                        send_to(room_id, *player_id, channel, msg.clone());
                    }
                }
                Recipient::Player(target) => {
                    if let Some((player_id, channel)) =
                        self.peers.iter().find(|(id, _)| *id == target)
                    {
                        send_to(room_id, *player_id, channel, msg);
                    }
                }
            }
        }
    }
}

/// Queues one message. A failure only affects that player.
fn send_to(room_id: &RoomId, player_id: PlayerId, channel: &PlayerChannel, msg: ServerMessage) {
    let kind = msg.kind();
    if let Err(error) = channel.send(msg) {
        tracing::warn!(%room_id, %player_id, kind, %error, "dropped outbound message");
    }
}

impl Room {
    /// Creates an empty room in the `Waiting` state.
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            id,
            config,
            inner: Mutex::new(RoomInner {
                status: RoomStatus::Waiting,
                host: None,
                players: HashMap::new(),
                started_at: None,
                next_seq: 0,
            }),
            occupancy: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Adds a player and sends them a `welcome`.
    ///
    /// The joiner becomes host if they asked to and the room has none. A
    /// room that has members but no host promotes the joiner regardless,
    /// and a second player asking for host is joined as a regular player.
    /// Joining mid-round starts the newcomer on their own quiz.
    ///
    /// # Errors
    /// - [`RoomError::RoomNotFound`] if the room was evicted meanwhile.
    /// - [`RoomError::RoomFull`], [`RoomError::AlreadyInRoom`],
    ///   [`RoomError::NameTaken`].
    pub async fn add_player(&self, player: Player) -> Result<PlayerHandle, RoomError> {
        // Reserve a slot before checking `retired`, so eviction either sees
        // the reservation or the join sees the retirement.
        self.occupancy.fetch_add(1, Ordering::SeqCst);
        if self.retired.load(Ordering::SeqCst) {
            self.occupancy.fetch_sub(1, Ordering::SeqCst);
            return Err(RoomError::RoomNotFound(self.id.clone()));
        }

        let result = self.insert(player).await;
        if result.is_err() {
            self.occupancy.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }

    async fn insert(&self, mut player: Player) -> Result<PlayerHandle, RoomError> {
        let (handle, is_host, delivery) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            if inner.players.len() >= self.config.max_players {
                return Err(RoomError::RoomFull(self.id.clone()));
            }
            if inner.players.contains_key(&player.id()) {
                return Err(RoomError::AlreadyInRoom(player.id()));
            }
            if inner.players.values().any(|p| p.name() == player.name()) {
                return Err(RoomError::NameTaken(player.name().to_string()));
            }

            let id = player.id();
            match inner.host {
                Some(host) => {
                    if player.is_host() {
                        tracing::warn!(room_id = %self.id, player_id = %id, %host, "room already has a host, joining as player");
                        player.set_host(false);
                    }
                }
                None => {
                    if !player.is_host() && !inner.players.is_empty() {
                        tracing::info!(room_id = %self.id, player_id = %id, "hostless room, promoting joiner");
                    }
                    player.set_host(true);
                    inner.host = Some(id);
                }
            }

            player.join_seq = inner.next_seq;
            inner.next_seq += 1;
            let is_host = player.is_host();
            let handle = PlayerHandle::new(id, player.name().to_string());

            let mut outbox = vec![(
                Recipient::Player(id),
                ServerMessage::Welcome(Welcome {
                    player_id: id,
                    room_id: self.id.clone(),
                    is_host,
                }),
            )];
            if inner.status.is_playing() && !is_host {
                player.start_round(QuizEngine::new(self.config.quiz_length));
                outbox.push((
                    Recipient::Player(id),
                    ServerMessage::GameStart(StatusNotice {
                        status: RoomStatus::Playing,
                    }),
                ));
                outbox.push((Recipient::Player(id), ServerMessage::GameState(player.engine().status())));
            }
            inner.players.insert(id, player);
            (handle, is_host, inner.delivery(outbox))
        };

        delivery.send(&self.id);
        tracing::info!(
            room_id = %self.id,
            player_id = %handle.id(),
            name = handle.name(),
            is_host,
            "player joined"
        );
        Ok(handle)
    }

    /// Removes a player, closes their channel and rebroadcasts the roster.
    ///
    /// A departing host is replaced by the earliest-joined remaining player.
    /// If a round is running and everyone left has finished, the round ends.
    /// Evicting the room once it is empty is up to the caller.
    pub async fn remove_player(&self, id: PlayerId) -> Result<(), RoomError> {
        let (player, delivery) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let player = inner
                .players
                .remove(&id)
                .ok_or(RoomError::PlayerNotFound(id))?;

            if inner.host == Some(id) {
                inner.host = None;
                if let Some(next) = inner.players.values_mut().min_by_key(|p| p.join_seq) {
                    next.set_host(true);
                    inner.host = Some(next.id());
                    tracing::info!(room_id = %self.id, new_host = %next.id(), "host reassigned");
                }
            }

            let mut outbox = Vec::new();
            if inner.status.is_playing() && inner.round_complete() {
                inner.finish(&self.id, &mut outbox);
            }
            outbox.push((Recipient::All, inner.player_list_message()));
            (player, inner.delivery(outbox))
        };

        self.occupancy.fetch_sub(1, Ordering::SeqCst);
        player.close();
        delivery.send(&self.id);
        tracing::info!(room_id = %self.id, player_id = %id, name = player.name(), "player left");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Game flow
    // -----------------------------------------------------------------

    /// Sets a non-host player's ready flag and rebroadcasts the roster.
    pub async fn set_ready(&self, id: PlayerId, ready: bool) -> Result<(), RoomError> {
        let delivery = {
            let mut inner = self.inner.lock().await;
            let player = inner
                .players
                .get_mut(&id)
                .ok_or(RoomError::PlayerNotFound(id))?;
            if player.is_host() {
                return Err(RoomError::NotApplicableForHost);
            }
            player.set_ready(ready);
            let list = inner.player_list_message();
            inner.delivery(vec![(Recipient::All, list)])
        };

        delivery.send(&self.id);
        tracing::debug!(room_id = %self.id, player_id = %id, ready, "ready changed");
        Ok(())
    }

    /// Starts a round.
    ///
    /// Host permission is checked by the caller. Every player gets a fresh
    /// engine; each non-host receives their first `game_state`, then
    /// everyone receives `game_start` and the roster.
    pub async fn start_game(&self) -> Result<(), RoomError> {
        let delivery = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            if !inner.status.can_start() {
                return Err(if inner.status.is_playing() {
                    RoomError::AlreadyPlaying
                } else {
                    RoomError::GameFinished
                });
            }

            let contenders = inner.players.values().filter(|p| !p.is_host()).count();
            if contenders < self.config.min_players {
                return Err(RoomError::NotEnoughPlayers {
                    required: self.config.min_players,
                    actual: contenders,
                });
            }
            if inner.players.values().any(|p| !p.is_host() && !p.is_ready()) {
                return Err(RoomError::PlayersNotReady);
            }

            let shared = self
                .config
                .shared_sequence
                .then(|| Challenge::sequence(self.config.quiz_length, &mut rand::rng()));
            let mut outbox = Vec::new();
            let mut players: Vec<&mut Player> = inner.players.values_mut().collect();
            players.sort_by_key(|p| p.join_seq);
            for player in players {
                player.start_round(match &shared {
                    Some(challenges) => QuizEngine::from_challenges(challenges.clone()),
                    None => QuizEngine::new(self.config.quiz_length),
                });
                if !player.is_host() {
                    outbox.push((
                        Recipient::Player(player.id()),
                        ServerMessage::GameState(player.engine().status()),
                    ));
                }
            }

            inner.status = RoomStatus::Playing;
            inner.started_at = Some(Instant::now());
            outbox.push((
                Recipient::All,
                ServerMessage::GameStart(StatusNotice {
                    status: RoomStatus::Playing,
                }),
            ));
            // Zero-length quizzes are finished before the first answer.
            if inner.round_complete() {
                inner.finish(&self.id, &mut outbox);
            }
            outbox.push((Recipient::All, inner.player_list_message()));
            inner.delivery(outbox)
        };

        delivery.send(&self.id);
        tracing::info!(room_id = %self.id, shared = self.config.shared_sequence, "game started");
        Ok(())
    }

    /// Applies one answer from a player.
    ///
    /// The player always gets their updated `game_state`. When the last
    /// contender finishes, everyone gets `game_end` and `game_rank`. The
    /// roster is rebroadcast in every case.
    pub async fn handle_answer(&self, id: PlayerId, candidate: &str) -> Result<(), RoomError> {
        let (correct, delivery) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let is_playing = inner.status.is_playing();
            let player = inner
                .players
                .get_mut(&id)
                .ok_or(RoomError::PlayerNotFound(id))?;
            if !is_playing {
                return Err(RoomError::GameNotStarted);
            }
            if player.is_host() {
                return Err(RoomError::NotApplicableForHost);
            }

            let outcome = player.submit_answer(candidate, &self.config)?;
            let mut outbox = vec![(
                Recipient::Player(id),
                ServerMessage::GameState(player.engine().status()),
            )];
            if outcome.finished {
                tracing::info!(room_id = %self.id, player_id = %id, "player finished");
            }
            if inner.round_complete() {
                inner.finish(&self.id, &mut outbox);
            }
            outbox.push((Recipient::All, inner.player_list_message()));
            (outcome.correct, inner.delivery(outbox))
        };

        delivery.send(&self.id);
        tracing::debug!(room_id = %self.id, player_id = %id, correct, "answer handled");
        Ok(())
    }

    /// Sends the room back to `Waiting` and resets every player.
    ///
    /// Allowed from any state. Host permission is checked by the caller.
    pub async fn reset_game(&self) -> Result<(), RoomError> {
        let delivery = {
            let mut inner = self.inner.lock().await;
            inner.status = RoomStatus::Waiting;
            inner.started_at = None;
            for player in inner.players.values_mut() {
                player.reset(self.config.quiz_length);
            }
            let list = inner.player_list_message();
            inner.delivery(vec![
                (
                    Recipient::All,
                    ServerMessage::GameReset(StatusNotice {
                        status: RoomStatus::Waiting,
                    }),
                ),
                (Recipient::All, list),
            ])
        };

        delivery.send(&self.id);
        tracing::info!(room_id = %self.id, "game reset");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Broadcast
    // -----------------------------------------------------------------

    /// Sends the ranked roster of non-host players to everyone.
    pub async fn broadcast_player_list(&self) {
        let delivery = {
            let inner = self.inner.lock().await;
            let list = inner.player_list_message();
            inner.delivery(vec![(Recipient::All, list)])
        };
        delivery.send(&self.id);
    }

    /// Sends one message to every member, best-effort.
    pub async fn broadcast(&self, msg: ServerMessage) {
        let delivery = {
            let inner = self.inner.lock().await;
            inner.delivery(vec![(Recipient::All, msg)])
        };
        delivery.send(&self.id);
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub async fn info(&self) -> RoomInfo {
        let inner = self.inner.lock().await;
        RoomInfo {
            room_id: self.id.clone(),
            status: inner.status,
            player_count: inner.players.len(),
            max_players: self.config.max_players,
            host: inner.host,
        }
    }

    pub async fn status(&self) -> RoomStatus {
        self.inner.lock().await.status
    }

    /// Time since the current round started, if one has.
    pub async fn round_elapsed(&self) -> Option<std::time::Duration> {
        self.inner.lock().await.started_at.map(|t| t.elapsed())
    }

    pub async fn player_status(&self, id: PlayerId) -> Result<PlayerSnapshot, RoomError> {
        let inner = self.inner.lock().await;
        let p = inner.players.get(&id).ok_or(RoomError::PlayerNotFound(id))?;
        Ok(PlayerSnapshot {
            id,
            name: p.name().to_string(),
            is_host: p.is_host(),
            is_ready: p.is_ready(),
            score: p.score(),
            quiz: p.engine().status(),
        })
    }

    pub async fn is_host(&self, id: PlayerId) -> Result<bool, RoomError> {
        let inner = self.inner.lock().await;
        inner
            .players
            .get(&id)
            .map(Player::is_host)
            .ok_or(RoomError::PlayerNotFound(id))
    }

    /// Current ranked roster, as `player_list` would carry it.
    pub async fn player_list(&self) -> Vec<PlayerListEntry> {
        self.inner.lock().await.player_list()
    }

    /// Members plus joins in flight. Lock-free.
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::SeqCst)
    }

    /// Marks the room retired if nobody is in it or joining it.
    ///
    /// Returns `false`, leaving the room usable, if a member or an
    /// in-flight join holds a slot.
    pub(crate) fn try_retire(&self) -> bool {
        self.retired.store(true, Ordering::SeqCst);
        if self.occupancy.load(Ordering::SeqCst) > 0 {
            self.retired.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Stops accepting joins unconditionally.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }
}

impl RoomInner {
    fn delivery(&self, outbox: Vec<(Recipient, ServerMessage)>) -> Delivery {
        Delivery {
            outbox,
            peers: self
                .players
                .values()
                .map(|p| (p.id(), p.channel().clone()))
                .collect(),
        }
    }

    /// `true` once at least one contender exists and all of them finished.
    fn round_complete(&self) -> bool {
        let mut contenders = self.players.values().filter(|p| !p.is_host()).peekable();
        contenders.peek().is_some() && contenders.all(|p| p.engine().is_finished())
    }

    fn finish(&mut self, room_id: &RoomId, outbox: &mut Vec<(Recipient, ServerMessage)>) {
        self.status = RoomStatus::Finished;
        outbox.push((
            Recipient::All,
            ServerMessage::GameEnd(StatusNotice {
                status: RoomStatus::Finished,
            }),
        ));
        outbox.push((Recipient::All, ServerMessage::GameRank(self.final_ranking())));
        tracing::info!(%room_id, "game ended");
    }

    fn contenders_by_join(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().filter(|p| !p.is_host()).collect();
        players.sort_by_key(|p| p.join_seq);
        players
    }

    /// Non-hosts by score desc, wrong answers asc, then join order.
    fn player_list(&self) -> Vec<PlayerListEntry> {
        let mut players = self.contenders_by_join();
        players.sort_by(|a, b| by_standing(a, b));
        players
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.list_entry(i + 1))
            .collect()
    }

    fn player_list_message(&self) -> ServerMessage {
        ServerMessage::PlayerList(self.player_list())
    }

    /// Non-hosts by score desc, wrong answers asc, time taken asc.
    fn final_ranking(&self) -> Vec<PlayerRank> {
        let mut ranks: Vec<PlayerRank> = self
            .contenders_by_join()
            .into_iter()
            .map(Player::rank)
            .collect();
        ranks.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.wrong_count.cmp(&b.wrong_count))
                .then(a.duration_ms.cmp(&b.duration_ms))
        });
        ranks
    }
}

/// Stable sort key for the live roster. Join order breaks remaining ties
/// because the input is already sorted by it.
fn by_standing(a: &Player, b: &Player) -> CmpOrdering {
    b.score()
        .cmp(&a.score())
        .then(a.engine().wrong_count().cmp(&b.engine().wrong_count()))
}
