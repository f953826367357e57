//! Integration tests for the room system: full rounds driven through
//! `PlayerHandle::handle_command`, observed through each player's
//! outbound queue.

use std::sync::Arc;

use colorrush_protocol::{ClientMessage, RoomId, RoomStatus, ServerMessage};
use colorrush_quiz::{Color, QuizStatus};
use colorrush_room::{
    OutboundReceiver, Player, PlayerChannel, PlayerHandle, Room, RoomConfig, RoomDirectory,
    RoomError,
};

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    handle: PlayerHandle,
    rx: OutboundReceiver,
}

impl Client {
    async fn join(room: &Room, name: &str, host: bool) -> Result<Self, RoomError> {
        let (channel, rx) = PlayerChannel::new(256);
        let player = Player::join(channel, name, host, room.config().quiz_length);
        let handle = room.add_player(player).await?;
        Ok(Self { handle, rx })
    }

    async fn send(&self, room: &Room, cmd: ClientMessage) -> Result<(), RoomError> {
        self.handle.handle_command(cmd, room).await
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        std::iter::from_fn(|| self.rx.try_recv()).collect()
    }

    /// The most recent `game_state` in the queue.
    fn last_state(&mut self) -> Option<QuizStatus> {
        self.drain().into_iter().rev().find_map(|m| match m {
            ServerMessage::GameState(s) => Some(s),
            _ => None,
        })
    }
}

fn kinds(msgs: &[ServerMessage]) -> Vec<&'static str> {
    msgs.iter().map(ServerMessage::kind).collect()
}

fn other_than(color: Color) -> &'static str {
    Color::PALETTE
        .iter()
        .find(|c| **c != color)
        .map(|c| c.as_str())
        .expect("palette has more than one color")
}

async fn lobby(names: &[&str]) -> (Arc<Room>, Vec<Client>) {
    let dir = RoomDirectory::default();
    let room = dir.create(RoomId::from("r1")).await.unwrap();
    let mut clients = Vec::new();
    for (i, name) in names.iter().enumerate() {
        clients.push(Client::join(&room, name, i == 0).await.unwrap());
    }
    (room, clients)
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_alice_hosts_bob_plays_to_the_end() {
    let (room, mut c) = lobby(&["Alice", "Bob"]).await;
    room.broadcast_player_list().await;

    // Bob isn't ready yet.
    assert_eq!(
        c[0].send(&room, ClientMessage::StartGame).await,
        Err(RoomError::PlayersNotReady)
    );
    // Bob can't start it himself.
    assert_eq!(
        c[1].send(&room, ClientMessage::StartGame).await,
        Err(RoomError::NotHost)
    );

    c[1].send(&room, ClientMessage::Ready(true)).await.unwrap();
    c[0].send(&room, ClientMessage::StartGame).await.unwrap();
    assert_eq!(room.status().await, RoomStatus::Playing);
    c[0].drain();

    let mut state = c[1].last_state().expect("bob gets his first quiz");
    assert_eq!(state.total_quiz, 10);
    for _ in 0..10 {
        let term = state.quiz.expect("unfinished quiz has a term");
        c[1].send(&room, ClientMessage::Answer(term.as_str().into()))
            .await
            .unwrap();
        state = c[1].last_state().expect("every answer returns a game_state");
    }

    assert!(state.is_finished);
    assert_eq!(state.progress, 10);
    assert_eq!(state.percentage, 100.0);
    assert!(state.time_used.is_some());
    assert_eq!(room.status().await, RoomStatus::Finished);

    let host_msgs = c[0].drain();
    let end = kinds(&host_msgs)
        .iter()
        .position(|k| *k == "game_end")
        .expect("host sees game_end");
    match &host_msgs[end + 1] {
        ServerMessage::GameRank(ranks) => {
            assert_eq!(ranks.len(), 1);
            assert_eq!(ranks[0].name, "Bob");
            assert_eq!(ranks[0].score, 100);
            assert!(ranks[0].is_finished);
        }
        other => panic!("expected game_rank after game_end, got {other:?}"),
    }

    // Further answers are rejected once the round is over.
    assert_eq!(
        c[1].send(&room, ClientMessage::Answer("red".into())).await,
        Err(RoomError::GameNotStarted)
    );
}

#[tokio::test]
async fn test_players_progress_independently() {
    let (room, mut c) = lobby(&["Alice", "Bob", "Carol"]).await;
    c[1].send(&room, ClientMessage::Ready(true)).await.unwrap();
    c[2].send(&room, ClientMessage::Ready(true)).await.unwrap();
    c[0].send(&room, ClientMessage::StartGame).await.unwrap();

    let bob = c[1].last_state().unwrap();
    let carol = c[2].last_state().unwrap();

    // Bob gets one wrong, then one right.
    let term = bob.quiz.unwrap();
    c[1].send(&room, ClientMessage::Answer(other_than(term).into()))
        .await
        .unwrap();
    c[1].send(&room, ClientMessage::Answer(term.as_str().into()))
        .await
        .unwrap();

    let bob_now = room.player_status(c[1].handle.id()).await.unwrap();
    assert_eq!(bob_now.quiz.progress, 1);
    assert_eq!(bob_now.quiz.wrong_count, 1);
    assert_eq!(bob_now.score, 5);

    // Carol is untouched.
    let carol_now = room.player_status(c[2].handle.id()).await.unwrap();
    assert_eq!(carol_now.quiz.progress, 0);
    assert_eq!(carol_now.quiz.wrong_count, 0);
    assert_eq!(carol_now.score, 0);
    assert_eq!(carol_now.quiz.quiz, carol.quiz);
    assert_eq!(room.status().await, RoomStatus::Playing);
}

#[tokio::test]
async fn test_reset_round_trip_clears_everything() {
    let (room, mut c) = lobby(&["Alice", "Bob", "Carol"]).await;
    for client in &c[1..] {
        client.send(&room, ClientMessage::Ready(true)).await.unwrap();
    }
    c[0].send(&room, ClientMessage::StartGame).await.unwrap();

    let state = c[1].last_state().unwrap();
    let term = state.quiz.unwrap();
    c[1].send(&room, ClientMessage::Answer(term.as_str().into()))
        .await
        .unwrap();
    c[1].send(&room, ClientMessage::Answer(other_than(term).into()))
        .await
        .unwrap();

    assert_eq!(
        c[2].send(&room, ClientMessage::GameReset).await,
        Err(RoomError::NotHost)
    );
    c[0].drain();
    c[0].send(&room, ClientMessage::GameReset).await.unwrap();

    assert_eq!(room.status().await, RoomStatus::Waiting);
    assert_eq!(kinds(&c[0].drain()), ["game_reset", "player_list"]);
    for client in &c[1..] {
        let s = room.player_status(client.handle.id()).await.unwrap();
        assert_eq!(s.quiz.progress, 0);
        assert_eq!(s.quiz.wrong_count, 0);
        assert!(!s.quiz.is_finished);
        assert!(!s.is_ready);
        assert_eq!(s.score, 0);
    }
}

#[tokio::test]
async fn test_player_list_ranking_is_sorted_and_contiguous() {
    let (room, mut c) = lobby(&["Alice", "Bob", "Carol", "Dave"]).await;
    for client in &c[1..] {
        client.send(&room, ClientMessage::Ready(true)).await.unwrap();
    }
    c[0].send(&room, ClientMessage::StartGame).await.unwrap();

    // Carol: two right. Bob: one right, one wrong. Dave: one right.
    for (idx, script) in [(2usize, "rr"), (1, "rw"), (3, "r")] {
        let mut state = c[idx].last_state().unwrap();
        for step in script.chars() {
            let term = state.quiz.unwrap();
            let answer = if step == 'r' { term.as_str() } else { other_than(term) };
            c[idx].send(&room, ClientMessage::Answer(answer.into()))
                .await
                .unwrap();
            state = c[idx].last_state().unwrap();
        }
    }

    let list = room.player_list().await;
    let names: Vec<&str> = list.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Carol", "Dave", "Bob"]);
    let ranks: Vec<usize> = list.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, [1, 2, 3]);
    assert_eq!(list[0].score, 20);
    assert_eq!(list[1].score, 10);
    assert_eq!(list[2].score, 5);
    assert!(list.iter().all(|e| e.name != "Alice"));
}

#[tokio::test]
async fn test_ties_broken_by_wrong_count() {
    let (room, mut c) = lobby(&["Alice", "Bob", "Carol"]).await;
    for client in &c[1..] {
        client.send(&room, ClientMessage::Ready(true)).await.unwrap();
    }
    c[0].send(&room, ClientMessage::StartGame).await.unwrap();

    // Bob: 3 right, 2 wrong = 20. Carol: 2 right = 20, no mistakes.
    let mut state = c[1].last_state().unwrap();
    for step in "rwrwr".chars() {
        let term = state.quiz.unwrap();
        let answer = if step == 'r' { term.as_str() } else { other_than(term) };
        c[1].send(&room, ClientMessage::Answer(answer.into())).await.unwrap();
        state = c[1].last_state().unwrap();
    }
    let mut state = c[2].last_state().unwrap();
    for _ in 0..2 {
        let term = state.quiz.unwrap();
        c[2].send(&room, ClientMessage::Answer(term.as_str().into()))
            .await
            .unwrap();
        state = c[2].last_state().unwrap();
    }

    let list = room.player_list().await;
    assert_eq!(list[0].name, "Carol");
    assert_eq!(list[1].name, "Bob");
    assert_eq!(list[0].score, list[1].score);
}

#[tokio::test]
async fn test_room_never_exceeds_capacity_under_concurrent_joins() {
    let dir = RoomDirectory::new(RoomConfig {
        max_players: 4,
        ..RoomConfig::default()
    });
    let room = dir.create(RoomId::from("r1")).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..12 {
        let room = Arc::clone(&room);
        tasks.push(tokio::spawn(async move {
            let (channel, _rx) = PlayerChannel::new(8);
            room.add_player(Player::join(channel, format!("p{i}"), i == 0, 3))
                .await
        }));
    }

    let mut joined = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => joined += 1,
            Err(e) => assert_eq!(e.code(), "ROOM_FULL"),
        }
    }
    assert_eq!(joined, 4);
    let info = room.info().await;
    assert_eq!(info.player_count, 4);
    assert!(info.host.is_some());
}

#[tokio::test]
async fn test_host_leaving_hands_off_and_everyone_hears() {
    let (room, mut c) = lobby(&["Alice", "Bob", "Carol"]).await;
    let alice = c[0].handle.id();
    c[1].drain();

    room.remove_player(alice).await.unwrap();

    assert!(room.is_host(c[1].handle.id()).await.unwrap());
    assert!(!room.is_host(c[2].handle.id()).await.unwrap());
    // The new host can now run the room.
    c[2].send(&room, ClientMessage::Ready(true)).await.unwrap();
    c[1].send(&room, ClientMessage::StartGame).await.unwrap();

    let msgs = c[1].drain();
    assert_eq!(kinds(&msgs)[0], "player_list");
    match &msgs[0] {
        ServerMessage::PlayerList(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].name, "Carol");
        }
        other => panic!("expected player_list, got {other:?}"),
    }
}

#[tokio::test]
async fn test_late_joiner_during_round_gets_a_quiz() {
    let (room, mut c) = lobby(&["Alice", "Bob"]).await;
    c[1].send(&room, ClientMessage::Ready(true)).await.unwrap();
    c[0].send(&room, ClientMessage::StartGame).await.unwrap();

    let mut late = Client::join(&room, "Carol", false).await.unwrap();
    let msgs = late.drain();
    assert_eq!(kinds(&msgs), ["welcome", "game_start", "game_state"]);

    // Bob finishing alone no longer ends the round.
    let mut state = c[1].last_state().unwrap();
    while !state.is_finished {
        let term = state.quiz.unwrap();
        c[1].send(&room, ClientMessage::Answer(term.as_str().into()))
            .await
            .unwrap();
        state = c[1].last_state().unwrap();
    }
    assert_eq!(room.status().await, RoomStatus::Playing);
}
