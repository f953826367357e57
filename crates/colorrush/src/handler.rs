//! Per-connection handler: connect parameters, join, and command routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Read `room_id`, `player_name`, `is_host` from the upgrade URI
//!   2. Find the room (or create it, for a host) and join it
//!   3. Spawn a writer task that drains the player's outbound queue
//!   4. Loop: receive frames → decode → dispatch, pinging on a timer
//!
//! The WebSocket upgrade itself also runs here, under a deadline, rather
//! than on the accept loop.
//!
//! Leaving the loop for any reason, including a panic, drops the
//! `ConnectionGuard`, which removes the player and evicts the room if
//! it is now empty.

use std::sync::Arc;
use std::time::Duration;

use colorrush_protocol::{ClientMessage, Codec, PlayerId, RoomId, ServerMessage};
use colorrush_room::{OutboundReceiver, Player, PlayerChannel, PlayerHandle, Room, RoomError};
use colorrush_transport::{
    Connection, Handshake, TransportError, WebSocketConnection, WebSocketUpgrade,
};

use crate::ColorRushError;
use crate::server::ServerState;

// ---------------------------------------------------------------------------
// Connect parameters
// ---------------------------------------------------------------------------

/// What a client asks for when it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub room_id: RoomId,
    pub player_name: String,
    /// `true` only for `is_host=true`.
    pub is_host: bool,
}

impl ConnectParams {
    /// Parses the query string of a request target such as
    /// `/ws?room_id=r1&player_name=Alice&is_host=true`.
    ///
    /// Values are percent-decoded and trimmed. Unknown keys are ignored.
    ///
    /// # Errors
    /// [`ColorRushError::InvalidParams`] if `room_id` or `player_name` is
    /// missing or blank, or a value is not valid UTF-8 once decoded.
    pub fn from_uri(uri: &str) -> Result<Self, ColorRushError> {
        let query = uri.split_once('?').map_or("", |(_, q)| q);

        let mut room_id = None;
        let mut player_name = None;
        let mut is_host = false;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            match key {
                "room_id" => room_id = Some(value),
                "player_name" => player_name = Some(value),
                "is_host" => is_host = value == "true",
                _ => {}
            }
        }

        let room_id = room_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ColorRushError::InvalidParams("room_id is required".into()))?;
        let player_name = player_name
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ColorRushError::InvalidParams("player_name is required".into()))?;

        Ok(Self {
            room_id: RoomId::from(room_id),
            player_name,
            is_host,
        })
    }
}

fn decode_component(raw: &str) -> Result<String, ColorRushError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|v| v.trim().to_string())
        .map_err(|e| ColorRushError::InvalidParams(e.to_string()))
}

// ---------------------------------------------------------------------------
// Cleanup guard
// ---------------------------------------------------------------------------

/// Drop guard that removes the player from its room when the handler exits.
///
/// This ensures cleanup happens exactly once even if the handler panics.
/// Since `Drop` is synchronous, the async part runs on a spawned task.
struct ConnectionGuard<C: Codec> {
    player_id: PlayerId,
    room: Arc<Room>,
    channel: PlayerChannel,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        self.channel.close();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let player_id = self.player_id;
        let room = Arc::clone(&self.room);
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            if let Err(error) = room.remove_player(player_id).await {
                tracing::error!(room_id = %room.id(), %player_id, %error, "cleanup failed");
            }
            state.rooms.evict_if_empty(room.id()).await;
        });
    }
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Silent heartbeat periods tolerated before a peer counts as gone.
const MISSED_HEARTBEATS: u32 = 2;

/// Handles a single connection from accept to close.
///
/// # Liveness
///
/// A connection can go bad in ways that never surface as a read error:
/// the peer stops reading, its TCP window fills up, and every write
/// parks forever. Three things keep such a peer from lingering in its
/// room, where it would block the round from completing:
///
/// - The read loop watches the player's [`PlayerChannel`]. When the
///   room overflows the outbound queue, the channel closes and the loop
///   exits on the spot, without waiting on the socket.
/// - Every socket write and every ping runs under
///   [`write_timeout`](crate::ServerConfig::write_timeout). A write that
///   cannot complete in time ends the connection.
/// - Each heartbeat tick checks when the peer last sent anything. A
///   WebSocket client answers pings automatically, so a peer that has
///   been silent for [`MISSED_HEARTBEATS`] periods is not reading.
///
/// The player is removed as soon as the loop exits. Draining the writer
/// and closing the socket happen afterwards, each bounded by the same
/// timeout.
pub(crate) async fn handle_connection<C: Codec>(
    pending: WebSocketUpgrade,
    state: Arc<ServerState<C>>,
) -> Result<(), ColorRushError> {
    let peer = pending.peer_addr();
    let conn = match tokio::time::timeout(state.handshake_timeout, pending.establish()).await {
        Ok(Ok(conn)) => Arc::new(conn),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            tracing::debug!(%peer, "WebSocket upgrade timed out");
            return Err(TransportError::Handshake(format!(
                "no upgrade request within {:?}",
                state.handshake_timeout
            ))
            .into());
        }
    };
    let conn_id = conn.id();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    // --- Step 1: connect parameters ---
    let params = match ConnectParams::from_uri(conn.request_uri().unwrap_or("")) {
        Ok(params) => params,
        Err(e) => {
            reject(&conn, &state, &e).await;
            return Err(e);
        }
    };

    // --- Step 2: room and join ---
    let (room, handle, channel, outbound) = match join(&state, &params).await {
        Ok(joined) => joined,
        Err(e) => {
            reject(&conn, &state, &e).await;
            return Err(e);
        }
    };
    let guard = ConnectionGuard {
        player_id: handle.id(),
        room: Arc::clone(&room),
        channel: channel.clone(),
        state: Arc::clone(&state),
    };
    tracing::info!(
        %conn_id,
        room_id = %room.id(),
        player_id = %handle.id(),
        "player connected"
    );

    // --- Step 3: writer ---
    let mut writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        outbound,
        channel.clone(),
        Arc::clone(&state),
    ));
    room.broadcast_player_list().await;

    // --- Step 4: read loop ---
    // `interval` panics on a zero period.
    let period = state.heartbeat_interval.max(Duration::from_millis(1));
    let mut heartbeat = tokio::time::interval(period);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, player_id = %handle.id(), "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, player_id = %handle.id(), error = %e, "recv error");
                        break;
                    }
                };
                let should_close = handle_frame(&data, &handle, &room, &channel, &state.codec).await;
                if should_close {
                    break;
                }
            }
            () = channel.closed() => {
                tracing::info!(%conn_id, player_id = %handle.id(), "outbound channel closed");
                break;
            }
            _ = heartbeat.tick() => {
                let idle = conn.idle_for();
                if idle > period * MISSED_HEARTBEATS {
                    tracing::info!(%conn_id, player_id = %handle.id(), ?idle, "heartbeat missed");
                    break;
                }
                match tokio::time::timeout(state.write_timeout, conn.ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::info!(%conn_id, player_id = %handle.id(), error = %e, "heartbeat failed");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%conn_id, player_id = %handle.id(), "heartbeat stalled");
                        break;
                    }
                }
            }
        }
    }

    // Removal fires now; the socket may still be stuck.
    drop(guard);
    if tokio::time::timeout(state.write_timeout, &mut writer).await.is_err() {
        writer.abort();
    }
    let _ = tokio::time::timeout(state.write_timeout, conn.close()).await;
    Ok(())
}

type Joined = (Arc<Room>, PlayerHandle, PlayerChannel, OutboundReceiver);

/// Finds or creates the room and adds a new player to it.
///
/// Only a host may create a room. A failed join leaves no empty room
/// behind.
async fn join<C: Codec>(
    state: &ServerState<C>,
    params: &ConnectParams,
) -> Result<Joined, ColorRushError> {
    let room = if params.is_host {
        state.rooms.get_or_create(params.room_id.clone()).await
    } else {
        state.rooms.get(&params.room_id).await?
    };
    enter(state, params, room).await
}

/// Adds the player to `room`.
///
/// A host can be handed a room that is being evicted at that very moment,
/// in which case the room refuses the join. One more lookup then yields a
/// fresh room under the same id.
async fn enter<C: Codec>(
    state: &ServerState<C>,
    params: &ConnectParams,
    room: Arc<Room>,
) -> Result<Joined, ColorRushError> {
    match admit(state, params, room).await {
        Err(ColorRushError::Room(RoomError::RoomNotFound(_))) if params.is_host => {
            tracing::debug!(room_id = %params.room_id, "room retired during host join, retrying");
            let room = state.rooms.get_or_create(params.room_id.clone()).await;
            admit(state, params, room).await
        }
        other => other,
    }
}

async fn admit<C: Codec>(
    state: &ServerState<C>,
    params: &ConnectParams,
    room: Arc<Room>,
) -> Result<Joined, ColorRushError> {
    let (channel, outbound) = PlayerChannel::new(state.outbound_capacity);
    let player = Player::join(
        channel.clone(),
        params.player_name.clone(),
        params.is_host,
        room.config().quiz_length,
    );
    match room.add_player(player).await {
        Ok(handle) => Ok((room, handle, channel, outbound)),
        Err(e) => {
            state.rooms.evict_if_empty(room.id()).await;
            Err(e.into())
        }
    }
}

/// Decodes and dispatches one frame. Returns `true` if the connection
/// should close.
async fn handle_frame<C: Codec>(
    data: &[u8],
    handle: &PlayerHandle,
    room: &Room,
    channel: &PlayerChannel,
    codec: &C,
) -> bool {
    let cmd = match ClientMessage::decode(codec, data) {
        Ok(cmd) => cmd,
        Err(e) => {
            tracing::debug!(player_id = %handle.id(), error = %e, "failed to decode command");
            report(channel, e.code(), &e.to_string());
            return false;
        }
    };

    match handle.handle_command(cmd, room).await {
        Ok(()) => false,
        Err(RoomError::PlayerNotFound(player_id)) => {
            tracing::error!(room_id = %room.id(), %player_id, "player missing from its own room");
            true
        }
        Err(e) => {
            tracing::debug!(player_id = %handle.id(), error = %e, "command rejected");
            report(channel, e.code(), &e.to_string());
            false
        }
    }
}

/// Queues an `error` message for this connection only.
fn report(channel: &PlayerChannel, code: &str, message: &str) {
    if let Err(error) = channel.send(ServerMessage::error(code, message)) {
        tracing::debug!(%error, code, "could not report error");
    }
}

/// Drains the outbound queue onto the socket until the channel closes or
/// a write fails or times out.
async fn write_outbound<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut outbound: OutboundReceiver,
    channel: PlayerChannel,
    state: Arc<ServerState<C>>,
) {
    while let Some(msg) = outbound.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(kind = msg.kind(), %error, "failed to encode outbound message");
                continue;
            }
        };
        match tokio::time::timeout(state.write_timeout, conn.send(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!(conn_id = %conn.id(), %error, "write failed");
                channel.close();
                break;
            }
            Err(_) => {
                tracing::info!(conn_id = %conn.id(), "write timed out, peer is not reading");
                channel.close();
                break;
            }
        }
    }
}

/// Tells a connection why it can't join, then closes it.
async fn reject<C: Codec>(conn: &WebSocketConnection, state: &ServerState<C>, error: &ColorRushError) {
    tracing::info!(conn_id = %conn.id(), %error, "rejecting connection");
    match state.codec.encode(&ServerMessage::error(error.code(), error.to_string())) {
        Ok(bytes) => match tokio::time::timeout(state.write_timeout, conn.send(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(conn_id = %conn.id(), error = %e, "could not send rejection"),
            Err(_) => tracing::debug!(conn_id = %conn.id(), "rejection write timed out"),
        },
        Err(e) => tracing::error!(error = %e, "failed to encode rejection"),
    }
    let _ = tokio::time::timeout(state.write_timeout, conn.close()).await;
}
