//! Network transport for Colorrush.
//!
//! The server only talks to the [`Transport`] and [`Connection`] traits.
//! A connection carries opaque byte frames in both directions and
//! remembers the request target it was opened with, which is where the
//! connect parameters live.
//!
//! # Accepting is two steps
//!
//! [`Transport::accept`] only takes the raw stream off the listener and
//! hands back a [`Handshake`]. The protocol upgrade happens later, when
//! the caller awaits [`Handshake::establish`], typically on the task that
//! will own the connection:
//!
//! ```text
//! accept loop                      per-connection task
//! -----------                      -------------------
//! transport.accept()  --spawn-->   timeout(limit, pending.establish())
//! transport.accept()               conn.recv() / conn.send() / ...
//! ```
//!
//! Keeping the upgrade off the accept loop means a peer that opens a TCP
//! stream and then goes quiet only ever costs its own task. The caller
//! decides how long to wait for it.
//!
//! # Liveness
//!
//! [`Connection::ping`] writes a ping frame, and [`Connection::idle_for`]
//! reports how long ago the peer last sent anything, control frames
//! included. A caller that pings on a timer can therefore tell a live
//! but quiet peer (it answers the pings) from one that stopped reading.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport, WebSocketUpgrade};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-unique id for one accepted connection, used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Hands out the next id. Ids start at 1 and never repeat.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that yields connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer. Does not read from it.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// The bound address. Handy after binding to port 0.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted peer whose protocol handshake has not run yet.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake. Waits as long as the peer takes, so callers
    /// usually put a deadline on it. A failure only loses this one peer.
    async fn establish(self) -> Result<Self::Connection, Self::Error>;
}

/// One peer.
///
/// Methods take `&self` so a writer task, a heartbeat and the receive
/// loop can share the connection. Implementations must let a send make
/// progress while a [`recv`](Self::recv) is pending.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Waits for the next data frame. `Ok(None)` means the peer closed
    /// the connection cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Checks liveness. An error means the peer can no longer be reached.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Time since the peer last sent a frame of any kind.
    ///
    /// Only frames pulled through [`recv`](Self::recv) count, so this is
    /// meaningful while a receive loop is running.
    fn idle_for(&self) -> Duration;

    /// Starts a graceful close.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// Path and query the peer connected with, if the transport has one.
    fn request_uri(&self) -> Option<&str>;
}
