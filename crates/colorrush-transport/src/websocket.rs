//! WebSocket transport built on `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use crate::{Connection, ConnectionId, Handshake, Transport, TransportError};

type Socket = WebSocketStream<TcpStream>;

/// Listens on a TCP port. Each accepted stream becomes a
/// [`WebSocketUpgrade`].
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::Listener)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Pending = WebSocketUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<WebSocketUpgrade, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        tracing::trace!(%peer, "TCP stream accepted");
        Ok(WebSocketUpgrade { stream, peer })
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Listener)
    }
}

/// A TCP stream waiting for its HTTP upgrade request.
pub struct WebSocketUpgrade {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Handshake for WebSocketUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn establish(self) -> Result<WebSocketConnection, TransportError> {
        // Connect parameters ride on the upgrade request's query string.
        let mut request_uri = None;
        let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            request_uri = Some(req.uri().to_string());
            Ok(resp)
        };
        let socket = tokio_tungstenite::accept_hdr_async(self.stream, capture)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let conn = WebSocketConnection::new(socket, request_uri);
        tracing::debug!(conn_id = %conn.id, peer = %self.peer, uri = ?conn.request_uri, "WebSocket upgraded");
        Ok(conn)
    }
}

/// An upgraded WebSocket.
///
/// Reads and writes go through separate halves with separate locks, so a
/// parked [`recv`](Connection::recv) never holds up a send or a ping.
pub struct WebSocketConnection {
    id: ConnectionId,
    request_uri: Option<String>,
    writer: Mutex<SplitSink<Socket, Message>>,
    reader: Mutex<SplitStream<Socket>>,
    opened: Instant,
    /// Milliseconds after `opened` at which the last frame arrived.
    last_seen_ms: AtomicU64,
}

impl WebSocketConnection {
    fn new(socket: Socket, request_uri: Option<String>) -> Self {
        let (writer, reader) = socket.split();
        Self {
            id: ConnectionId::next(),
            request_uri,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            opened: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
        }
    }

    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::Disconnected(e.to_string()))
    }

    fn touch(&self) {
        let now = u64::try_from(self.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_seen_ms.store(now, Ordering::Relaxed);
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Browsers expect JSON as text frames, so valid UTF-8 goes out as
    /// text and anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.write(msg).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut reader = self.reader.lock().await;
        while let Some(frame) = reader.next().await {
            let frame = frame.map_err(|e| TransportError::Disconnected(e.to_string()))?;
            self.touch();
            match frame {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(_) => return Ok(None),
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.write(Message::Ping(Default::default())).await
    }

    fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.opened.elapsed().saturating_sub(last_seen)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Disconnected(e.to_string()))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn request_uri(&self) -> Option<&str> {
        self.request_uri.as_deref()
    }
}
