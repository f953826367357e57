use std::io;

/// Failures below the protocol layer: sockets and the WebSocket upgrade.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be bound or queried.
    #[error("listener unavailable: {0}")]
    Listener(#[source] io::Error),

    /// Accepting a TCP stream failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The TCP stream was accepted but the WebSocket upgrade failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer is gone, or the socket broke mid-frame.
    #[error("connection lost: {0}")]
    Disconnected(String),
}
