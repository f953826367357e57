//! `ColorRushServer` builder and server loop.
//!
//! This is the entry point for running a Colorrush server. It ties the
//! layers together: transport → protocol → room.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use colorrush_protocol::{Codec, JsonCodec};
use colorrush_room::{RoomConfig, RoomDirectory};
use colorrush_transport::{Transport, WebSocketTransport};

use crate::ColorRushError;
use crate::handler::handle_connection;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Server-wide settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Settings for rooms created by this server.
    pub room: RoomConfig,

    /// How often each connection is pinged.
    pub heartbeat_interval: Duration,

    /// Undelivered messages a connection may fall behind by before it is
    /// dropped.
    pub outbound_capacity: usize,

    /// Longest a single socket write or ping may take before the peer is
    /// considered stuck.
    pub write_timeout: Duration,

    /// How long a new TCP stream gets to complete its WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room: RoomConfig::default(),
            heartbeat_interval: Duration::from_secs(30),
            outbound_capacity: 64,
            write_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Arc<RoomDirectory>,
    pub(crate) codec: C,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) outbound_capacity: usize,
    pub(crate) write_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a Colorrush server.
///
/// # Example
///
/// ```rust,no_run
/// use colorrush::prelude::*;
///
/// # async fn start() -> Result<(), ColorRushError> {
/// let server = ColorRushServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ColorRushServerBuilder {
    config: ServerConfig,
    directory: Option<Arc<RoomDirectory>>,
}

impl ColorRushServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            directory: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration for new rooms. Ignored when a directory is
    /// supplied with [`directory`](Self::directory).
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Uses an existing room directory instead of creating one.
    pub fn directory(mut self, directory: Arc<RoomDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Validates the room settings and binds the listener.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// [`RoomError::InvalidConfig`](colorrush_room::RoomError::InvalidConfig)
    /// if rounds could never be played under the room settings in effect,
    /// or a transport error if the address can't be bound.
    pub async fn build(self) -> Result<ColorRushServer<JsonCodec>, ColorRushError> {
        let rooms = self
            .directory
            .unwrap_or_else(|| Arc::new(RoomDirectory::new(self.config.room.clone())));
        rooms.config().validate()?;
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms,
            codec: JsonCodec,
            heartbeat_interval: self.config.heartbeat_interval,
            outbound_capacity: self.config.outbound_capacity,
            write_timeout: self.config.write_timeout,
            handshake_timeout: self.config.handshake_timeout,
        });

        Ok(ColorRushServer { transport, state })
    }
}

impl Default for ColorRushServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound Colorrush server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ColorRushServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl ColorRushServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ColorRushServerBuilder {
        ColorRushServerBuilder::new()
    }
}

impl<C: Codec> ColorRushServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ColorRushError> {
        Ok(self.transport.local_addr()?)
    }

    /// The room directory shared by every connection.
    pub fn directory(&self) -> Arc<RoomDirectory> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ColorRushError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// The loop only takes streams off the listener. Each stream's
    /// WebSocket upgrade runs on its own task, so a peer that never sends
    /// its upgrade request cannot hold up anyone else. Connections already
    /// accepted keep running on their own tasks.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ColorRushError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Colorrush server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        // Stop listening before sweeping rooms.
        drop(self.transport);
        let evicted = self.state.rooms.evict_empty().await;
        tracing::info!(evicted, "Colorrush server stopped");
        Ok(())
    }
}
