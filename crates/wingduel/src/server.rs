//! `WingduelServer` builder and accept loop.
//!
//! This ties the layers together: transport → protocol → lobby.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use wingduel_lobby::{CoordinatorHandle, LobbyConfig, spawn_coordinator};
use wingduel_protocol::JsonCodec;
use wingduel_transport::{DEFAULT_UPGRADE_TIMEOUT, Incoming, Transport, WebSocketTransport};

use crate::WingduelError;
use crate::handler::handle_connection;

/// How long a connection may stay silent before it is dropped. Pongs
/// count, so a client that answers pings is never idle.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often each client is pinged.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Shared state handed to every connection task.
pub(crate) struct ServerState {
    pub(crate) coordinator: CoordinatorHandle,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
    pub(crate) heartbeat_interval: Duration,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// let server = WingduelServer::builder()
///     .bind("0.0.0.0:3000")
///     .lobby_config(LobbyConfig::with_grace_delay(Duration::from_secs(3)))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct WingduelServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
    idle_timeout: Duration,
    heartbeat_interval: Duration,
    upgrade_timeout: Duration,
}

impl WingduelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            lobby_config: LobbyConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            upgrade_timeout: DEFAULT_UPGRADE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the matchmaking and cleanup configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Sets how long a connection may go without sending a frame.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how often clients are pinged. Keep it well under the idle
    /// timeout or quiet clients get dropped.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets how long a new peer gets to finish the WebSocket handshake.
    pub fn upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.upgrade_timeout = timeout;
        self
    }

    /// Binds the listener and starts the coordinator task.
    pub async fn build(self) -> Result<WingduelServer, WingduelError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_upgrade_timeout(self.upgrade_timeout);
        let coordinator = spawn_coordinator(self.lobby_config);

        let state = Arc::new(ServerState {
            coordinator,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            heartbeat_interval: self.heartbeat_interval,
        });

        Ok(WingduelServer { transport, state })
    }
}

impl Default for WingduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, ready-to-run server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct WingduelServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl WingduelServer {
    pub fn builder() -> WingduelServerBuilder {
        WingduelServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, WingduelError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle to the coordinator, for inspection (see
    /// [`CoordinatorHandle::stats`]).
    pub fn coordinator(&self) -> CoordinatorHandle {
        self.state.coordinator.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), WingduelError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops the
    /// coordinator. Stopping the coordinator closes every client's
    /// outbound channel, which in turn closes their sockets.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), WingduelError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("wingduel server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        // The handshake runs here, off the accept loop.
                        tokio::spawn(async move {
                            let peer = incoming.peer_addr();
                            let conn = match incoming.upgrade().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("wingduel server shutting down");
        // Already stopped is fine.
        let _ = self.state.coordinator.shutdown().await;
        Ok(())
    }
}
