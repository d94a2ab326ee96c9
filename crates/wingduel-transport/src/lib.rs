//! Connection abstraction for wingduel.
//!
//! The lobby only ever sees a [`ConnectionId`]. Sockets live behind the
//! [`Transport`] (listener side), [`Incoming`] (an accepted peer still
//! handshaking) and [`Connection`] (one client) traits, so matching and
//! relay never depend on a particular wire.
//!
//! Accepting and upgrading are separate steps: `accept` returns as soon as
//! the peer is on the socket, and the caller runs [`Incoming::upgrade`] on
//! its own task so one slow handshake never holds up the listener.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] over `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_UPGRADE_TIMEOUT, PendingWebSocket, WebSocketConnection, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique handle for one client connection.
///
/// Ids are handed out as upgrades complete, so they also sort by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a client sent, as far as the server cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An application payload.
    Data(Vec<u8>),
    /// A keepalive (ping or pong). Carries nothing but proves the peer is
    /// still there.
    Heartbeat,
}

/// Listener side: produces one [`Incoming`] per client.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer. Does not wait for its handshake.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address actually bound (useful after binding port 0).
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted peer that has not finished its handshake yet.
pub trait Incoming: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Completes the handshake, or fails if the peer stalls or speaks the
    /// wrong protocol.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// One client: a bidirectional stream of frames.
///
/// Every method takes `&self`. The server parks a reader task in
/// [`recv`](Self::recv) while a separate writer task calls
/// [`send`](Self::send), so implementations must not serialize the two.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next frame from the client, or `Ok(None)` once it has closed.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Asks the client to prove it is alive. The answer comes back through
    /// [`recv`](Self::recv) as [`Frame::Heartbeat`].
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
