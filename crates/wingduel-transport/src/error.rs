//! Error types for the transport layer.

use std::net::SocketAddr;

use crate::ConnectionId;

/// Socket-level failures.
///
/// Per-connection variants carry the [`ConnectionId`] so the handler can
/// log them without extra context; any of them means the connection is
/// gone.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound, or its address could not be read.
    #[error("listener on {addr}: {source}")]
    Listener {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP accept itself failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// A peer connected but never completed the WebSocket upgrade.
    #[error("upgrade from {peer} failed: {reason}")]
    Upgrade { peer: SocketAddr, reason: String },

    #[error("send to {connection} failed: {reason}")]
    Send {
        connection: ConnectionId,
        reason: String,
    },

    #[error("receive from {connection} failed: {reason}")]
    Receive {
        connection: ConnectionId,
        reason: String,
    },
}
