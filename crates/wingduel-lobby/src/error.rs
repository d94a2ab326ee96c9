//! Error types for the lobby layer.

use wingduel_transport::ConnectionId;

/// Errors surfaced by the coordinator handle.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The coordinator task has stopped (shutdown, or every handle to it
    /// was dropped).
    #[error("coordinator is unavailable")]
    Unavailable,

    /// A connection id was registered twice.
    #[error("connection {0} is already registered")]
    AlreadyConnected(ConnectionId),
}
