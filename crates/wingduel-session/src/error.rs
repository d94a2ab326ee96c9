//! Error types for the session layer.

use wingduel_protocol::SessionId;
use wingduel_transport::ConnectionId;

/// Reasons a session refuses an operation.
///
/// None of these are fatal. The lobby logs them and drops the triggering
/// event; clients never see them.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The operation needs a started game (e.g. a death report while
    /// players are still readying up).
    #[error("session {0} has not started")]
    NotStarted(SessionId),

    /// The session already has a winner and accepts nothing further.
    #[error("session {0} is already over")]
    AlreadyOver(SessionId),

    /// Both seats were given the same connection.
    #[error("connection {0} cannot be matched against itself")]
    SelfMatch(ConnectionId),
}
