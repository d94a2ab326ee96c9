//! Unified error type for the wingduel server.

use wingduel_lobby::LobbyError;
use wingduel_protocol::ProtocolError;
use wingduel_session::SessionError;
use wingduel_transport::TransportError;

/// Top-level error that wraps every layer's error.
#[derive(Debug, thiserror::Error)]
pub enum WingduelError {
    /// Socket-level failure (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session refused a transition.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The coordinator rejected a request or is gone.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}
