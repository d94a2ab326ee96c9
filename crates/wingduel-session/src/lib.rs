//! Two-player session (room) state machine for wingduel.
//!
//! A [`Session`] is created the moment the matchmaker pairs two
//! connections. It tracks each seat's ready/alive/score flags and the
//! shared match parameters, and it is the single place where a match's
//! outcome is decided.
//!
//! ```text
//! Forming ──(both ready)──→ Started ──(death)──→ Over
//! ```
//!
//! Sessions never touch sockets. Every transition returns the events it
//! produces as `(Recipient, ServerEvent)` pairs and the lobby delivers
//! them.

mod error;
mod session;
mod state;

pub use error::SessionError;
pub use session::{Outbound, PlayerSlot, Session, SessionInfo};
pub use state::SessionState;
