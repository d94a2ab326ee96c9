//! Wire protocol for wingduel.
//!
//! This crate defines the vocabulary clients and the server speak:
//!
//! - **Identifiers** ([`SessionId`], [`PlayerNumber`]).
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`RelayPayload`]):
//!   every frame is `{"event": "<name>", "data": <payload>}`.
//! - **Addressing** ([`Recipient`]): who inside a session gets an event.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): events to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sockets or sessions; it only
//! describes the messages.
//!
//! ```text
//! Transport (frames) → Protocol (events) → Lobby (routing)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, OpponentAction, PlayerNumber, Recipient, RelayKind, RelayPayload, ServerEvent,
    SessionId,
};
