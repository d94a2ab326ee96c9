//! Matchmaking and relay for wingduel.
//!
//! All shared mutable state (the waiting queue, the session registry and
//! the connection → session side map) is owned by one [`Coordinator`].
//! In a running server the coordinator lives inside a single Tokio task
//! and is driven through a [`CoordinatorHandle`], so every connect, event,
//! disconnect and timer firing is handled to completion before the next.
//!
//! # Key types
//!
//! - [`Matchmaker`]: FIFO queue of connections awaiting an opponent
//! - [`SessionRegistry`]: live sessions by id
//! - [`Coordinator`]: the relay router; turns inputs into [`Effect`]s
//! - [`CoordinatorHandle`]: send commands to the running coordinator task
//! - [`LobbyConfig`]: grace delay and channel sizing

mod actor;
mod config;
mod coordinator;
mod error;
mod matchmaker;
mod registry;

pub use actor::{CoordinatorHandle, EventSender, LobbyStats, spawn_coordinator};
pub use config::LobbyConfig;
pub use coordinator::{Coordinator, Effect, SessionMembership};
pub use error::LobbyError;
pub use matchmaker::Matchmaker;
pub use registry::SessionRegistry;
