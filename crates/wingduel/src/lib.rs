//! # Wingduel
//!
//! Matchmaking and relay server for two-player real-time duels.
//!
//! Clients connect over WebSocket, wait in a FIFO queue, and are paired
//! into sessions. Inside a session the server relays gameplay events
//! between the two players and is the sole authority on who won.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wingduel::prelude::*;
//!
//! # async fn run() -> Result<(), WingduelError> {
//! let server = WingduelServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::WingduelError;
pub use server::{WingduelServer, WingduelServerBuilder};

/// Everything needed to embed and drive a server.
pub mod prelude {
    pub use crate::{WingduelError, WingduelServer, WingduelServerBuilder};
    pub use wingduel_lobby::{CoordinatorHandle, LobbyConfig, LobbyStats};
    pub use wingduel_protocol::{ClientEvent, PlayerNumber, ServerEvent, SessionId};
}
