//! Coordinator actor: the single Tokio task that owns the [`Coordinator`].
//!
//! Connection handlers never touch lobby state directly. They send
//! commands through a [`CoordinatorHandle`]; the actor processes them one
//! at a time, applies the resulting effects, and owns the outbound channel
//! of every connected client plus the pending cleanup timers.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use wingduel_protocol::{ClientEvent, ServerEvent, SessionId};
use wingduel_session::SessionInfo;
use wingduel_transport::ConnectionId;

use crate::{Coordinator, Effect, LobbyConfig, LobbyError};

/// Channel sender for delivering outbound events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to the coordinator task.
enum Command {
    Connect {
        connection: ConnectionId,
        sender: EventSender,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    Event {
        connection: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        connection: ConnectionId,
    },
    CleanupDue {
        session_id: SessionId,
    },
    Stats {
        reply: oneshot::Sender<LobbyStats>,
    },
    SessionInfo {
        session_id: SessionId,
        reply: oneshot::Sender<Option<SessionInfo>>,
    },
    Shutdown,
}

/// Counters describing the lobby at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LobbyStats {
    /// Connections waiting for an opponent.
    pub waiting: usize,
    /// Registered sessions, including finished ones awaiting cleanup.
    pub sessions: usize,
    /// Connections with a live outbound channel.
    pub connections: usize,
    /// Cleanup timers not yet fired.
    pub pending_cleanups: usize,
}

/// Handle to the running coordinator. Cheap to clone.
///
/// The coordinator stops when [`shutdown`](Self::shutdown) is called or
/// when every handle has been dropped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Registers a new connection and its outbound channel, then queues it
    /// for matchmaking.
    pub async fn connect(
        &self,
        connection: ConnectionId,
        sender: EventSender,
    ) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Connect {
            connection,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)?
    }

    /// Delivers one inbound client event (fire-and-forget).
    pub async fn dispatch(
        &self,
        connection: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), LobbyError> {
        self.send(Command::Event { connection, event }).await
    }

    /// Reports that a connection has gone away.
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<(), LobbyError> {
        self.send(Command::Disconnect { connection }).await
    }

    pub async fn stats(&self) -> Result<LobbyStats, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Stats { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Snapshot of a registered session, `None` once it has been cleaned up.
    pub async fn session_info(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionInfo>, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::SessionInfo {
            session_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Stops the coordinator. Pending cleanup timers are cancelled and all
    /// outbound channels are closed.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }
}

/// The task-side state.
struct CoordinatorActor {
    core: Coordinator,
    outbound: HashMap<ConnectionId, EventSender>,
    timers: HashMap<SessionId, JoinHandle<()>>,
    receiver: mpsc::Receiver<Command>,
    /// Lets timers post back without keeping the channel open.
    loopback: mpsc::WeakSender<Command>,
}

impl CoordinatorActor {
    async fn run(mut self) {
        tracing::info!("coordinator started");

        while let Some(cmd) = self.receiver.recv().await {
            if !self.handle(cmd) {
                break;
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        tracing::info!("coordinator stopped");
    }

    /// Processes one command. Returns `false` to stop the loop.
    fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Connect {
                connection,
                sender,
                reply,
            } => {
                if self.outbound.contains_key(&connection) {
                    let _ = reply.send(Err(LobbyError::AlreadyConnected(connection)));
                    return true;
                }
                self.outbound.insert(connection, sender);
                tracing::info!(%connection, "player connected");
                let effects = self.guarded("connect", |core| core.connect(connection));
                self.apply(effects);
                let _ = reply.send(Ok(()));
            }
            Command::Event { connection, event } => {
                let effects = self.guarded("event", |core| core.handle_event(connection, event));
                self.apply(effects);
            }
            Command::Disconnect { connection } => {
                tracing::info!(%connection, "player disconnected");
                let effects = self.guarded("disconnect", |core| core.disconnect(connection));
                self.apply(effects);
                self.outbound.remove(&connection);
            }
            Command::CleanupDue { session_id } => {
                self.timers.remove(&session_id);
                let _ = self.guarded("cleanup", |core| {
                    core.cleanup(&session_id);
                    Vec::new()
                });
            }
            Command::Stats { reply } => {
                let _ = reply.send(LobbyStats {
                    waiting: self.core.waiting_len(),
                    sessions: self.core.session_count(),
                    connections: self.outbound.len(),
                    pending_cleanups: self.timers.len(),
                });
            }
            Command::SessionInfo { session_id, reply } => {
                let _ = reply.send(self.core.session(&session_id).map(|s| s.info()));
            }
            Command::Shutdown => {
                tracing::info!("coordinator shutting down");
                return false;
            }
        }
        true
    }

    /// Runs one coordinator call, containing any panic to this command so
    /// the dispatch loop keeps serving every other session.
    fn guarded<F>(&mut self, what: &'static str, f: F) -> Vec<Effect>
    where
        F: FnOnce(&mut Coordinator) -> Vec<Effect>,
    {
        let core = &mut self.core;
        match catch_unwind(AssertUnwindSafe(|| f(core))) {
            Ok(effects) => effects,
            Err(_) => {
                tracing::error!(command = what, "coordinator fault while handling command");
                Vec::new()
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, event } => {
                    // A closed channel means the writer is gone; its
                    // disconnect is already on the way.
                    if let Some(sender) = self.outbound.get(&to) {
                        let _ = sender.send(event);
                    }
                }
                Effect::ScheduleCleanup { session_id, after } => {
                    self.schedule_cleanup(session_id, after);
                }
            }
        }
    }

    fn schedule_cleanup(&mut self, session_id: SessionId, after: Duration) {
        let loopback = self.loopback.clone();
        let id = session_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(sender) = loopback.upgrade() {
                let _ = sender.send(Command::CleanupDue { session_id: id }).await;
            }
        });
        tracing::debug!(%session_id, delay = ?after, "cleanup scheduled");
        if let Some(previous) = self.timers.insert(session_id, timer) {
            previous.abort();
        }
    }
}

/// Spawns the coordinator task and returns a handle to it.
pub fn spawn_coordinator(config: LobbyConfig) -> CoordinatorHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = CoordinatorActor {
        core: Coordinator::new(config),
        outbound: HashMap::new(),
        timers: HashMap::new(),
        receiver: rx,
        loopback: tx.downgrade(),
    };

    tokio::spawn(actor.run());

    CoordinatorHandle { sender: tx }
}
