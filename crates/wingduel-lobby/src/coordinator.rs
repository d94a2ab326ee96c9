//! The relay router: owns the queue, the registry and every connection's
//! session membership, and turns each input into a list of [`Effect`]s.
//!
//! The coordinator is a plain synchronous value. It does no I/O and never
//! waits; the actor in `actor.rs` applies the effects it returns. That keeps
//! every rule here testable without a runtime.

use std::collections::HashMap;
use std::time::Duration;

use wingduel_protocol::{ClientEvent, PlayerNumber, ServerEvent, SessionId};
use wingduel_session::{Outbound, Session, SessionError};
use wingduel_transport::ConnectionId;

use crate::{LobbyConfig, Matchmaker, SessionRegistry};

/// The session a connection currently belongs to, and its seat there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMembership {
    pub session_id: SessionId,
    pub player_number: PlayerNumber,
}

/// Something the coordinator wants done after handling an input.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `event` to one connection.
    Send {
        to: ConnectionId,
        event: ServerEvent,
    },
    /// Call [`Coordinator::cleanup`] for `session_id` once `after` elapses.
    ScheduleCleanup {
        session_id: SessionId,
        after: Duration,
    },
}

/// Matchmaking, session lifecycle and relay in one place.
///
/// Not thread-safe by itself; it is owned by exactly one task.
#[derive(Debug)]
pub struct Coordinator {
    matchmaker: Matchmaker,
    registry: SessionRegistry,
    memberships: HashMap<ConnectionId, SessionMembership>,
    config: LobbyConfig,
}

impl Coordinator {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            matchmaker: Matchmaker::new(),
            registry: SessionRegistry::new(),
            memberships: HashMap::new(),
            config,
        }
    }

    /// A new connection arrived: queue it, tell it we're searching, then
    /// pair whoever can be paired.
    ///
    /// A connection that is already queued or seated is left as it is.
    pub fn connect(&mut self, connection: ConnectionId) -> Vec<Effect> {
        if self.memberships.contains_key(&connection) || !self.matchmaker.enqueue(connection) {
            tracing::debug!(%connection, "connect for known connection ignored");
            return Vec::new();
        }

        let mut effects = vec![Effect::Send {
            to: connection,
            event: ServerEvent::Searching,
        }];
        effects.extend(self.try_match());
        effects
    }

    /// Pairs the two longest-waiting connections until fewer than two
    /// remain, creating one session per pair. Each matched connection is
    /// told its session id and seat; the first one dequeued is player one.
    pub fn try_match(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        for (first, second) in self.matchmaker.drain_pairs() {
            let session_id = match self.registry.create(first, second) {
                Ok(session) => session.id().clone(),
                Err(e) => {
                    tracing::error!(%first, %second, error = %e, "failed to create session");
                    continue;
                }
            };

            for (connection, player_number) in
                [(first, PlayerNumber::One), (second, PlayerNumber::Two)]
            {
                self.memberships.insert(
                    connection,
                    SessionMembership {
                        session_id: session_id.clone(),
                        player_number,
                    },
                );
                effects.push(Effect::Send {
                    to: connection,
                    event: ServerEvent::Matched {
                        session_id: session_id.clone(),
                        player_number,
                    },
                });
            }
        }

        effects
    }

    /// Routes one inbound event from `connection`.
    ///
    /// Events from a connection with no session, or whose session is gone,
    /// are dropped. So is anything the session refuses (a second death, a
    /// relay after the verdict).
    pub fn handle_event(&mut self, connection: ConnectionId, event: ClientEvent) -> Vec<Effect> {
        let Some(membership) = self.memberships.get(&connection).cloned() else {
            tracing::debug!(%connection, "event without session context dropped");
            return Vec::new();
        };
        let SessionMembership {
            session_id,
            player_number,
        } = membership;

        let Some(session) = self.registry.get_mut(&session_id) else {
            tracing::debug!(%connection, %session_id, "event for unknown session dropped");
            return Vec::new();
        };

        let is_death = matches!(event, ClientEvent::Death { .. });
        let result = match event {
            ClientEvent::Ready => session.set_ready(player_number),
            ClientEvent::Death { cause } => session.handle_death(player_number, cause),
            other => match other.into_relay() {
                Ok((kind, payload)) => session
                    .relay(player_number, kind, payload)
                    .map(|routed| vec![routed]),
                Err(_) => Ok(Vec::new()),
            },
        };

        match result {
            Ok(outbound) => {
                let mut effects = deliveries(session, outbound);
                if is_death {
                    effects.push(Effect::ScheduleCleanup {
                        session_id,
                        after: self.config.grace_delay,
                    });
                }
                effects
            }
            Err(e) => {
                log_refusal(connection, &e);
                Vec::new()
            }
        }
    }

    /// `connection` went away.
    ///
    /// A queued connection simply leaves the queue. A seated connection
    /// whose session is still forming or started ends that session at
    /// once: the opponent is told and the session is cleaned up without
    /// waiting for the grace delay. If the session is already over, only
    /// this connection's membership is dropped; the scheduled cleanup
    /// takes care of the rest.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Effect> {
        if self.matchmaker.remove(connection) {
            return Vec::new();
        }

        let Some(membership) = self.memberships.get(&connection).cloned() else {
            return Vec::new();
        };

        let Some(session) = self.registry.get(&membership.session_id) else {
            self.memberships.remove(&connection);
            return Vec::new();
        };

        if !session.state().is_active() {
            self.memberships.remove(&connection);
            return Vec::new();
        }

        let opponent = session.connection(membership.player_number.other());
        tracing::info!(
            session_id = %membership.session_id,
            %connection,
            %opponent,
            "player left mid-session"
        );
        self.cleanup(&membership.session_id);

        vec![Effect::Send {
            to: opponent,
            event: ServerEvent::OpponentDisconnected,
        }]
    }

    /// Tears a session down: deregisters it and detaches both connections.
    ///
    /// Safe to call any number of times; returns `false` when the session
    /// was already gone.
    pub fn cleanup(&mut self, session_id: &SessionId) -> bool {
        let Some(session) = self.registry.remove(session_id) else {
            return false;
        };

        for connection in session.connections() {
            let belongs_here = self
                .memberships
                .get(&connection)
                .is_some_and(|m| &m.session_id == session_id);
            if belongs_here {
                self.memberships.remove(&connection);
            }
        }

        tracing::info!(%session_id, "session cleaned up");
        true
    }

    /// Number of connections waiting for an opponent.
    pub fn waiting_len(&self) -> usize {
        self.matchmaker.len()
    }

    /// The waiting connections, oldest first.
    pub fn waiting(&self) -> Vec<ConnectionId> {
        self.matchmaker.waiting().collect()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.registry.get(id)
    }

    pub fn membership(&self, connection: ConnectionId) -> Option<&SessionMembership> {
        self.memberships.get(&connection)
    }
}

/// Resolves session-relative recipients to connection sends.
fn deliveries(session: &Session, outbound: Outbound) -> Vec<Effect> {
    outbound
        .into_iter()
        .flat_map(|(recipient, event)| {
            session
                .resolve(recipient)
                .into_iter()
                .map(move |to| Effect::Send {
                    to,
                    event: event.clone(),
                })
        })
        .collect()
}

fn log_refusal(connection: ConnectionId, error: &SessionError) {
    match error {
        SessionError::AlreadyOver(_) => {
            tracing::debug!(%connection, %error, "event after game over ignored");
        }
        _ => tracing::debug!(%connection, %error, "event refused by session"),
    }
}
