//! The process-wide table of live sessions.

use std::collections::HashMap;

use rand::Rng;
use wingduel_protocol::SessionId;
use wingduel_session::{Session, SessionError};
use wingduel_transport::ConnectionId;

/// Upper bound (exclusive) for session seeds.
const SEED_RANGE: u32 = 1_000_000;

/// Live sessions keyed by id.
///
/// Entries are added when a pair is matched and removed by cleanup. No
/// two live sessions share an id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a session seating `first` as player one and
    /// `second` as player two, with a fresh id and seed.
    ///
    /// # Errors
    /// [`SessionError::SelfMatch`] if both connections are the same.
    pub fn create(
        &mut self,
        first: ConnectionId,
        second: ConnectionId,
    ) -> Result<&Session, SessionError> {
        let id = self.unused_id();
        let seed = rand::rng().random_range(0..SEED_RANGE);
        let session = Session::new(id.clone(), first, second, seed)?;

        tracing::info!(
            session_id = %id,
            player_one = %first,
            player_two = %second,
            "session created"
        );
        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Draws ids until one is not in use. With 64 random bits a retry is
    /// practically never needed.
    fn unused_id(&self) -> SessionId {
        loop {
            let id = generate_session_id();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Removes a session, returning it if it was registered.
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// 64 random bits as 16 lowercase hex characters.
fn generate_session_id() -> SessionId {
    let bytes: [u8; 8] = rand::rng().random();
    SessionId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
