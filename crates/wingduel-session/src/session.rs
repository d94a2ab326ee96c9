//! The session itself: two seats, shared match parameters, and the
//! transitions that move a match from ready-up to a verdict.

use std::time::Instant;

use wingduel_protocol::{
    PlayerNumber, Recipient, RelayKind, RelayPayload, ServerEvent, SessionId,
};
use wingduel_transport::ConnectionId;

use crate::{SessionError, SessionState};

/// Events produced by a transition, each addressed within the session.
pub type Outbound = Vec<(Recipient, ServerEvent)>;

/// Per-seat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    /// The connection sitting in this seat.
    pub connection: ConnectionId,
    /// Has this player reported ready?
    pub ready: bool,
    /// Cleared when this player's death ends the match.
    pub alive: bool,
    pub score: u32,
}

impl PlayerSlot {
    fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            ready: false,
            alive: true,
            score: 0,
        }
    }
}

/// A read-only snapshot of a session, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub seed: u32,
    pub winner: Option<PlayerNumber>,
    pub players: [PlayerSlot; 2],
}

/// One active two-player match.
///
/// Invariants:
/// - exactly two distinct connections are seated;
/// - `winner` is `Some` iff `state == Over`;
/// - once `Over`, every transition is refused.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    players: [PlayerSlot; 2],
    state: SessionState,
    seed: u32,
    start_time: Option<Instant>,
    winner: Option<PlayerNumber>,
}

impl Session {
    /// Seats `first` as player one and `second` as player two.
    ///
    /// # Errors
    /// Returns [`SessionError::SelfMatch`] if both are the same connection.
    pub fn new(
        id: SessionId,
        first: ConnectionId,
        second: ConnectionId,
        seed: u32,
    ) -> Result<Self, SessionError> {
        if first == second {
            return Err(SessionError::SelfMatch(first));
        }
        Ok(Self {
            id,
            players: [PlayerSlot::new(first), PlayerSlot::new(second)],
            state: SessionState::Forming,
            seed,
            start_time: None,
            winner: None,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The shared seed both clients use for procedural content.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// When both players became ready. `None` while forming.
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    /// The winning seat. `Some` only once the session is over.
    pub fn winner(&self) -> Option<PlayerNumber> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.state == SessionState::Over
    }

    pub fn player(&self, player: PlayerNumber) -> &PlayerSlot {
        &self.players[player.index()]
    }

    /// The connection sitting in `player`'s seat.
    pub fn connection(&self, player: PlayerNumber) -> ConnectionId {
        self.players[player.index()].connection
    }

    /// Both connections, player one first.
    pub fn connections(&self) -> [ConnectionId; 2] {
        [self.players[0].connection, self.players[1].connection]
    }

    /// Which seat `connection` occupies, if any.
    pub fn seat_of(&self, connection: ConnectionId) -> Option<PlayerNumber> {
        PlayerNumber::ALL
            .into_iter()
            .find(|p| self.connection(*p) == connection)
    }

    /// Resolves a recipient to the connections it addresses.
    pub fn resolve(&self, recipient: Recipient) -> Vec<ConnectionId> {
        PlayerNumber::ALL
            .into_iter()
            .filter(|p| recipient.includes(*p))
            .map(|p| self.connection(p))
            .collect()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            state: self.state,
            seed: self.seed,
            winner: self.winner,
            players: self.players.clone(),
        }
    }

    /// Marks `player` ready. When both seats are ready the session starts.
    ///
    /// Repeating a ready report, or reporting ready after the start, is a
    /// no-op that produces no events.
    ///
    /// On start the shared `Started { seed }` goes to both players and then
    /// each player privately gets its own `PlayerAssignment`. The seat
    /// number never rides on the broadcast.
    ///
    /// # Errors
    /// [`SessionError::AlreadyOver`] once the session has a winner.
    pub fn set_ready(&mut self, player: PlayerNumber) -> Result<Outbound, SessionError> {
        match self.state {
            SessionState::Over => return Err(SessionError::AlreadyOver(self.id.clone())),
            SessionState::Started => return Ok(Vec::new()),
            SessionState::Forming => {}
        }

        let slot = &mut self.players[player.index()];
        if slot.ready {
            return Ok(Vec::new());
        }
        slot.ready = true;
        tracing::debug!(session_id = %self.id, %player, "player ready");

        if self.players.iter().all(|p| p.ready) {
            Ok(self.start())
        } else {
            Ok(Vec::new())
        }
    }

    fn start(&mut self) -> Outbound {
        debug_assert!(self.state.can_transition_to(SessionState::Started));
        self.state = SessionState::Started;
        self.start_time = Some(Instant::now());
        tracing::info!(session_id = %self.id, seed = self.seed, "session started");

        let mut out = vec![(Recipient::All, ServerEvent::Started { seed: self.seed })];
        out.extend(PlayerNumber::ALL.into_iter().map(|p| {
            (
                Recipient::Player(p),
                ServerEvent::PlayerAssignment { player_number: p },
            )
        }));
        out
    }

    /// Builds the event forwarding `payload` from `from` to its opponent.
    ///
    /// Relays are accepted while forming or started; the sender never
    /// receives its own event.
    ///
    /// # Errors
    /// [`SessionError::AlreadyOver`] once the session has a winner.
    pub fn relay(
        &self,
        from: PlayerNumber,
        kind: RelayKind,
        payload: RelayPayload,
    ) -> Result<(Recipient, ServerEvent), SessionError> {
        if self.is_over() {
            tracing::debug!(session_id = %self.id, event = kind.name(), %from, "relay after game over");
            return Err(SessionError::AlreadyOver(self.id.clone()));
        }
        Ok((Recipient::AllExcept(from), kind.opponent_event(from, payload)))
    }

    /// The authoritative end of a match: `player` died of `cause`, so the
    /// other seat wins.
    ///
    /// Only the first report counts. The caller is expected to schedule
    /// cleanup after a successful call.
    ///
    /// # Errors
    /// - [`SessionError::NotStarted`] while still forming.
    /// - [`SessionError::AlreadyOver`] for any report after the first; state
    ///   and winner are left untouched.
    pub fn handle_death(
        &mut self,
        player: PlayerNumber,
        cause: impl Into<String>,
    ) -> Result<Outbound, SessionError> {
        match self.state {
            SessionState::Forming => return Err(SessionError::NotStarted(self.id.clone())),
            SessionState::Over => return Err(SessionError::AlreadyOver(self.id.clone())),
            SessionState::Started => {}
        }

        let cause = cause.into();
        let winner = player.other();
        self.players[player.index()].alive = false;
        self.state = SessionState::Over;
        self.winner = Some(winner);

        tracing::info!(
            session_id = %self.id,
            %winner,
            loser = %player,
            %cause,
            "game over"
        );

        Ok(vec![(
            Recipient::All,
            ServerEvent::GameOver {
                winner,
                loser: player,
                cause,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn new_session() -> Session {
        Session::new(SessionId::new("s1"), conn(10), conn(20), 777).unwrap()
    }

    fn started_session() -> Session {
        let mut s = new_session();
        s.set_ready(PlayerNumber::One).unwrap();
        s.set_ready(PlayerNumber::Two).unwrap();
        s
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_seats_players_in_order() {
        let s = new_session();
        assert_eq!(s.state(), SessionState::Forming);
        assert_eq!(s.connection(PlayerNumber::One), conn(10));
        assert_eq!(s.connection(PlayerNumber::Two), conn(20));
        assert_eq!(s.seed(), 777);
        assert!(s.winner().is_none());
        assert!(s.start_time().is_none());

        let slot = s.player(PlayerNumber::One);
        assert!(!slot.ready);
        assert!(slot.alive);
        assert_eq!(slot.score, 0);
    }

    #[test]
    fn test_new_same_connection_twice_is_rejected() {
        let result = Session::new(SessionId::new("s"), conn(1), conn(1), 0);
        assert_eq!(result.unwrap_err(), SessionError::SelfMatch(conn(1)));
    }

    #[test]
    fn test_seat_of_and_resolve() {
        let s = new_session();
        assert_eq!(s.seat_of(conn(20)), Some(PlayerNumber::Two));
        assert_eq!(s.seat_of(conn(99)), None);
        assert_eq!(s.resolve(Recipient::All), vec![conn(10), conn(20)]);
        assert_eq!(s.resolve(Recipient::AllExcept(PlayerNumber::One)), vec![conn(20)]);
        assert_eq!(s.resolve(Recipient::Player(PlayerNumber::One)), vec![conn(10)]);
    }

    // =====================================================================
    // set_ready()
    // =====================================================================

    #[test]
    fn test_set_ready_one_player_does_not_start() {
        let mut s = new_session();
        let out = s.set_ready(PlayerNumber::One).unwrap();
        assert!(out.is_empty());
        assert_eq!(s.state(), SessionState::Forming);
        assert!(s.player(PlayerNumber::One).ready);
    }

    #[test]
    fn test_set_ready_same_player_twice_is_idempotent() {
        let mut s = new_session();
        s.set_ready(PlayerNumber::Two).unwrap();
        let out = s.set_ready(PlayerNumber::Two).unwrap();
        assert!(out.is_empty());
        assert_eq!(s.state(), SessionState::Forming);
    }

    #[test]
    fn test_set_ready_both_players_starts_with_seed_then_assignments() {
        let mut s = new_session();
        s.set_ready(PlayerNumber::One).unwrap();
        let out = s.set_ready(PlayerNumber::Two).unwrap();

        assert_eq!(s.state(), SessionState::Started);
        assert!(s.start_time().is_some());
        assert_eq!(
            out,
            vec![
                (Recipient::All, ServerEvent::Started { seed: 777 }),
                (
                    Recipient::Player(PlayerNumber::One),
                    ServerEvent::PlayerAssignment { player_number: PlayerNumber::One },
                ),
                (
                    Recipient::Player(PlayerNumber::Two),
                    ServerEvent::PlayerAssignment { player_number: PlayerNumber::Two },
                ),
            ]
        );
    }

    #[test]
    fn test_set_ready_after_start_is_noop() {
        let mut s = started_session();
        let started_at = s.start_time();
        let out = s.set_ready(PlayerNumber::One).unwrap();
        assert!(out.is_empty());
        assert_eq!(s.start_time(), started_at);
    }

    #[test]
    fn test_set_ready_after_over_is_rejected() {
        let mut s = started_session();
        s.handle_death(PlayerNumber::One, "pipe").unwrap();
        assert!(matches!(
            s.set_ready(PlayerNumber::One),
            Err(SessionError::AlreadyOver(_))
        ));
    }

    // =====================================================================
    // relay()
    // =====================================================================

    #[test]
    fn test_relay_targets_opponent_only() {
        let s = started_session();
        let (recipient, event) = s
            .relay(PlayerNumber::Two, RelayKind::Flap, RelayPayload::new().with("y", 5))
            .unwrap();
        assert_eq!(recipient, Recipient::AllExcept(PlayerNumber::Two));
        assert_eq!(s.resolve(recipient), vec![conn(10)]);
        match event {
            ServerEvent::OpponentFlap(action) => {
                assert_eq!(action.player_number, PlayerNumber::Two);
                assert_eq!(action.payload.get("y"), Some(&serde_json::json!(5)));
            }
            other => panic!("expected OpponentFlap, got {other:?}"),
        }
    }

    #[test]
    fn test_relay_allowed_while_forming() {
        let s = new_session();
        assert!(s.relay(PlayerNumber::One, RelayKind::Position, RelayPayload::new()).is_ok());
    }

    #[test]
    fn test_relay_after_over_is_rejected() {
        let mut s = started_session();
        s.handle_death(PlayerNumber::Two, "ground").unwrap();
        assert!(matches!(
            s.relay(PlayerNumber::One, RelayKind::Ability, RelayPayload::new()),
            Err(SessionError::AlreadyOver(_))
        ));
    }

    // =====================================================================
    // handle_death()
    // =====================================================================

    #[test]
    fn test_handle_death_sets_other_player_as_winner() {
        let mut s = started_session();
        let out = s.handle_death(PlayerNumber::One, "pipe").unwrap();

        assert_eq!(s.state(), SessionState::Over);
        assert_eq!(s.winner(), Some(PlayerNumber::Two));
        assert!(!s.player(PlayerNumber::One).alive);
        assert!(s.player(PlayerNumber::Two).alive);
        assert_eq!(
            out,
            vec![(
                Recipient::All,
                ServerEvent::GameOver {
                    winner: PlayerNumber::Two,
                    loser: PlayerNumber::One,
                    cause: "pipe".into(),
                },
            )]
        );
    }

    #[test]
    fn test_handle_death_second_report_changes_nothing() {
        let mut s = started_session();
        s.handle_death(PlayerNumber::Two, "ceiling").unwrap();

        let again = s.handle_death(PlayerNumber::One, "pipe");
        assert!(matches!(again, Err(SessionError::AlreadyOver(_))));
        assert_eq!(s.winner(), Some(PlayerNumber::One));
        assert_eq!(s.state(), SessionState::Over);
        assert!(s.player(PlayerNumber::One).alive);

        let same = s.handle_death(PlayerNumber::Two, "ceiling");
        assert!(matches!(same, Err(SessionError::AlreadyOver(_))));
        assert_eq!(s.winner(), Some(PlayerNumber::One));
    }

    #[test]
    fn test_handle_death_while_forming_is_rejected() {
        let mut s = new_session();
        assert!(matches!(
            s.handle_death(PlayerNumber::One, "pipe"),
            Err(SessionError::NotStarted(_))
        ));
        assert_eq!(s.state(), SessionState::Forming);
        assert!(s.winner().is_none());
    }

    #[test]
    fn test_winner_is_set_iff_over() {
        let mut s = new_session();
        assert_eq!(s.winner().is_some(), s.is_over());
        s.set_ready(PlayerNumber::One).unwrap();
        s.set_ready(PlayerNumber::Two).unwrap();
        assert_eq!(s.winner().is_some(), s.is_over());
        s.handle_death(PlayerNumber::Two, "pipe").unwrap();
        assert_eq!(s.winner().is_some(), s.is_over());
    }

    #[test]
    fn test_info_snapshot_reflects_state() {
        let mut s = started_session();
        s.handle_death(PlayerNumber::One, "pipe").unwrap();
        let info = s.info();
        assert_eq!(info.id, SessionId::new("s1"));
        assert_eq!(info.state, SessionState::Over);
        assert_eq!(info.winner, Some(PlayerNumber::Two));
        assert!(info.players.iter().all(|p| p.ready));
    }
}
