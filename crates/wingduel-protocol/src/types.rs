//! Identifiers and events that travel on the wire.
//!
//! Every frame is an adjacently tagged JSON object:
//!
//! ```text
//! { "event": "opponent-flap", "data": { "playerNumber": 1, "y": 210.5 } }
//! ```
//!
//! Event names are kebab-case and payload fields camelCase, which is what
//! the browser client reads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of one two-player session.
///
/// Serialized as a plain string. The lobby generates these from 64 random
/// bits rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an already generated token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player's seat in a session. Player one is whoever waited longest.
///
/// On the wire this is the bare integer `1` or `2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerNumber {
    One,
    Two,
}

impl PlayerNumber {
    /// Both seats, in seat order.
    pub const ALL: [PlayerNumber; 2] = [PlayerNumber::One, PlayerNumber::Two];

    /// The opposing seat.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// Zero-based slot index (0 for player one).
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl From<PlayerNumber> for u8 {
    fn from(value: PlayerNumber) -> Self {
        match value {
            PlayerNumber::One => 1,
            PlayerNumber::Two => 2,
        }
    }
}

impl TryFrom<u8> for PlayerNumber {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(ProtocolError::InvalidMessage(format!(
                "player number must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a session should receive an outbound event.
///
/// A session emits `(Recipient, ServerEvent)` pairs; the lobby resolves
/// each recipient to connection ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Both players (the session's broadcast group).
    All,
    /// One player, privately.
    Player(PlayerNumber),
    /// Everyone except the given player, i.e. their opponent.
    AllExcept(PlayerNumber),
}

impl Recipient {
    /// Returns `true` if `player` is addressed by this recipient.
    pub fn includes(self, player: PlayerNumber) -> bool {
        match self {
            Self::All => true,
            Self::Player(p) => p == player,
            Self::AllExcept(p) => p != player,
        }
    }
}

// ---------------------------------------------------------------------------
// Relay payloads
// ---------------------------------------------------------------------------

/// Opaque gameplay data the server forwards without interpreting.
///
/// Must be a JSON object; its keys are merged into the relayed event next
/// to the sender's `playerNumber`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayPayload(Map<String, Value>);

impl RelayPayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up one field of the payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets one field, returning the payload for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the payload, returning the underlying JSON map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }
}

impl From<Map<String, Value>> for RelayPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A relayed gameplay event as the opponent sees it:
/// `{ "playerNumber": <sender>, ...original payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentAction {
    #[serde(rename = "playerNumber")]
    pub player_number: PlayerNumber,
    #[serde(flatten)]
    pub payload: RelayPayload,
}

impl OpponentAction {
    /// Tags `payload` with the sender's seat. A `playerNumber` key sent by
    /// the client is dropped; the server's value is the only one relayed.
    pub fn new(player_number: PlayerNumber, mut payload: RelayPayload) -> Self {
        payload.remove("playerNumber");
        Self {
            player_number,
            payload,
        }
    }
}

/// The gameplay events a player may relay to their opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Flap,
    Position,
    Ability,
}

impl RelayKind {
    /// Builds the event the opponent receives for this kind of relay.
    pub fn opponent_event(self, from: PlayerNumber, payload: RelayPayload) -> ServerEvent {
        let action = OpponentAction::new(from, payload);
        match self {
            Self::Flap => ServerEvent::OpponentFlap(action),
            Self::Position => ServerEvent::OpponentPosition(action),
            Self::Ability => ServerEvent::OpponentAbility(action),
        }
    }

    /// The inbound event name, for logging.
    pub fn name(self) -> &'static str {
        match self {
            Self::Flap => "flap",
            Self::Position => "position",
            Self::Ability => "ability-use",
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a connected client may send.
///
/// Connect and disconnect are not frames: the transport reports them.
///
/// Decoding is lenient about `data`: a relay frame without it (or with
/// `null`) relays an empty payload, and a death without it reports cause
/// `"unknown"`. A flap usually carries nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    try_from = "ClientFrame"
)]
pub enum ClientEvent {
    /// "I've loaded and am ready to start."
    Ready,
    /// A flap input, forwarded to the opponent.
    Flap(RelayPayload),
    /// A position/velocity snapshot, forwarded to the opponent.
    Position(RelayPayload),
    /// An ability activation, forwarded to the opponent.
    AbilityUse(RelayPayload),
    /// "I died." The server decides the outcome from this.
    Death { cause: String },
}

/// The raw shape of an inbound frame, before the event name is resolved.
#[derive(Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct DeathData {
    #[serde(default)]
    cause: Option<String>,
}

impl TryFrom<ClientFrame> for ClientEvent {
    type Error = ProtocolError;

    fn try_from(ClientFrame { event, data }: ClientFrame) -> Result<Self, ProtocolError> {
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let invalid = |e: serde_json::Error| {
            ProtocolError::InvalidMessage(format!("bad `{event}` payload: {e}"))
        };

        match event.as_str() {
            "ready" => Ok(Self::Ready),
            "flap" => Ok(Self::Flap(serde_json::from_value(data).map_err(invalid)?)),
            "position" => Ok(Self::Position(serde_json::from_value(data).map_err(invalid)?)),
            "ability-use" => Ok(Self::AbilityUse(
                serde_json::from_value(data).map_err(invalid)?,
            )),
            "death" => {
                let DeathData { cause } = serde_json::from_value(data).map_err(invalid)?;
                Ok(Self::Death {
                    cause: cause.unwrap_or_else(|| "unknown".to_string()),
                })
            }
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown event `{other}`"
            ))),
        }
    }
}

impl ClientEvent {
    /// If this is a relayable gameplay event, splits it into its kind and
    /// payload; otherwise hands the event back.
    pub fn into_relay(self) -> Result<(RelayKind, RelayPayload), Self> {
        match self {
            Self::Flap(p) => Ok((RelayKind::Flap, p)),
            Self::Position(p) => Ok((RelayKind::Position, p)),
            Self::AbilityUse(p) => Ok((RelayKind::Ability, p)),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent on connect: the client is waiting for an opponent.
    Searching,

    /// Sent to each matched player individually.
    Matched {
        session_id: SessionId,
        player_number: PlayerNumber,
    },

    /// Broadcast when both players are ready. Carries the shared seed for
    /// deterministic level generation and nothing player-specific.
    Started { seed: u32 },

    /// Sent privately to each player right after `Started`.
    PlayerAssignment { player_number: PlayerNumber },

    /// The opponent flapped.
    OpponentFlap(OpponentAction),

    /// The opponent reported its position.
    OpponentPosition(OpponentAction),

    /// The opponent used an ability.
    OpponentAbility(OpponentAction),

    /// Broadcast once per session: the server's verdict.
    GameOver {
        winner: PlayerNumber,
        loser: PlayerNumber,
        cause: String,
    },

    /// The opponent left before the game ended.
    OpponentDisconnected,
}

// =========================================================================
// Tests
// =========================================================================
