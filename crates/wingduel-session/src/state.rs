//! Session lifecycle states.

use std::fmt;

/// The lifecycle state of a session.
///
/// Transitions are strictly ordered, no skipping:
///
/// ```text
/// Forming → Started → Over
/// ```
///
/// - **Forming**: both players are seated, waiting for each to report
///   ready.
/// - **Started**: the match is running; gameplay events are relayed and
///   the first death report decides the winner.
/// - **Over**: terminal. The session waits for cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Forming,
    Started,
    Over,
}

impl SessionState {
    /// Returns `true` while the session can still produce gameplay,
    /// i.e. anything short of `Over`.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Over)
    }

    /// The next state in the lifecycle, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Forming => Some(Self::Started),
            Self::Started => Some(Self::Over),
            Self::Over => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forming => write!(f, "Forming"),
            Self::Started => write!(f, "Started"),
            Self::Over => write!(f, "Over"),
        }
    }
}
