//! Session identifiers and lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Opaque identifier for one client connection.
///
/// Assigned by the listener from a monotonically increasing counter, so two
/// live connections never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a SessionId from a connection number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw connection number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state of a session.
///
/// ```text
/// Connecting ──▶ Naming ──▶ Active ──▶ Closed
///                  │                     ▲
///                  └─────────────────────┘
/// ```
///
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepted, handler not yet started.
    #[default]
    Connecting,
    /// Waiting for a unique screen name.
    Naming,
    /// Name accepted; sends and receives chat lines.
    Active,
    /// Disconnected. Terminal.
    Closed,
}

impl SessionState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Naming)
                | (Connecting, Closed)
                | (Naming, Active)
                | (Naming, Closed)
                | (Active, Closed)
        )
    }

    /// Moves to `next`, rejecting illegal transitions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` when `next` is not reachable
    /// from the current state (including any transition out of `Closed`).
    pub fn transition(&mut self, next: SessionState) -> DomainResult<()> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }

    /// Returns true for the terminal state.
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Naming => "naming",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::new(7).to_string(), "session-7");
        assert_eq!(SessionId::new(7).get(), 7);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = SessionState::default();
        assert_eq!(state, SessionState::Connecting);
        state.transition(SessionState::Naming).unwrap();
        state.transition(SessionState::Active).unwrap();
        state.transition(SessionState::Closed).unwrap();
        assert!(state.is_closed());
    }

    #[test]
    fn test_naming_can_close_directly() {
        let mut state = SessionState::Naming;
        assert!(state.transition(SessionState::Closed).is_ok());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = SessionState::Closed;
        for next in [
            SessionState::Connecting,
            SessionState::Naming,
            SessionState::Active,
            SessionState::Closed,
        ] {
            assert!(state.transition(next).is_err());
        }
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_cannot_skip_naming() {
        let mut state = SessionState::Connecting;
        let err = state.transition(SessionState::Active).unwrap_err();
        assert_eq!(err.to_string(), "invalid session transition: connecting -> active");
    }
}
