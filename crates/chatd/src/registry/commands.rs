//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `ChatEvent`: Observability events for the log and active-user displays
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use chat_core::{DomainError, ScreenName, SessionId};

use crate::session::{OutboundLine, SessionWriter};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command that needs an answer carries a oneshot channel for the
/// response. The actor handles commands one at a time, which makes every
/// command atomic with respect to all others.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim a screen name for a session.
    ///
    /// # Errors
    /// - `RegistryError::InvalidName` if the proposed name is blank
    /// - `RegistryError::NameTaken` if another session holds the name
    /// - `RegistryError::AlreadyNamed` if this session already holds a name
    TryRegister {
        /// Session claiming the name
        session_id: SessionId,
        /// Raw line submitted by the client
        proposed: String,
        /// Channel to send the claimed name
        respond_to: oneshot::Sender<Result<ScreenName, RegistryError>>,
    },

    /// Add a named session's writer to the active set.
    ///
    /// # Errors
    /// - `RegistryError::NotRegistered` if the session holds no name
    /// - `RegistryError::AlreadyActive` if the writer is already present
    AddWriter {
        /// Outbound queue of the session (carries its id)
        writer: SessionWriter,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Queue one line on every active writer.
    Broadcast {
        /// Encoded line without trailing newline
        line: OutboundLine,
        /// Channel to send the delivery report
        respond_to: oneshot::Sender<BroadcastReport>,
    },

    /// Remove a session's writer and release its name. Idempotent.
    Unregister {
        /// Session to remove
        session_id: SessionId,
        /// Channel to send the released name, if one was held
        respond_to: oneshot::Sender<Option<ScreenName>>,
    },

    /// Get all claimed names, sorted.
    SnapshotNames {
        /// Channel to send the names
        respond_to: oneshot::Sender<Vec<ScreenName>>,
    },

    /// Get name and writer counts.
    Stats {
        /// Channel to send the counts
        respond_to: oneshot::Sender<RegistryStats>,
    },
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Writers that accepted the line
    pub delivered: usize,
    /// Writers whose queue was full; they were removed and told to disconnect
    pub evicted: Vec<SessionId>,
    /// Writers whose task had already exited; skipped
    pub closed: usize,
}

/// Sizes of the two registry sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of claimed screen names
    pub claimed_names: usize,
    /// Number of writers in the active set
    pub active_writers: usize,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The proposed name failed validation (blank, multi-line).
    #[error("invalid name: {0}")]
    InvalidName(#[from] DomainError),

    /// Another session already holds this name.
    #[error("name already taken: {0}")]
    NameTaken(ScreenName),

    /// The session already holds a name.
    #[error("{session_id} already registered as {name}")]
    AlreadyNamed {
        /// Session that tried to register twice
        session_id: SessionId,
        /// Name it already holds
        name: ScreenName,
    },

    /// A writer was added for a session that holds no name.
    #[error("{0} has no registered name")]
    NotRegistered(SessionId),

    /// The session's writer is already in the active set.
    #[error("{0} is already active")]
    AlreadyActive(SessionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

impl RegistryError {
    /// Returns true for errors that mean "ask the client for another name".
    pub fn is_naming_conflict(&self) -> bool {
        matches!(self, Self::InvalidName(_) | Self::NameTaken(_))
    }
}

// ============================================================================
// Observability Events
// ============================================================================

/// Events published for the server's log and active-user displays.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A line for the server log.
    Log(LogEntry),

    /// The set of claimed names changed. Always the full, sorted list.
    ActiveUsers {
        /// Every claimed name at the time of the change
        names: Vec<ScreenName>,
    },
}

/// One server log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// When the event happened
    pub at: DateTime<Utc>,
    /// Session the line is about
    pub name: ScreenName,
    /// What happened
    pub kind: LogKind,
}

/// What a log line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Joined,
    Left,
    MessageSent,
}

impl LogEntry {
    /// Creates a log entry stamped with the current time.
    pub fn now(name: ScreenName, kind: LogKind) -> Self {
        Self {
            at: Utc::now(),
            name,
            kind,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LogKind::Joined => write!(f, "{} has joined", self.name),
            LogKind::Left => write!(f, "{} has left", self.name),
            LogKind::MessageSent => write!(f, "{} has sent a message...", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ScreenName {
        ScreenName::parse(s).unwrap()
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NameTaken(name("alice"));
        assert_eq!(err.to_string(), "name already taken: alice");

        let err = RegistryError::InvalidName(DomainError::BlankName);
        assert_eq!(err.to_string(), "invalid name: screen name must not be blank");

        let err = RegistryError::NotRegistered(SessionId::new(4));
        assert_eq!(err.to_string(), "session-4 has no registered name");

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "response channel closed");
    }

    #[test]
    fn test_naming_conflicts() {
        assert!(RegistryError::NameTaken(name("bob")).is_naming_conflict());
        assert!(RegistryError::InvalidName(DomainError::BlankName).is_naming_conflict());
        assert!(!RegistryError::ChannelClosed.is_naming_conflict());
        assert!(!RegistryError::NotRegistered(SessionId::new(1)).is_naming_conflict());
    }

    #[test]
    fn test_log_entry_display() {
        let entry = LogEntry::now(name("carol"), LogKind::Joined);
        assert_eq!(entry.to_string(), "carol has joined");

        let entry = LogEntry::now(name("carol"), LogKind::MessageSent);
        assert_eq!(entry.to_string(), "carol has sent a message...");

        let entry = LogEntry::now(name("carol"), LogKind::Left);
        assert_eq!(entry.to_string(), "carol has left");
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<(), RegistryError>>();

        // Drop sender without sending
        drop(tx);

        assert!(rx.await.is_err());
    }
}
