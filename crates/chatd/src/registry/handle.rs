//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and for publishing and subscribing to chat events.
//! Handlers never touch the name or writer sets directly.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use chat_core::{ScreenName, SessionId};
use chat_protocol::ServerLine;

use super::commands::{BroadcastReport, ChatEvent, RegistryCommand, RegistryError, RegistryStats};
use crate::session::SessionWriter;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
/// Commands sent from one task are processed in the order sent.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for the log and active-user displays
    event_sender: broadcast::Sender<ChatEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for chat events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<ChatEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Atomically claim a screen name for a session.
    ///
    /// The proposed line is trimmed; the claimed name is returned. At most
    /// one of any number of concurrent callers proposing the same name
    /// succeeds.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidName` if the name is blank
    /// - `RegistryError::NameTaken` if another session holds it
    /// - `RegistryError::AlreadyNamed` if this session already holds a name
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_register(
        &self,
        session_id: SessionId,
        proposed: &str,
    ) -> Result<ScreenName, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::TryRegister {
                session_id,
                proposed: proposed.to_string(),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Add a named session's writer to the active set.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotRegistered` if `try_register` has not succeeded
    ///   for the writer's session
    /// - `RegistryError::AlreadyActive` if the writer was already added
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn add_writer(&self, writer: SessionWriter) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::AddWriter {
                writer,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Send a line to every active session.
    ///
    /// Never waits on an individual recipient: full queues are evicted and
    /// closed queues skipped, as reported in the returned `BroadcastReport`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn broadcast(&self, line: ServerLine) -> Result<BroadcastReport, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Broadcast {
                line: Arc::from(line.to_string()),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Remove a session's writer and release its name.
    ///
    /// Idempotent: unknown or already-removed sessions return `Ok(None)`.
    /// Returns the released name if the session held one.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister(&self, session_id: SessionId) -> Result<Option<ScreenName>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Unregister {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Get all claimed names, sorted.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot_names(&self) -> Vec<ScreenName> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::SnapshotNames { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Get the sizes of the name and writer sets.
    ///
    /// Returns zeroes if communication with the actor fails.
    pub async fn stats(&self) -> RegistryStats {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Stats { respond_to: tx })
            .await
            .is_err()
        {
            return RegistryStats::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Publish an event to the displays.
    ///
    /// Fire-and-forget: an event with no subscribers is dropped.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.event_sender.send(event);
    }

    /// Subscribe to chat events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LogEntry, LogKind};

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let handle = RegistryHandle::new(cmd_tx, event_tx);
        (handle, cmd_rx)
    }

    #[tokio::test]
    async fn test_try_register_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::TryRegister {
                session_id,
                proposed,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(session_id, SessionId::new(5));
                assert_eq!(proposed, "alice");
                let _ = respond_to.send(ScreenName::parse(&proposed).map_err(Into::into));
                return true;
            }
            false
        });

        let result = handle.try_register(SessionId::new(5), "alice").await;
        assert_eq!(result.unwrap().as_str(), "alice");
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_encodes_line() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Broadcast { line, respond_to }) = rx.recv().await {
                assert_eq!(line.as_ref(), "SUBMITNAME");
                let _ = respond_to.send(BroadcastReport {
                    delivered: 3,
                    ..Default::default()
                });
                return true;
            }
            false
        });

        let report = handle.broadcast(ServerLine::SubmitName).await.unwrap();
        assert_eq!(report.delivered, 3);
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_try_register_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.try_register(SessionId::new(1), "alice").await;
        assert!(matches!(result, Err(RegistryError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_unregister_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.unregister(SessionId::new(1)).await;
        assert!(matches!(result, Err(RegistryError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_queries_degrade_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.snapshot_names().await.is_empty());
        assert_eq!(handle.stats().await, RegistryStats::default());
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let (handle, _rx) = create_test_handle();
        let mut events = handle.subscribe();

        let name = ScreenName::parse("bob").unwrap();
        handle.publish(ChatEvent::Log(LogEntry::now(name, LogKind::Joined)));

        match events.recv().await.unwrap() {
            ChatEvent::Log(entry) => assert_eq!(entry.to_string(), "bob has joined"),
            other => panic!("Expected Log, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let (handle, _rx) = create_test_handle();
        handle.publish(ChatEvent::ActiveUsers { names: Vec::new() });
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();
        assert!(handle.is_connected());

        drop(rx);
        // A failed round trip confirms the closure
        let _ = handle.stats().await;
        assert!(!handle.is_connected());
    }
}
