//! Registry actor - owns all name and writer state and processes commands.
//!
//! The RegistryActor is the single owner of the claimed-name set and the
//! active-writer set. It receives commands via an mpsc channel and publishes
//! active-user changes via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use chat_core::{ScreenName, SessionId};

use super::commands::{BroadcastReport, ChatEvent, RegistryCommand, RegistryError, RegistryStats};
use crate::session::{Delivery, OutboundLine, SessionWriter};

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all registry state.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
///
/// # Ownership
///
/// The actor owns:
/// - `claimed_names`: name → holding session (uniqueness check)
/// - `names_by_session`: session → held name (release on unregister)
/// - `writers`: session → outbound queue, present only while Active
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially,
/// so the name and writer sets always change together.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Primary name index: name → session holding it
    claimed_names: HashMap<ScreenName, SessionId>,

    /// Reverse index: session → name it holds
    names_by_session: HashMap<SessionId, ScreenName>,

    /// Writers of Active sessions
    writers: HashMap<SessionId, SessionWriter>,

    /// Event publisher for the active-user display
    event_publisher: broadcast::Sender<ChatEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<ChatEvent>,
    ) -> Self {
        Self {
            receiver,
            claimed_names: HashMap::new(),
            names_by_session: HashMap::new(),
            writers: HashMap::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            names = self.claimed_names.len(),
            writers = self.writers.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::TryRegister {
                session_id,
                proposed,
                respond_to,
            } => {
                let result = self.handle_try_register(session_id, &proposed);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::AddWriter { writer, respond_to } => {
                let result = self.handle_add_writer(writer);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Broadcast { line, respond_to } => {
                let report = self.handle_broadcast(&line);
                let _ = respond_to.send(report);
            }
            RegistryCommand::Unregister {
                session_id,
                respond_to,
            } => {
                let released = self.handle_unregister(session_id);
                let _ = respond_to.send(released);
            }
            RegistryCommand::SnapshotNames { respond_to } => {
                let _ = respond_to.send(self.sorted_names());
            }
            RegistryCommand::Stats { respond_to } => {
                let _ = respond_to.send(RegistryStats {
                    claimed_names: self.claimed_names.len(),
                    active_writers: self.writers.len(),
                });
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Claims a name if it is valid and free. No side effects on failure.
    fn handle_try_register(
        &mut self,
        session_id: SessionId,
        proposed: &str,
    ) -> Result<ScreenName, RegistryError> {
        let name = ScreenName::parse(proposed)?;

        if let Some(held) = self.names_by_session.get(&session_id) {
            return Err(RegistryError::AlreadyNamed {
                session_id,
                name: held.clone(),
            });
        }

        if self.claimed_names.contains_key(&name) {
            debug!(session = %session_id, name = %name, "Name already taken");
            return Err(RegistryError::NameTaken(name));
        }

        self.claimed_names.insert(name.clone(), session_id);
        self.names_by_session.insert(session_id, name.clone());
        debug!(session = %session_id, name = %name, "Name claimed");

        Ok(name)
    }

    /// Adds a writer for a session that already holds a name.
    fn handle_add_writer(&mut self, writer: SessionWriter) -> Result<(), RegistryError> {
        let session_id = writer.id();

        if !self.names_by_session.contains_key(&session_id) {
            warn!(session = %session_id, "Writer added for unnamed session");
            return Err(RegistryError::NotRegistered(session_id));
        }

        if self.writers.contains_key(&session_id) {
            warn!(session = %session_id, "Writer added twice");
            return Err(RegistryError::AlreadyActive(session_id));
        }

        self.writers.insert(session_id, writer);
        self.publish_active_users();
        Ok(())
    }

    /// Queues a line on every active writer without waiting on any of them.
    ///
    /// A full queue means the peer is too slow: its writer is removed and the
    /// peer is told to disconnect. Its handler releases the name and
    /// announces the departure. A closed queue is skipped; that peer's
    /// handler is already on its way out.
    fn handle_broadcast(&mut self, line: &OutboundLine) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (session_id, writer) in &self.writers {
            match writer.try_deliver(line) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Full => report.evicted.push(*session_id),
                Delivery::Closed => {
                    debug!(session = %session_id, "Skipping closed writer");
                    report.closed += 1;
                }
            }
        }

        for session_id in &report.evicted {
            if let Some(writer) = self.writers.remove(session_id) {
                warn!(session = %session_id, "Outbound queue full, evicting slow session");
                writer.disconnect();
            }
        }

        report
    }

    /// Removes a session's writer and name. Safe to call repeatedly.
    fn handle_unregister(&mut self, session_id: SessionId) -> Option<ScreenName> {
        let had_writer = self.writers.remove(&session_id).is_some();
        let released = self.names_by_session.remove(&session_id);

        if let Some(name) = &released {
            self.claimed_names.remove(name);
            debug!(session = %session_id, name = %name, "Name released");
        }

        if had_writer || released.is_some() {
            self.publish_active_users();
        }

        released
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn sorted_names(&self) -> Vec<ScreenName> {
        let mut names: Vec<ScreenName> = self.claimed_names.keys().cloned().collect();
        names.sort();
        names
    }

    /// Publishes the full name list, recomputed from the claimed set.
    fn publish_active_users(&self) {
        // No subscribers is fine; the display may not be attached
        let _ = self.event_publisher.send(ChatEvent::ActiveUsers {
            names: self.sorted_names(),
        });
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns true if the session's writer is in the active set.
    #[cfg(test)]
    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.writers.contains_key(&session_id)
    }
}
