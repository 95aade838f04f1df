//! Name and writer registry using Actor pattern.
//!
//! The registry is the single source of truth for who is connected. It owns
//! two sets that must change together - claimed screen names and the
//! outbound writers of Active sessions - and receives commands via a tokio
//! mpsc channel, so every operation is atomic with respect to every other.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler│────▶│  RegistryActor  │────▶│ SessionWriter    │
//! └─────────────────┘     └─────────────────┘     │ queues (try_send)│
//!         │                       │               └──────────────────┘
//!         │   RegistryCommand     │   ChatEvent
//!         │   (mpsc channel)      │   (broadcast)
//!         ▼                       ▼
//!   TryRegister/AddWriter/   log + active-user
//!   Broadcast/Unregister     displays
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    BroadcastReport, ChatEvent, LogEntry, LogKind, RegistryCommand, RegistryError, RegistryStats,
};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor stops once every clone of the returned handle is dropped.
///
/// # Example
///
/// ```no_run
/// use chat_core::SessionId;
/// use chatd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     let claimed = handle.try_register(SessionId::new(1), "alice").await;
///     assert!(claimed.is_ok());
///     let names = handle.snapshot_names().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
