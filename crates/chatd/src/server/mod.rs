//! TCP listener for the chat server.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Bounds concurrent sessions with a semaphore (connections beyond the
//!   bound wait in the listen backlog until a slot frees up)
//! - Spawns a ConnectionHandler task for each client
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │── acquire slot, then accept()
//! └───────┬─────────┘
//!         │ spawn (holds the slot until the session closes)
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation
//! - A panicking handler still has its registry state cleaned up

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chat_core::SessionId;
use chat_protocol::{ChatText, ServerLine};

use crate::config::{ConfigError, ServerConfig};
use crate::registry::{ChatEvent, LogEntry, LogKind, RegistryHandle};

/// Pause after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP server for the chat room.
///
/// Accepts connections and hands each one to its own handler task.
pub struct ChatServer {
    /// Listener and per-session settings
    config: ServerConfig,

    /// Handle to the name registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating session ids
    connection_counter: AtomicU64,

    /// One permit per concurrently served session
    slots: Arc<Semaphore>,
}

impl ChatServer {
    /// Creates a new chat server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address, connection bound and per-session limits
    /// * `registry` - Handle to the name registry
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections));
        Self {
            config,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            slots,
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the number of sessions that could start right now.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Requests a graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Binds the configured address and runs the server.
    ///
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.config.validate()?;
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| ServerError::Bind {
                addr: self.config.bind.clone(),
                error: e.to_string(),
            })
    }

    /// Accepts connections on an already bound listener until cancelled.
    ///
    /// Sessions already running are told to stop through the same token.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        match listener.local_addr() {
            Ok(addr) => info!(addr = %addr, max_connections = self.config.max_connections, "Chat server listening"),
            Err(e) => warn!(error = %e, "Chat server listening on unknown address"),
        }

        loop {
            // Wait for a free slot before accepting, so excess clients stay
            // in the listen backlog instead of being dropped
            let permit = tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Connection slots closed");
                        break;
                    }
                },
            };

            tokio::select! {
                _ = self.cancel_token.cancelled() => break,

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.handle_connection(stream, addr, permit),
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            drop(permit);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        info!("Server shutdown requested");
        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    ///
    /// The handler runs in a nested task so that a panic inside it still
    /// reaches the cleanup below. The slot is released when the outer task
    /// finishes.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, permit: OwnedSemaphorePermit) {
        let id = SessionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1);

        if let Err(e) = stream.set_nodelay(true) {
            debug!(session = %id, error = %e, "Failed to set TCP_NODELAY");
        }

        let handler = ConnectionHandler::new(
            id,
            stream,
            self.registry.clone(),
            &self.config,
            self.cancel_token.clone(),
        );
        let registry = self.registry.clone();

        debug!(session = %id, peer = %addr, "Accepted connection");

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = tokio::spawn(handler.run()).await {
                error!(session = %id, error = %e, "Connection handler failed");
                release_after_failure(&registry, id).await;
            }
        });
    }
}

/// Cleanup for a handler that did not run its own (it panicked).
///
/// Unregistering is idempotent, so this is safe even if the handler got
/// part of the way through closing.
async fn release_after_failure(registry: &RegistryHandle, id: SessionId) {
    match registry.unregister(id).await {
        Ok(Some(name)) => {
            if let Err(e) = registry
                .broadcast(ServerLine::message(ChatText::Left(name.clone())))
                .await
            {
                warn!(session = %id, error = %e, "Failed to announce departure");
            }
            registry.publish(ChatEvent::Log(LogEntry::now(name, LogKind::Left)));
        }
        Ok(None) => {}
        Err(e) => warn!(session = %id, error = %e, "Failed to unregister session"),
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
