//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Negotiates a unique screen name (`SUBMITNAME` until one is free)
//! - Announces the join and adds the session to the active set
//! - Relays every chat line to all active sessions
//! - Unregisters and announces the departure when the session closes
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader, ReadHalf,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chat_core::{ScreenName, SessionId, SessionState};
use chat_protocol::{strip_line_ending, ChatText, ClientLine, ServerLine};

use crate::config::ServerConfig;
use crate::registry::{ChatEvent, LogEntry, LogKind, RegistryError, RegistryHandle};
use crate::session::{outbound_channel, spawn_writer_task, SessionWriter};

/// Connection handler for a single client.
///
/// Owns the read half of the stream and the session's writer. The write
/// half belongs to the session's writer task.
pub struct ConnectionHandler<S> {
    /// Session identifier assigned by the listener
    id: SessionId,

    /// Buffered reader for incoming lines
    reader: BufReader<ReadHalf<S>>,

    /// This session's outbound queue (direct replies)
    writer: SessionWriter,

    /// Task draining the outbound queue into the socket
    writer_task: JoinHandle<()>,

    /// Handle to the name registry
    registry: RegistryHandle,

    /// Server-wide shutdown
    shutdown: CancellationToken,

    /// Session-level disconnect (eviction or failed write)
    disconnect: CancellationToken,

    /// Lifecycle state
    state: SessionState,

    /// Claimed screen name, once `try_register` succeeded
    name: Option<ScreenName>,

    /// Longest accepted line, excluding the line ending
    max_line_length: usize,

    /// Bound on the final flush when closing
    write_timeout: Duration,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Creates a new connection handler and starts its writer task.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique id for this connection
    /// * `stream` - Duplex byte stream to the client
    /// * `registry` - Handle to the name registry
    /// * `config` - Queue size, timeouts and line limit
    /// * `shutdown` - Server-wide cancellation token
    pub fn new(
        id: SessionId,
        stream: S,
        registry: RegistryHandle,
        config: &ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let disconnect = CancellationToken::new();
        let (writer, receiver) = outbound_channel(id, config.outbound_buffer, disconnect.clone());
        let writer_task = spawn_writer_task(
            id,
            write_half,
            receiver,
            config.write_timeout(),
            disconnect.clone(),
        );

        Self {
            id,
            reader: BufReader::new(read_half),
            writer,
            writer_task,
            registry,
            shutdown,
            disconnect,
            state: SessionState::Connecting,
            name: None,
            max_line_length: config.max_line_length,
            write_timeout: config.write_timeout(),
        }
    }

    /// Runs the connection handler.
    ///
    /// Negotiates a name, then relays lines until the client quits, the
    /// stream ends or fails, or the server shuts down. Cleanup runs exactly
    /// once on every path. Returns the name the session held, if any.
    pub async fn run(mut self) -> Option<ScreenName> {
        debug!(session = %self.id, "New client connected");
        self.set_state(SessionState::Naming);

        let result = match self.negotiate_name().await {
            Ok(name) => match self.activate(name).await {
                Ok(()) => self.relay_messages().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!(session = %self.id, name = ?self.name, "Client quit"),
            Err(ConnectionError::Eof) => {
                debug!(session = %self.id, name = ?self.name, "Client sent EOF");
            }
            Err(e) => debug!(session = %self.id, name = ?self.name, error = %e, "Connection closed"),
        }

        let name = self.name.clone();
        self.close().await;
        name
    }

    /// Naming state: prompt until the registry accepts a name.
    async fn negotiate_name(&mut self) -> Result<ScreenName, ConnectionError> {
        loop {
            self.send(ServerLine::SubmitName).await?;
            let proposed = self.read_line().await?;

            match self.registry.try_register(self.id, &proposed).await {
                Ok(name) => {
                    // Held from here on: cleanup must release it
                    self.name = Some(name.clone());
                    return Ok(name);
                }
                Err(e) if e.is_naming_conflict() => {
                    debug!(session = %self.id, error = %e, "Name rejected, prompting again");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Naming → Active. The order of these steps is part of the protocol:
    /// acknowledge, announce to existing peers, then join the active set.
    async fn activate(&mut self, name: ScreenName) -> Result<(), ConnectionError> {
        self.send(ServerLine::NameAccepted(name.clone())).await?;

        self.registry
            .broadcast(ServerLine::message(ChatText::Joined(name.clone())))
            .await?;

        self.registry.add_writer(self.writer.clone()).await?;
        self.set_state(SessionState::Active);

        info!(session = %self.id, name = %name, "Client joined");
        self.registry
            .publish(ChatEvent::Log(LogEntry::now(name, LogKind::Joined)));

        Ok(())
    }

    /// Active state: broadcast every line until `/quit`.
    ///
    /// The sender's own writer is in the active set, so the sender receives
    /// its own message as well.
    async fn relay_messages(&mut self) -> Result<(), ConnectionError> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => return Ok(()),
        };

        loop {
            let line = self.read_line().await?;

            match ClientLine::parse(&line) {
                ClientLine::Quit => return Ok(()),
                ClientLine::Chat(text) => {
                    let report = self
                        .registry
                        .broadcast(ServerLine::message(ChatText::Chat {
                            from: name.clone(),
                            text,
                        }))
                        .await?;

                    debug!(
                        session = %self.id,
                        delivered = report.delivered,
                        evicted = report.evicted.len(),
                        "Message relayed"
                    );
                    self.registry.publish(ChatEvent::Log(LogEntry::now(
                        name.clone(),
                        LogKind::MessageSent,
                    )));
                }
            }
        }
    }

    /// Closed state: release registry state, announce, and drop the stream.
    async fn close(mut self) {
        self.set_state(SessionState::Closed);

        // Always attempted, even when naming never completed
        match self.registry.unregister(self.id).await {
            Ok(_) => {}
            Err(e) => warn!(session = %self.id, error = %e, "Failed to unregister session"),
        }

        if let Some(name) = self.name.take() {
            if let Err(e) = self
                .registry
                .broadcast(ServerLine::message(ChatText::Left(name.clone())))
                .await
            {
                warn!(session = %self.id, error = %e, "Failed to announce departure");
            }

            info!(session = %self.id, name = %name, "Client left");
            self.registry
                .publish(ChatEvent::Log(LogEntry::now(name, LogKind::Left)));
        }

        // Dropping the last sender lets the writer task flush and half-close
        let Self {
            writer,
            writer_task,
            write_timeout,
            id,
            ..
        } = self;
        drop(writer);

        if timeout(write_timeout, writer_task).await.is_err() {
            debug!(session = %id, "Writer task did not finish in time");
        }
    }

    /// Reads one line, without its line ending.
    ///
    /// Returns early if the server shuts down or the session is told to
    /// disconnect.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let mut line = String::new();
        // One extra byte for the newline, one to detect overflow
        let limit = (self.max_line_length as u64).saturating_add(2);
        let mut limited = (&mut self.reader).take(limit);

        let bytes_read = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(ConnectionError::Shutdown),
            _ = self.disconnect.cancelled() => return Err(ConnectionError::Disconnected),
            result = limited.read_line(&mut line) => {
                result.map_err(|e| ConnectionError::Io(e.to_string()))?
            }
        };

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        let text = strip_line_ending(&line);
        if text.len() > self.max_line_length {
            return Err(ConnectionError::LineTooLong {
                size: text.len(),
                max: self.max_line_length,
            });
        }

        Ok(text.to_string())
    }

    /// Queues a line on this session's own writer.
    async fn send(&self, line: ServerLine) -> Result<(), ConnectionError> {
        if self.writer.deliver(Arc::from(line.to_string())).await {
            Ok(())
        } else {
            Err(ConnectionError::Disconnected)
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if let Err(e) = self.state.transition(next) {
            warn!(session = %self.id, error = %e, "Unexpected session transition");
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    #[error("Session disconnected")]
    Disconnected,

    #[error("Server shutting down")]
    Shutdown,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
