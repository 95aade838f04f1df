//! Server connection client for the chat terminal.
//!
//! This module provides the `ChatClient` which handles:
//! - Connection to the chat server over TCP
//! - The name handshake (`SUBMITNAME` / `NAMEACCEPTED`)
//! - Relaying typed lines to the server and server messages to the user
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use chat_protocol::{strip_line_ending, ClientLine, ServerLine, DEFAULT_PORT};

use crate::error::{ClientError, Result};
use crate::state::{ClientAction, ClientSession};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
///
/// # Example
///
/// ```rust
/// use chat_client::ClientConfig;
///
/// let config = ClientConfig {
///     name: Some("alice".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(config.addr, "127.0.0.1:59001");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address as `host:port`.
    pub addr: String,

    /// Name offered on the first `SUBMITNAME`; the user is asked otherwise.
    pub name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            name: None,
        }
    }
}

// ============================================================================
// Chat Client
// ============================================================================

/// Line-oriented chat client.
///
/// # Connection Lifecycle
///
/// 1. Connects to the server
/// 2. Answers `SUBMITNAME` with the configured name, then with typed lines
/// 3. After `NAMEACCEPTED`, sends every typed line as chat
/// 4. On `/quit` or end of input, sends `/quit` and waits for the server
///    to close the connection
pub struct ChatClient {
    config: ClientConfig,
}

impl ChatClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Connects to the configured address and runs until the server closes
    /// the connection.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the server cannot be reached
    /// - `ClientError::Io` if reading input or writing output fails
    pub async fn run<I, O>(&self, input: I, output: O) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let stream = TcpStream::connect(&self.config.addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr: self.config.addr.clone(),
                error: e.to_string(),
            })?;
        info!(addr = %self.config.addr, "Connected to chat server");

        self.run_on(stream, input, output).await
    }

    /// Runs the client over an already established stream.
    pub async fn run_on<S, I, O>(&self, stream: S, input: I, mut output: O) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut server_lines = BufReader::new(reader).lines();
        let mut input_lines = input.lines();
        let mut session = ClientSession::new(self.config.name.clone());

        loop {
            let action = tokio::select! {
                line = server_lines.next_line() => match line? {
                    Some(line) => match ServerLine::parse(&line) {
                        Ok(line) => session.on_server_line(line),
                        Err(e) => {
                            warn!(error = %e, "Ignoring unrecognised server line");
                            ClientAction::None
                        }
                    },
                    None => {
                        debug!("Server closed the connection");
                        break;
                    }
                },

                line = input_lines.next_line(), if session.wants_input() => match line? {
                    Some(line) => session.on_input(strip_line_ending(&line)),
                    None => session.on_input_closed(),
                },
            };

            match action {
                ClientAction::None => {}
                ClientAction::Send(text) => {
                    writer.write_all(ClientLine::Chat(text).to_wire().as_bytes()).await?;
                    writer.flush().await?;
                }
                ClientAction::Display(text) => {
                    output.write_all(text.as_bytes()).await?;
                    output.write_all(b"\n").await?;
                    output.flush().await?;
                }
                ClientAction::Quit => {
                    // Before a name is accepted "/quit" would be taken as a
                    // name, so just close our side
                    if session.name().is_some() {
                        writer.write_all(ClientLine::Quit.to_wire().as_bytes()).await?;
                    }
                    writer.shutdown().await?;
                }
            }
        }

        Ok(())
    }
}
