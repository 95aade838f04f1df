//! Per-session outbound path.
//!
//! Every connection owns a bounded queue of outbound lines drained by a
//! dedicated writer task. Broadcasters only ever `try_send` into the queue,
//! so a slow or dead peer cannot stall delivery to anyone else.
//!
//! ```text
//!  handler ──send──┐
//!                  ▼
//!  registry ──try_send──▶ [ bounded mpsc ] ──▶ writer task ──▶ socket
//! ```
//!
//! The session's `disconnect` token is shared by three parties: the writer
//! task cancels it when a write fails or times out, the registry cancels it
//! when the queue overflows, and the handler watches it to leave its read
//! loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chat_core::SessionId;

/// One encoded protocol line without its trailing newline.
///
/// Shared so that a broadcast allocates the text once.
pub type OutboundLine = Arc<str>;

/// Result of a non-blocking delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The line is queued for the writer task.
    Queued,
    /// The queue is full; the peer is not keeping up.
    Full,
    /// The writer task has exited.
    Closed,
}

/// Sending side of a session's outbound queue.
///
/// Cheap to clone. The registry holds one clone while the session is Active;
/// the handler keeps its own for direct replies.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    id: SessionId,
    sender: mpsc::Sender<OutboundLine>,
    disconnect: CancellationToken,
}

impl SessionWriter {
    /// Creates a writer for an existing queue.
    pub fn new(
        id: SessionId,
        sender: mpsc::Sender<OutboundLine>,
        disconnect: CancellationToken,
    ) -> Self {
        Self {
            id,
            sender,
            disconnect,
        }
    }

    /// Returns the owning session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queues a line without waiting.
    pub fn try_deliver(&self, line: &OutboundLine) -> Delivery {
        match self.sender.try_send(Arc::clone(line)) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Queues a line, waiting for space. Used for the session's own replies.
    ///
    /// Returns `false` if the writer task has exited.
    pub async fn deliver(&self, line: OutboundLine) -> bool {
        self.sender.send(line).await.is_ok()
    }

    /// Signals the session's handler to disconnect.
    pub fn disconnect(&self) {
        self.disconnect.cancel();
    }

    /// Returns true once the session has been told to disconnect.
    pub fn is_disconnected(&self) -> bool {
        self.disconnect.is_cancelled()
    }
}

/// Creates a session's outbound queue.
///
/// Returns the writer handle and the receiving end for `spawn_writer_task`.
pub fn outbound_channel(
    id: SessionId,
    capacity: usize,
    disconnect: CancellationToken,
) -> (SessionWriter, mpsc::Receiver<OutboundLine>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (SessionWriter::new(id, sender, disconnect), receiver)
}

/// Spawns the task that drains a session's queue into its socket.
///
/// The task ends when every `SessionWriter` clone is dropped (after which it
/// shuts the write half down) or when a write fails or exceeds
/// `write_timeout` (after which it cancels `disconnect`).
pub fn spawn_writer_task<W>(
    id: SessionId,
    writer: W,
    mut receiver: mpsc::Receiver<OutboundLine>,
    write_timeout: Duration,
    disconnect: CancellationToken,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);

        while let Some(line) = receiver.recv().await {
            let write = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                Ok::<(), std::io::Error>(())
            };

            match timeout(write_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(session = %id, error = %e, "Write failed, disconnecting");
                    disconnect.cancel();
                    return;
                }
                Err(_) => {
                    debug!(session = %id, "Write timed out, disconnecting");
                    disconnect.cancel();
                    return;
                }
            }
        }

        // All senders gone: half-close so the peer sees EOF
        let _ = timeout(write_timeout, writer.shutdown()).await;
    })
}
