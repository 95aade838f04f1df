//! Error types for the chat client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use thiserror::Error;

/// Chat client errors.
///
/// Connection failures carry the address so the user can tell a typo from
/// a server that is not running.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the server.
    #[error("Failed to connect to {addr}: {error}")]
    Connect {
        /// Address that was dialled
        addr: String,
        /// Underlying reason
        error: String,
    },

    /// I/O error on the connection or the terminal.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
