//! Chat client - Library modules
//!
//! This library provides the line-oriented terminal client for the chat room.
//!
//! # Architecture
//!
//! The client runs one loop over two line sources:
//!
//! 1. **Server lines**: parsed into `ServerLine` and fed to `ClientSession`
//! 2. **User input**: read only while the session wants input (naming or chatting)
//!
//! `ClientSession` decides what to send and what to show; `ChatClient` does the I/O.

pub mod client;
pub mod error;
pub mod state;

// Re-export commonly used types
pub use client::{ChatClient, ClientConfig};
pub use error::{ClientError, Result};
pub use state::{ClientAction, ClientPhase, ClientSession};
