//! Chat Core - Shared types for the chat room
//!
//! This crate provides the domain types shared between
//! the server (chatd) and the terminal client (chat).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod name;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use name::ScreenName;
pub use session::{SessionId, SessionState};
