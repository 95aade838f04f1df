//! Chat Protocol - Line-oriented wire protocol
//!
//! Every message is one UTF-8 line terminated by `\n`. The server speaks
//! `SUBMITNAME`, `NAMEACCEPTED <name>` and `MESSAGE <text>`; the client sends
//! a proposed name, then chat lines or the `/quit` command.

pub mod message;
pub mod parse;

pub use message::{ChatText, ClientLine, ServerLine};
pub use parse::{strip_line_ending, ProtocolError};

/// Well-known TCP port of the chat server.
pub const DEFAULT_PORT: u16 = 59001;

/// Case-insensitive prefix that ends a chat session.
pub const QUIT_COMMAND: &str = "/quit";
