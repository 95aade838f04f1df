//! Parsing of raw wire lines.

use chat_core::{DomainError, ScreenName};
use thiserror::Error;

use crate::message::ServerLine;

/// Errors raised while parsing server lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown server line: {0:?}")]
    UnknownCommand(String),

    #[error("invalid name in NAMEACCEPTED: {0}")]
    InvalidName(#[from] DomainError),
}

/// Removes a trailing `\n` or `\r\n` from a line read off the wire.
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

impl ServerLine {
    /// Parses one line received from the server.
    ///
    /// Matches on the leading command word. `MESSAGE` keeps everything
    /// after the single separating space, including further spaces.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownCommand` for unrecognised lines
    /// - `ProtocolError::InvalidName` if `NAMEACCEPTED` carries a blank name
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = strip_line_ending(line);
        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest),
            None => (line, ""),
        };

        match command {
            Self::SUBMIT_NAME => Ok(Self::SubmitName),
            Self::NAME_ACCEPTED => Ok(Self::NameAccepted(ScreenName::parse(rest)?)),
            Self::MESSAGE => Ok(Self::Message(rest.to_string())),
            _ => Err(ProtocolError::UnknownCommand(line.to_string())),
        }
    }
}
