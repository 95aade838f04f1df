//! Protocol line types for server and client communication.

use std::fmt;

use chat_core::ScreenName;

use crate::QUIT_COMMAND;

/// Lines sent by the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Asks the client for a screen name (`SUBMITNAME`).
    SubmitName,

    /// Confirms the claimed name (`NAMEACCEPTED <name>`).
    NameAccepted(ScreenName),

    /// Text the client displays verbatim (`MESSAGE <text>`).
    Message(String),
}

impl ServerLine {
    pub const SUBMIT_NAME: &'static str = "SUBMITNAME";
    pub const NAME_ACCEPTED: &'static str = "NAMEACCEPTED";
    pub const MESSAGE: &'static str = "MESSAGE";

    /// Creates a `MESSAGE` line from chat text.
    pub fn message(text: ChatText) -> Self {
        Self::Message(text.to_string())
    }

    /// Encodes the line for the wire, including the trailing newline.
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmitName => f.write_str(Self::SUBMIT_NAME),
            Self::NameAccepted(name) => write!(f, "{} {name}", Self::NAME_ACCEPTED),
            Self::Message(text) => write!(f, "{} {text}", Self::MESSAGE),
        }
    }
}

/// Payload of a `MESSAGE` line as produced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatText {
    /// `<name> has joined`
    Joined(ScreenName),

    /// `<name> has left`
    Left(ScreenName),

    /// `<name>: <text>`
    Chat { from: ScreenName, text: String },
}

impl fmt::Display for ChatText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined(name) => write!(f, "{name} has joined"),
            Self::Left(name) => write!(f, "{name} has left"),
            Self::Chat { from, text } => write!(f, "{from}: {text}"),
        }
    }
}

/// Lines sent by an Active client to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// Ends the session. Any line that starts with `/quit`, ignoring case.
    Quit,

    /// Chat text to broadcast.
    Chat(String),
}

impl ClientLine {
    /// Classifies a line (already stripped of its line ending).
    pub fn parse(line: &str) -> Self {
        let is_quit = line
            .get(..QUIT_COMMAND.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(QUIT_COMMAND));

        if is_quit {
            Self::Quit
        } else {
            Self::Chat(line.to_string())
        }
    }

    /// Encodes the line for the wire, including the trailing newline.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Quit => format!("{QUIT_COMMAND}\n"),
            Self::Chat(text) => format!("{text}\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ScreenName {
        ScreenName::parse(s).unwrap()
    }

    #[test]
    fn test_server_line_encoding() {
        assert_eq!(ServerLine::SubmitName.to_wire(), "SUBMITNAME\n");
        assert_eq!(
            ServerLine::NameAccepted(name("alice2")).to_wire(),
            "NAMEACCEPTED alice2\n"
        );
    }

    #[test]
    fn test_chat_text_formats() {
        assert_eq!(
            ServerLine::message(ChatText::Joined(name("bob"))).to_string(),
            "MESSAGE bob has joined"
        );
        assert_eq!(
            ServerLine::message(ChatText::Left(name("bob"))).to_string(),
            "MESSAGE bob has left"
        );
        assert_eq!(
            ServerLine::message(ChatText::Chat {
                from: name("bob"),
                text: "hello".to_string(),
            })
            .to_string(),
            "MESSAGE bob: hello"
        );
    }

    #[test]
    fn test_quit_is_case_insensitive_prefix() {
        assert_eq!(ClientLine::parse("/quit"), ClientLine::Quit);
        assert_eq!(ClientLine::parse("/QUIT"), ClientLine::Quit);
        assert_eq!(ClientLine::parse("/Quit now"), ClientLine::Quit);
        assert_eq!(ClientLine::parse("/quitter"), ClientLine::Quit);
    }

    #[test]
    fn test_non_quit_lines_are_chat() {
        assert_eq!(ClientLine::parse("/qui"), ClientLine::Chat("/qui".to_string()));
        assert_eq!(
            ClientLine::parse(" /quit"),
            ClientLine::Chat(" /quit".to_string())
        );
        assert_eq!(ClientLine::parse(""), ClientLine::Chat(String::new()));
    }

    #[test]
    fn test_quit_check_handles_multibyte_text() {
        // a 5-byte prefix would split the third 'é'
        assert_eq!(ClientLine::parse("éééé"), ClientLine::Chat("éééé".to_string()));
    }
}
