//! Client-side session state.
//!
//! `ClientSession` is pure: it turns server lines and user input into
//! `ClientAction`s and never touches a socket, so the whole name handshake
//! can be tested without a server.

use chat_core::ScreenName;
use chat_protocol::{ClientLine, ServerLine};

/// Where the client is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientPhase {
    /// Waiting for the server to prompt or answer.
    #[default]
    Waiting,
    /// The server asked for a name and the user must type one.
    NeedName,
    /// Name accepted; input lines are chat.
    Chatting,
    /// `/quit` was sent.
    Finished,
}

/// What the client loop should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Nothing to do.
    None,
    /// Send this line (without line ending) to the server.
    Send(String),
    /// Show this text to the user.
    Display(String),
    /// Send `/quit` and stop reading input.
    Quit,
}

/// State of one client connection.
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    phase: ClientPhase,
    /// Name from the command line, tried once on the first prompt
    preferred: Option<String>,
    name: Option<ScreenName>,
    /// Number of SUBMITNAME prompts seen
    prompts: u32,
}

impl ClientSession {
    /// Creates a session that will offer `preferred` on the first prompt.
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            preferred: preferred.filter(|name| !name.trim().is_empty()),
            ..Default::default()
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// The accepted screen name, once the server confirmed it.
    pub fn name(&self) -> Option<&ScreenName> {
        self.name.as_ref()
    }

    /// Returns true while user input should be read.
    pub fn wants_input(&self) -> bool {
        matches!(self.phase, ClientPhase::NeedName | ClientPhase::Chatting)
    }

    /// Handles one line from the server.
    pub fn on_server_line(&mut self, line: ServerLine) -> ClientAction {
        match line {
            ServerLine::SubmitName => {
                self.prompts += 1;
                if let Some(name) = self.preferred.take() {
                    return ClientAction::Send(name);
                }
                self.phase = ClientPhase::NeedName;
                if self.prompts > 1 {
                    ClientAction::Display("Name unavailable, choose another:".to_string())
                } else {
                    ClientAction::Display("Choose a screen name:".to_string())
                }
            }
            ServerLine::NameAccepted(name) => {
                let text = format!("Joined as {name}");
                self.name = Some(name);
                self.phase = ClientPhase::Chatting;
                ClientAction::Display(text)
            }
            ServerLine::Message(text) => ClientAction::Display(text),
        }
    }

    /// Handles one line typed by the user (line ending already removed).
    pub fn on_input(&mut self, line: &str) -> ClientAction {
        match self.phase {
            ClientPhase::NeedName => {
                if line.trim().is_empty() {
                    return ClientAction::None;
                }
                self.phase = ClientPhase::Waiting;
                ClientAction::Send(line.to_string())
            }
            ClientPhase::Chatting => match ClientLine::parse(line) {
                ClientLine::Quit => self.quit(),
                ClientLine::Chat(text) => ClientAction::Send(text),
            },
            ClientPhase::Waiting | ClientPhase::Finished => ClientAction::None,
        }
    }

    /// Handles the end of user input.
    pub fn on_input_closed(&mut self) -> ClientAction {
        match self.phase {
            ClientPhase::Finished => ClientAction::None,
            _ => self.quit(),
        }
    }

    fn quit(&mut self) -> ClientAction {
        self.phase = ClientPhase::Finished;
        ClientAction::Quit
    }
}
