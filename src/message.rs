//! Incoming message surface handed to the dialogue handlers.

/// A single inbound text message from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Telegram user id of the sender.
    pub sender_id: i64,
    /// Raw message text.
    pub text: String,
}

impl IncomingMessage {
    pub fn new(sender_id: i64, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            text: text.into(),
        }
    }

    /// The slash-command name, if the message is a command.
    ///
    /// `/start@RandMeetBot args` yields `Some("start")`.
    pub fn command(&self) -> Option<&str> {
        let rest = self.text.trim_start().strip_prefix('/')?;
        let name = rest.split_whitespace().next()?;
        let name = name.split('@').next().unwrap_or(name);
        if name.is_empty() { None } else { Some(name) }
    }
}
