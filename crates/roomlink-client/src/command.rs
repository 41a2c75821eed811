//! Line commands for the `roomlink` binary.

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the active room.
    Say(String),
    /// `/join <room>`: create or join a room.
    Join(String),
    /// `/rooms`: refresh and list rooms.
    Rooms,
    /// `/read [room]`: mark a room as read, the active one by default.
    Read(Option<String>),
    /// `/status`: show connection status and unread count.
    Status,
    /// `/retry`: resend the last message that failed.
    Retry,
    /// `/help`.
    Help,
    /// `/quit`, `/q`.
    Quit,
    /// Command missing its argument.
    Usage(&'static str),
    /// Unrecognized command.
    Unknown(String),
}

impl Command {
    /// Usage text listing every command.
    pub const HELP: &'static str = "\
/join <room>   create or join a room
/rooms         list rooms
/read [room]   mark a room as read
/status        connection status
/retry         resend the last failed message
/quit          leave";

    /// Parse one line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let Some(cmd) = line.strip_prefix('/') else {
            return Some(Self::Say(line.to_string()));
        };

        let parts: Vec<&str> = cmd.split_whitespace().collect();
        let command = parts.first().copied().unwrap_or("");
        let arg = parts.get(1).map(|arg| (*arg).to_string());

        Some(match command {
            "join" => arg.map_or(Self::Usage("Usage: /join <room>"), Self::Join),
            "rooms" => Self::Rooms,
            "read" => Self::Read(arg),
            "status" => Self::Status,
            "retry" => Self::Retry,
            "help" | "h" => Self::Help,
            "quit" | "q" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        })
    }
}
