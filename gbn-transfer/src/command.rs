//! Line-based control commands sent by clients.
//!
//! ```text
//! INFO <name>       → "<size in bytes>" | "404 Not Found"
//! DOWNLOAD <name>   → data packets     | "404 Not Found"
//! ```
//!
//! Commands are UTF-8 text; surrounding whitespace is ignored.  Anything else
//! is not a command and the server drops it.

/// Reply sent for a name that is not in the catalog.
pub const NOT_FOUND: &str = "404 Not Found";

const INFO: &str = "INFO ";
const DOWNLOAD: &str = "DOWNLOAD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Query the byte length of a file.
    Info(String),
    /// Start a transfer of a file to the sender of the command.
    Download(String),
}

impl Command {
    /// Parse a raw datagram.  Returns `None` for anything unrecognised.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(buf).ok()?.trim();
        if let Some(name) = text.strip_prefix(INFO) {
            return non_empty(name).map(Command::Info);
        }
        if let Some(name) = text.strip_prefix(DOWNLOAD) {
            return non_empty(name).map(Command::Download);
        }
        None
    }

    /// Wire form, as a client sends it.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Info(name) => format!("{INFO}{name}"),
            Command::Download(name) => format!("{DOWNLOAD} {name}"),
        }
        .into_bytes()
    }
}

fn non_empty(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
