//! Wire protocol definitions
//!
//! Plain UTF-8 text over a byte stream, with no length prefix. The only
//! structured frame is the disconnect sentinel `-~~<name>~~-`; everything
//! else is relayed verbatim.
//!
//! The protocol assumes one send arrives as one receive within the size
//! cap. Large or fragmented messages are not reassembled.

use bytes::Bytes;

/// Leading bytes of a disconnect frame
pub const DISCONNECT_PREFIX: &[u8] = b"-~~";

/// Trailing bytes of a disconnect frame
pub const DISCONNECT_SUFFIX: &[u8] = b"~~-";

/// Author tag used for server-authored announcements
pub const SERVER_AUTHOR: &str = "SERVER";

/// Announcement sent to every remaining connection on non-persistent shutdown
pub const FAREWELL: &str = "SERVER: Disconnected... Good-bye!";

/// Marker for lines injected into the local chat log only (never sent)
pub const LOCAL_NOTICE_MARKER: &str = "~!~";

/// User text that ends a client session
pub const QUIT_COMMAND: &str = "/q";

/// Check whether a payload is a disconnect frame
///
/// Short or malformed input is simply not a frame.
pub fn is_disconnect_frame(payload: &[u8]) -> bool {
    payload.len() >= DISCONNECT_PREFIX.len() + DISCONNECT_SUFFIX.len()
        && payload.starts_with(DISCONNECT_PREFIX)
        && payload.ends_with(DISCONNECT_SUFFIX)
}

/// Extract the departing name from a disconnect frame
///
/// Returns None when the payload is not a frame.
pub fn decode_disconnect_name(payload: &[u8]) -> Option<String> {
    if !is_disconnect_frame(payload) {
        return None;
    }
    let inner = &payload[DISCONNECT_PREFIX.len()..payload.len() - DISCONNECT_SUFFIX.len()];
    Some(String::from_utf8_lossy(inner).into_owned())
}

/// Build the disconnect frame a client sends before closing
pub fn encode_disconnect_frame(name: &str) -> Bytes {
    let mut frame =
        Vec::with_capacity(DISCONNECT_PREFIX.len() + name.len() + DISCONNECT_SUFFIX.len());
    frame.extend_from_slice(DISCONNECT_PREFIX);
    frame.extend_from_slice(name.as_bytes());
    frame.extend_from_slice(DISCONNECT_SUFFIX);
    Bytes::from(frame)
}

/// Server → Client announcement
///
/// Rendered as `SERVER: <text>` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// A peer finished joining
    Joined { name: String },
    /// A peer sent its disconnect frame
    Left { name: String },
    /// The server is shutting down
    Farewell,
}

impl Announcement {
    /// Encode as wire bytes
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl std::fmt::Display for Announcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Announcement::Joined { name } => {
                write!(f, "{}: {} has joined the chat!", SERVER_AUTHOR, name)
            }
            Announcement::Left { name } => {
                write!(f, "{}: {} has left the chat...", SERVER_AUTHOR, name)
            }
            Announcement::Farewell => f.write_str(FAREWELL),
        }
    }
}

/// Format one line of user input as a chat message
///
/// The text is trimmed, then prefixed with the author's name.
pub fn format_chat_line(name: &str, text: &str) -> String {
    format!("{}: {}", name, text.trim())
}

/// Check whether a line of user input is the quit command
pub fn is_quit_command(text: &str) -> bool {
    text.trim() == QUIT_COMMAND
}
