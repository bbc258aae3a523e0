//! Registry member definition
//!
//! Represents one accepted connection as seen by the registry: its
//! identifier, the name learned from its join payload, and the channel
//! feeding its writer task.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::ConnectionId;

/// Connected peer information
///
/// Dropping a member drops its sender, which lets the connection's writer
/// drain what is queued and then close the write direction of the stream.
#[derive(Debug)]
pub struct Member {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Display name (None until the join payload arrives)
    pub name: Option<String>,
    /// Registry → writer payload channel
    pub sender: mpsc::UnboundedSender<Bytes>,
}

impl Member {
    /// Create a new, not yet identified member
    pub fn new(id: ConnectionId, sender: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            id,
            name: None,
            sender,
        }
    }

    /// Queue a payload for this connection
    ///
    /// Returns an error if the writer has stopped (stream closed).
    pub fn send(&self, payload: Bytes) -> Result<(), SendError> {
        self.sender
            .send(payload)
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Get the display name for this member
    ///
    /// Returns the joined name if known, otherwise "unknown".
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    /// Record the name from the join payload
    ///
    /// The first name sticks; later calls are ignored.
    pub fn set_name(&mut self, name: String) -> bool {
        if self.name.is_some() {
            return false;
        }
        self.name = Some(name);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let member = Member::new(ConnectionId::new(), tx);

        assert!(member.name.is_none());
        assert_eq!(member.display_name(), "unknown");
    }

    #[test]
    fn test_member_name_is_immutable_once_set() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut member = Member::new(ConnectionId::new(), tx);

        assert!(member.set_name("Ann".to_string()));
        assert!(!member.set_name("Bob".to_string()));
        assert_eq!(member.display_name(), "Ann");
    }

    #[test]
    fn test_member_send_after_writer_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let member = Member::new(ConnectionId::new(), tx);
        drop(rx);

        assert!(member.send(Bytes::from_static(b"hi")).is_err());
    }
}
