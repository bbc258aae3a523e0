//! Basic type definitions for the chat service
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based server-side connection identifier
//! - `ShutdownReason`: why a server's accept loop stopped

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 so the registry can key members without holding
/// on to the stream itself. Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the server stopped accepting connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Non-persistent mode: the owner session's dispatcher terminated
    OwnerLeft,
    /// Persistent mode: every connection that ever joined has departed
    AllLeft,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::OwnerLeft => write!(f, "owner session ended"),
            ShutdownReason::AllLeft => write!(f, "all clients left"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_shutdown_reason_display() {
        assert_eq!(ShutdownReason::OwnerLeft.to_string(), "owner session ended");
        assert_eq!(ShutdownReason::AllLeft.to_string(), "all clients left");
    }
}
