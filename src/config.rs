//! Server and client configuration
//!
//! Defaults match the fixed network parameters of the protocol; the
//! binary overrides them from command-line flags and tests bind port 0.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Well-known chat port
pub const DEFAULT_PORT: u16 = 38742;

/// Maximum pending connections on the listening socket
pub const DEFAULT_BACKLOG: u32 = 12;

/// Server-side receive cap in bytes (join name and every relayed payload)
pub const DEFAULT_MAX_PAYLOAD: usize = 120;

/// Accept-loop polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long shutdown waits for queued payloads to be flushed
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default display width in columns
pub const DEFAULT_WIDTH: usize = 80;

/// Default display height in lines
pub const DEFAULT_LINES: usize = 24;

/// Lines of the display not available to the chat log (header + input)
const RESERVED_LINES: usize = 2;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (all interfaces by default)
    pub addr: SocketAddr,
    /// Listen backlog
    pub backlog: u32,
    /// Keep running after the owner session leaves
    pub persistent: bool,
    /// Accept-loop polling interval
    pub poll_interval: Duration,
    /// Receive cap for each read on a connection
    pub max_payload: usize,
    /// Upper bound on flushing writers during shutdown
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            backlog: DEFAULT_BACKLOG,
            persistent: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_payload: DEFAULT_MAX_PAYLOAD,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Set the bind address
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set persistent mode
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set the accept-loop polling interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to connect to
    pub server: SocketAddr,
    /// Display name sent as the join payload
    pub name: String,
    /// Display width in columns
    pub width: usize,
    /// Display height in lines
    pub lines: usize,
}

impl ClientConfig {
    /// Create a config for the given server and name with default display size
    pub fn new(server: SocketAddr, name: impl Into<String>) -> Self {
        Self {
            server,
            name: name.into(),
            width: DEFAULT_WIDTH,
            lines: DEFAULT_LINES,
        }
    }

    /// Set the display size
    pub fn with_display(mut self, width: usize, lines: usize) -> Self {
        self.width = width;
        self.lines = lines;
        self
    }

    /// Receive cap for the inbound loop
    ///
    /// One column short of the display width, never zero.
    pub fn receive_cap(&self) -> usize {
        self.width.saturating_sub(1).max(1)
    }

    /// Number of chat log lines that fit on the display
    pub fn log_capacity(&self) -> usize {
        self.lines.saturating_sub(RESERVED_LINES).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert!(config.addr.ip().is_unspecified());
        assert_eq!(config.backlog, 12);
        assert_eq!(config.max_payload, 120);
        assert!(!config.persistent);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_client_display_budget() {
        let addr: SocketAddr = "127.0.0.1:38742".parse().unwrap();
        let config = ClientConfig::new(addr, "Ann");
        assert_eq!(config.receive_cap(), 79);
        assert_eq!(config.log_capacity(), 22);
    }

    #[test]
    fn test_client_display_budget_never_zero() {
        let addr: SocketAddr = "127.0.0.1:38742".parse().unwrap();
        let config = ClientConfig::new(addr, "Ann").with_display(0, 1);
        assert_eq!(config.receive_cap(), 1);
        assert_eq!(config.log_capacity(), 1);
    }
}
