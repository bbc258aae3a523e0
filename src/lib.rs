//! LAN Broadcast Chat Library
//!
//! A broadcast chat server and terminal client over plain TCP, built on
//! tokio.
//!
//! # Features
//! - Join by sending a display name as the first payload
//! - Every payload relayed verbatim to every connection, sender included
//! - `-~~name~~-` disconnect frame with a leave announcement
//! - Owner-gated or persistent server shutdown
//! - Duplex client session with a bounded, most-recent-first chat log
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - The connection registry is a single actor task owning every member
//! - Each connection has a dispatcher task (reads) and a writer task (writes)
//! - No locks on the registry - all access goes through message passing
//!
//! # Example
//! ```ignore
//! use lanchat::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::bind(ServerConfig::default().with_persistent(true)).unwrap();
//!     let reason = server.run().await.unwrap();
//!     println!("stopped: {}", reason);
//! }
//! ```

pub mod chat_log;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod member;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod terminal;
pub mod types;

// Re-export main types for convenience
pub use chat_log::{ChatLine, ChatLog, SharedChatLog};
pub use config::{ClientConfig, ServerConfig};
pub use dispatcher::{spawn_connection, DispatchOutcome, Dispatcher};
pub use error::{AppError, SendError};
pub use member::Member;
pub use message::{
    decode_disconnect_name, encode_disconnect_frame, is_disconnect_frame, Announcement,
};
pub use registry::{Registry, RegistryActor, RegistryCommand, RegistryHandle};
pub use server::Server;
pub use session::{connect, DuplexSession, SessionEnd};
pub use terminal::{ChatDisplay, InputSource, TerminalDisplay, TerminalInput};
pub use types::{ConnectionId, ShutdownReason};
