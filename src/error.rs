//! Error types for the chat service
//!
//! Defines application-level errors and member send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Malformed frames and zero-length receives are part of the protocol
/// and never surface here.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (bind, accept, connect, or stream write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry actor has stopped and no longer accepts commands
    #[error("Connection registry closed")]
    RegistryClosed,

    /// Terminal line editor failure
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// A spawned task panicked or was cancelled unexpectedly
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Host/port pair that does not resolve to a socket address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Member send errors
///
/// Occurs when a payload is queued for a connection whose writer has gone away.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
