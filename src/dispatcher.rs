//! Per-connection broadcast dispatcher
//!
//! Every accepted stream is split in two: a writer task drains the member's
//! payload channel into the write half, and a dispatcher reads the peer's
//! bytes and relays them through the registry.
//!
//! A dispatcher moves through three states. Joining waits for the first
//! payload and takes it whole as the peer's name. Active relays every
//! payload verbatim, the sender included. Closed is reached on a disconnect
//! frame or when the peer's stream ends.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::member::Member;
use crate::message::{decode_disconnect_name, is_disconnect_frame, Announcement};
use crate::registry::RegistryHandle;
use crate::types::ConnectionId;

/// How a dispatcher reached its Closed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The peer sent a disconnect frame carrying this name
    Departed { name: String },
    /// The stream ended or failed without a disconnect frame
    PeerClosed { name: Option<String> },
}

/// Dispatcher lifecycle state
#[derive(Debug)]
enum DispatchState {
    Joining,
    Active { name: String },
    Closed(DispatchOutcome),
}

/// Tasks serving one accepted connection
#[derive(Debug)]
pub struct ConnectionTasks {
    /// Connection identifier
    pub id: ConnectionId,
    /// Writer task; finishes once the member is unregistered and its queue drained
    pub writer: JoinHandle<()>,
    /// Dispatcher task; finishes when the connection reaches Closed
    pub dispatcher: JoinHandle<()>,
}

/// Register an accepted stream and start its writer and dispatcher
pub async fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: RegistryHandle,
    owner_name: Arc<OnceLock<String>>,
    max_payload: usize,
) -> Result<ConnectionTasks, AppError> {
    let id = ConnectionId::new();
    let (reader, writer) = stream.into_split();

    // Create channel for registry -> peer payloads
    let (payload_tx, payload_rx) = mpsc::unbounded_channel::<Bytes>();
    registry.register(Member::new(id, payload_tx)).await?;

    let writer = tokio::spawn(write_loop(id, writer, payload_rx));

    let dispatcher = Dispatcher::new(id, peer, reader, registry, owner_name, max_payload);
    let dispatcher = tokio::spawn(async move {
        match dispatcher.run().await {
            Ok(outcome) => debug!("Dispatcher for {} closed: {:?}", id, outcome),
            Err(e) => error!("Dispatcher error for {}: {}", id, e),
        }
    });

    Ok(ConnectionTasks {
        id,
        writer,
        dispatcher,
    })
}

/// Drain queued payloads into the stream
///
/// Ends when the member is dropped from the registry, then closes the
/// write direction so the peer observes end-of-stream.
pub async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut payload_rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(payload) = payload_rx.recv().await {
        if let Err(e) = writer.write_all(&payload).await {
            debug!("Write to {} failed, ending writer: {}", id, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
    debug!("Writer ended for {}", id);
}

/// Receive loop for one connection
pub struct Dispatcher {
    id: ConnectionId,
    peer: SocketAddr,
    reader: OwnedReadHalf,
    registry: RegistryHandle,
    owner_name: Arc<OnceLock<String>>,
    buf: Vec<u8>,
}

impl Dispatcher {
    /// Create a dispatcher reading at most `max_payload` bytes per receive
    pub fn new(
        id: ConnectionId,
        peer: SocketAddr,
        reader: OwnedReadHalf,
        registry: RegistryHandle,
        owner_name: Arc<OnceLock<String>>,
        max_payload: usize,
    ) -> Self {
        Self {
            id,
            peer,
            reader,
            registry,
            owner_name,
            buf: vec![0; max_payload.max(1)],
        }
    }

    /// Run until the connection is closed
    pub async fn run(mut self) -> Result<DispatchOutcome, AppError> {
        let mut state = DispatchState::Joining;
        loop {
            state = match state {
                DispatchState::Joining => self.join().await?,
                DispatchState::Active { name } => self.relay(name).await?,
                DispatchState::Closed(outcome) => return Ok(outcome),
            };
        }
    }

    /// Bounded receive; a read error counts as end-of-stream
    async fn receive(&mut self) -> Bytes {
        match self.reader.read(&mut self.buf).await {
            Ok(n) => Bytes::copy_from_slice(&self.buf[..n]),
            Err(e) => {
                warn!("Read error from {} ({}): {}", self.id, self.peer, e);
                Bytes::new()
            }
        }
    }

    /// Joining: take the first payload as the peer's name
    async fn join(&mut self) -> Result<DispatchState, AppError> {
        let payload = self.receive().await;
        if payload.is_empty() {
            debug!("{} closed before joining", self.peer);
            self.registry.unregister(self.id).await?;
            return Ok(DispatchState::Closed(DispatchOutcome::PeerClosed {
                name: None,
            }));
        }

        let name = String::from_utf8_lossy(&payload).into_owned();
        if self.owner_name.set(name.clone()).is_ok() {
            info!("'{}' is the first to join", name);
        }

        self.registry.identify(self.id, name.clone()).await?;
        self.registry
            .announce(Announcement::Joined { name: name.clone() })
            .await?;
        info!("'{}' joined from {}", name, self.peer);

        Ok(DispatchState::Active { name })
    }

    /// Active: relay one payload, or close on a disconnect frame
    async fn relay(&mut self, name: String) -> Result<DispatchState, AppError> {
        let payload = self.receive().await;

        if is_disconnect_frame(&payload) {
            self.registry.unregister(self.id).await?;
            let departed = decode_disconnect_name(&payload).unwrap_or(name);
            self.registry
                .announce(Announcement::Left {
                    name: departed.clone(),
                })
                .await?;
            info!("'{}' left the chat", departed);
            return Ok(DispatchState::Closed(DispatchOutcome::Departed {
                name: departed,
            }));
        }

        // An empty payload is relayed like any other; it writes nothing
        let peer_closed = payload.is_empty();
        self.registry.broadcast(payload).await?;

        if peer_closed {
            self.registry.unregister(self.id).await?;
            info!("'{}' closed the connection without leaving", name);
            return Ok(DispatchState::Closed(DispatchOutcome::PeerClosed {
                name: Some(name),
            }));
        }

        Ok(DispatchState::Active { name })
    }
}
