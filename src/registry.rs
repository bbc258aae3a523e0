//! Connection registry actor
//!
//! The registry owns the set of open connections. It lives inside a single
//! task and is reachable only through [`RegistryHandle`], so every
//! register, unregister and broadcast is serialized by the command channel.
//! No locks are needed and iteration never observes a half-applied mutation.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::AppError;
use crate::member::Member;
use crate::message::Announcement;
use crate::types::ConnectionId;

/// Channel buffer size for registry commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Set of currently open connections
///
/// A member is present iff its connection is open and has not processed
/// a disconnect.
#[derive(Debug, Default)]
pub struct Registry {
    members: HashMap<ConnectionId, Member>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member
    ///
    /// Returns false (and keeps the existing entry) if the id is already present.
    pub fn register(&mut self, member: Member) -> bool {
        if self.members.contains_key(&member.id) {
            return false;
        }
        self.members.insert(member.id, member);
        true
    }

    /// Remove a member, returning it if it was present
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Member> {
        self.members.remove(&id)
    }

    /// Record the name learned from a member's join payload
    pub fn identify(&mut self, id: ConnectionId, name: String) -> bool {
        self.members
            .get_mut(&id)
            .map(|member| member.set_name(name))
            .unwrap_or(false)
    }

    /// Apply `f` to every current member
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Member),
    {
        self.members.values().for_each(f);
    }

    /// Queue a payload for every current member
    ///
    /// Returns how many members accepted it. A member whose writer already
    /// stopped is skipped; its dispatcher will unregister it.
    pub fn broadcast(&self, payload: &Bytes) -> usize {
        let mut delivered = 0;
        self.for_each(|member| match member.send(payload.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!("Skipping {} ({}): {}", member.id, member.display_name(), e),
        });
        delivered
    }

    /// Check whether a connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if no connection is registered
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Remove every member
    pub fn drain(&mut self) -> Vec<Member> {
        self.members.drain().map(|(_, member)| member).collect()
    }
}

/// Commands sent to the registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Newly accepted connection
    Register { member: Member },
    /// Connection sent its join payload
    Identify { id: ConnectionId, name: String },
    /// Connection departed; dropping the member closes its writer
    Unregister {
        id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    /// Relay a payload to every registered connection
    Broadcast { payload: Bytes },
    /// Query the number of registered connections
    Count { reply: oneshot::Sender<usize> },
    /// Send a farewell to everyone, then close every connection
    CloseAll {
        farewell: Bytes,
        reply: oneshot::Sender<usize>,
    },
}

/// The registry actor
///
/// Processes commands until every handle has been dropped.
pub struct RegistryActor {
    registry: Registry,
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    /// Create a new actor with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            registry: Registry::new(),
            receiver,
        }
    }

    /// Run the registry event loop
    pub async fn run(mut self) {
        debug!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("Registry stopped");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { member } => {
                let id = member.id;
                if self.registry.register(member) {
                    debug!("Registered {} (total {})", id, self.registry.len());
                }
            }
            RegistryCommand::Identify { id, name } => {
                if !self.registry.identify(id, name) {
                    debug!("Ignoring repeated or unknown join for {}", id);
                }
            }
            RegistryCommand::Unregister { id, reply } => {
                let removed = self.registry.unregister(id).is_some();
                if removed {
                    debug!("Unregistered {} (total {})", id, self.registry.len());
                }
                let _ = reply.send(removed);
            }
            RegistryCommand::Broadcast { payload } => {
                let delivered = self.registry.broadcast(&payload);
                debug!("Broadcast {} bytes to {} connections", payload.len(), delivered);
            }
            RegistryCommand::Count { reply } => {
                let _ = reply.send(self.registry.len());
            }
            RegistryCommand::CloseAll { farewell, reply } => {
                let delivered = self.registry.broadcast(&farewell);
                let closed = self.registry.drain().len();
                info!("Closed {} connections ({} notified)", closed, delivered);
                let _ = reply.send(closed);
            }
        }
    }
}

/// Cloneable handle to the registry actor
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Wrap an existing command sender
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Spawn a registry actor on the current runtime and return its handle
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        tokio::spawn(RegistryActor::new(cmd_rx).run());
        Self::new(cmd_tx)
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<(), AppError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::RegistryClosed)
    }

    /// Add a connection (no-op if already present)
    pub async fn register(&self, member: Member) -> Result<(), AppError> {
        self.send(RegistryCommand::Register { member }).await
    }

    /// Record a connection's name
    pub async fn identify(&self, id: ConnectionId, name: String) -> Result<(), AppError> {
        self.send(RegistryCommand::Identify { id, name }).await
    }

    /// Remove a connection; idempotent
    ///
    /// Returns whether the connection was still registered.
    pub async fn unregister(&self, id: ConnectionId) -> Result<bool, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Unregister { id, reply }).await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    /// Relay raw bytes to every registered connection
    pub async fn broadcast(&self, payload: Bytes) -> Result<(), AppError> {
        self.send(RegistryCommand::Broadcast { payload }).await
    }

    /// Relay a server announcement to every registered connection
    pub async fn announce(&self, announcement: Announcement) -> Result<(), AppError> {
        self.broadcast(announcement.to_bytes()).await
    }

    /// Number of registered connections
    pub async fn len(&self) -> Result<usize, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Count { reply }).await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    /// Send a farewell to every connection and close them all
    ///
    /// Returns how many connections were closed.
    pub async fn close_all(&self, farewell: Bytes) -> Result<usize, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::CloseAll { farewell, reply }).await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }
}
