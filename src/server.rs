//! Server lifecycle controller
//!
//! Binds the listening socket, runs the accept loop, and decides when to
//! stop. The first accepted connection is the owner session. In
//! non-persistent mode the server stops once the owner's dispatcher ends;
//! in persistent mode it stops once everyone who joined has left.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::{spawn_connection, ConnectionTasks};
use crate::error::AppError;
use crate::message::Announcement;
use crate::registry::RegistryHandle;
use crate::types::ShutdownReason;

/// The broadcast chat server
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    registry: RegistryHandle,
    /// Name of whoever joined first; set once, never cleared
    owner_name: Arc<OnceLock<String>>,
}

impl Server {
    /// Bind the listening socket and start the registry actor
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let socket = if config.addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(config.addr)?;
        let listener = socket.listen(config.backlog)?;

        info!(
            "Chat server listening on {} (persistent: {})",
            listener.local_addr()?,
            config.persistent
        );

        Ok(Self {
            listener,
            config,
            registry: RegistryHandle::spawn(),
            owner_name: Arc::new(OnceLock::new()),
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Name of the first peer to join, if anyone has
    pub fn owner_name(&self) -> Option<&str> {
        self.owner_name.get().map(String::as_str)
    }

    /// Shared handle to the first-join marker
    pub fn owner_marker(&self) -> Arc<OnceLock<String>> {
        Arc::clone(&self.owner_name)
    }

    /// Run the accept loop until the shutdown policy triggers
    ///
    /// The listening socket is closed when this returns. Connection tasks
    /// are released on every exit path, including errors.
    pub async fn run(self) -> Result<ShutdownReason, AppError> {
        let mut sessions = Sessions::default();
        let result = self.accept_until_shutdown(&mut sessions).await;
        sessions.shutdown(self.config.drain_timeout).await;

        match &result {
            Ok(reason) => info!(
                "Chat server stopped ({}); first to join was {}",
                reason,
                self.owner_name().unwrap_or("nobody")
            ),
            Err(e) => error!("Chat server failed: {}", e),
        }
        result
    }

    async fn accept_until_shutdown(
        &self,
        sessions: &mut Sessions,
    ) -> Result<ShutdownReason, AppError> {
        loop {
            match tokio::time::timeout(self.config.poll_interval, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!("New connection from {}", peer);
                    let tasks = spawn_connection(
                        stream,
                        peer,
                        self.registry.clone(),
                        Arc::clone(&self.owner_name),
                        self.config.max_payload,
                    )
                    .await?;
                    sessions.track(tasks);
                }
                Ok(Err(e)) => {
                    error!("Failed to accept connection: {}", e);
                }
                Err(_) => {
                    // Poll interval elapsed
                }
            }

            sessions.prune();

            if !self.config.persistent {
                if sessions.owner_finished() {
                    let closed = self
                        .registry
                        .close_all(Announcement::Farewell.to_bytes())
                        .await?;
                    info!("Owner session ended; closed {} remaining connections", closed);
                    return Ok(ShutdownReason::OwnerLeft);
                }
            } else if sessions.clients_connected && self.registry.len().await? == 0 {
                info!("All clients have left");
                return Ok(ShutdownReason::AllLeft);
            }
        }
    }
}

/// Tasks of every accepted connection, the owner's dispatcher kept apart
#[derive(Default)]
struct Sessions {
    owner: Option<JoinHandle<()>>,
    dispatchers: Vec<JoinHandle<()>>,
    writers: Vec<JoinHandle<()>>,
    clients_connected: bool,
}

impl Sessions {
    fn track(&mut self, tasks: ConnectionTasks) {
        self.clients_connected = true;
        self.writers.push(tasks.writer);

        if self.owner.is_none() {
            debug!("Connection {} is the owner session", tasks.id);
            self.owner = Some(tasks.dispatcher);
        } else {
            self.dispatchers.push(tasks.dispatcher);
        }
    }

    fn prune(&mut self) {
        self.dispatchers.retain(|handle| !handle.is_finished());
        self.writers.retain(|handle| !handle.is_finished());
    }

    fn owner_finished(&self) -> bool {
        self.owner
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(false)
    }

    /// Abort every dispatcher, then give writers `drain_timeout` to flush
    async fn shutdown(self, drain_timeout: Duration) {
        // Release dispatchers still blocked on a receive
        for handle in self.owner.iter().chain(&self.dispatchers) {
            handle.abort();
        }

        // Members are gone, so every writer ends once its queue is flushed
        if tokio::time::timeout(drain_timeout, join_all(self.writers))
            .await
            .is_err()
        {
            warn!("Timed out flushing connections on shutdown");
        }
    }
}
