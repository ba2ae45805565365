//! Core server: accepts connections and starts a session for each.
//!
//! Owns the listening socket and the shared relay state (message log,
//! connection registry). Runs the accept loop until a stop is requested,
//! then stops every live session.

use crate::config::ServerConfig;
use crate::session::Session;
use crate::state::RelayState;
use crate::stats::{self, ServerStats};
use pollchat_core::{ChatError, ChatResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// The pollchat server instance.
pub struct ChatServer {
    /// Server configuration.
    config: ServerConfig,
    /// Log, registry and session options shared with every session.
    relay: Arc<RelayState>,
    listener: TcpListener,
    /// Flipped to `true` to stop the accept loop.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

/// Cloneable operator-side handle to a running server.
#[derive(Clone)]
pub struct ServerHandle {
    relay: Arc<RelayState>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ChatServer {
    /// Bind the listening socket. Failure here is fatal for the process.
    pub async fn bind(config: ServerConfig) -> ChatResult<Self> {
        let addr = config.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChatError::Transport(format!("bind {addr} failed: {e}")))?;
        let relay = Arc::new(RelayState::new(config.session_options()));

        Ok(Self {
            config,
            relay,
            listener,
            shutdown_tx: Arc::new(watch::channel(false).0),
        })
    }

    pub fn local_addr(&self) -> ChatResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            relay: self.relay.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Accept connections until [`ServerHandle::stop`] is called, then stop
    /// every live session.
    pub async fn run(self) -> ChatResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        if let Some(period) = self.config.stats_interval {
            let relay = self.relay.clone();
            let rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move { stats::report(&relay.registry, period, rx).await });
        }

        info!(addr = %self.local_addr()?, "pollchat-server ready");

        // One accept outstanding at a time; each session runs on its own task
        // so the next accept is not held up by earlier connections.
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            info!(peer = %peer, error = %e, "could not set TCP_NODELAY");
                        }
                        let session = Session::new(self.relay.clone(), peer);
                        info!(session_id = session.id(), peer = %peer, "accepted connection");
                        session.start(stream).await;
                    }
                    Err(e) => {
                        error!(error = %e, "TCP accept failed");
                    }
                },
                () = shutdown_requested(&mut shutdown_rx) => break,
            }
        }

        info!("stopping all sessions");
        let stopped = self.relay.registry.broadcast_stop().await;
        info!(sessions = stopped, "pollchat-server stopped");
        Ok(())
    }
}

impl ServerHandle {
    /// Ask the accept loop to finish and stop all sessions.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Append a line to the shared log, as if posted by a client.
    pub fn add_message(&self, text: impl Into<String>) -> usize {
        self.relay.log.append(text)
    }

    pub fn get_message(&self, index: usize) -> ChatResult<String> {
        self.relay.log.get(index)
    }

    pub fn messages_len(&self) -> usize {
        self.relay.log.size()
    }

    pub async fn session_count(&self) -> usize {
        self.relay.registry.len().await
    }

    pub async fn stats(&self) -> ServerStats {
        ServerStats::collect(&self.relay.registry).await
    }
}

/// Resolve once the shutdown flag is set.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
