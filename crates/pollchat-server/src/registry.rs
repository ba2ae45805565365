//! Registry of live sessions.
//!
//! A session is present from the moment it starts until its first stop.
//! The server uses the registry for stats and to stop everyone at shutdown.

use crate::session::{Session, StopReason};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Set of live sessions, ordered by session ID (i.e. registration order).
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<BTreeMap<u64, Arc<Session>>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<Session>) {
        let id = session.id();
        self.sessions.write().await.insert(id, session);
        debug!(session_id = id, "session registered");
    }

    /// Remove a session. Returns `false` if it was already gone.
    pub async fn unregister(&self, session_id: u64) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            debug!(session_id, "session unregistered");
        }
        removed
    }

    /// Point-in-time copy of the live sessions, safe to iterate unlocked.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Stop every live session. Used at server shutdown.
    ///
    /// Each stop unregisters its session, so the lock must not be held here.
    pub async fn broadcast_stop(&self) -> usize {
        let sessions = self.snapshot().await;
        let mut stopped = 0;
        for session in &sessions {
            if session.stop(StopReason::Shutdown).await {
                stopped += 1;
            }
        }
        debug!(count = stopped, "broadcast stop complete");
        stopped
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
