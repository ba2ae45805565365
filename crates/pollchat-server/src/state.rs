//! State shared by the acceptor and every session.

use crate::log::MessageLog;
use crate::registry::ConnectionRegistry;
use crate::session::SessionOptions;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide relay state, built once at startup and handed out as `Arc`.
#[derive(Debug)]
pub struct RelayState {
    pub log: MessageLog,
    pub registry: ConnectionRegistry,
    pub options: SessionOptions,
    next_session_id: AtomicU64,
}

impl RelayState {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            log: MessageLog::new(),
            registry: ConnectionRegistry::new(),
            options,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Allocate a session ID. IDs increase in accept order.
    pub(crate) fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }
}
