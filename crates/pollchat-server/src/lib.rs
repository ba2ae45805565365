//! pollchat-server: a text-chat relay.
//!
//! Clients log in with a bare username, post lines, and catch up on lines
//! they have not seen by polling a cursor into one shared, append-only log.

pub mod config;
pub mod log;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
pub mod stats;

pub use config::ServerConfig;
pub use log::MessageLog;
pub use registry::ConnectionRegistry;
pub use server::{ChatServer, ServerHandle};
pub use session::{Session, SessionOptions, SessionPhase, StopReason};
pub use state::RelayState;
pub use stats::ServerStats;
