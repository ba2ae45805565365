//! pollchat-client: Rust client library for the pollchat relay.
//!
//! The relay never pushes. A client logs in, gets the current log size as
//! its cursor, and then polls: each non-empty fetch reply is the next unseen
//! line and moves the cursor forward by one.
//!
//! # Quick Start
//!
//! ```no_run
//! use pollchat_client::ChatClient;
//!
//! # async fn example() -> pollchat_client::ChatResult<()> {
//! let mut client = ChatClient::connect("127.0.0.1:33333").await?;
//! client.login("alice").await?;
//! client.send("hello everyone").await?;
//!
//! for line in client.drain().await? {
//!     println!("{line}");
//! }
//!
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{ChatClient, DEFAULT_TIMEOUT};

// Re-export pollchat-core error types for convenience.
pub use pollchat_core::{ChatError, ChatResult};
