//! pollchat-core: Shared protocol library for the pollchat relay.
//!
//! Provides the fixed 16-byte header wire format, the closed set of
//! request/reply message types, and the error type shared by server and client.

pub mod codec;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{read_message, write_message, Header, WireMessage, HEADER_LEN, MAX_BODY};
pub use error::{ChatError, ChatResult};
pub use messages::{MsgType, PROTOCOL_VERSION};
