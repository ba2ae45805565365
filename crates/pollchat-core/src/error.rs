use thiserror::Error;

/// Errors produced by the pollchat protocol layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("framing error: body length {0} exceeds maximum")]
    Framing(u32),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("index {index} out of range (size {size})")]
    OutOfRange { index: usize, size: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
