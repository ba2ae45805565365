//! Fixed-header framing for pollchat messages.
//!
//! Wire format (all integers big-endian u32):
//! `[version][type][flags][body length][body ...]`
//!
//! The header is always read in full before any body byte is consumed.

use crate::error::{ChatError, ChatResult};
use crate::messages::{MsgType, PROTOCOL_VERSION};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the encoded header in bytes.
pub const HEADER_LEN: usize = 16;

/// Largest body a header may announce.
pub const MAX_BODY: usize = 4096;

/// Decoded message header.
///
/// `msg_type` is kept raw so that unknown codes survive decoding and can be
/// rejected (and logged) by whoever dispatches on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub msg_type: u32,
    pub flags: u32,
    pub body_len: u32,
}

impl Header {
    /// Build a header for the current protocol version.
    pub fn new(msg_type: MsgType, body_len: u32, flags: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type: msg_type.into(),
            flags,
            body_len,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.version.to_be_bytes());
        out[4..8].copy_from_slice(&self.msg_type.to_be_bytes());
        out[8..12].copy_from_slice(&self.flags.to_be_bytes());
        out[12..16].copy_from_slice(&self.body_len.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        let word = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Self {
            version: word(0),
            msg_type: word(4),
            flags: word(8),
            body_len: word(12),
        }
    }

    /// Check the announced body length against [`MAX_BODY`].
    ///
    /// On failure the stored length is reset to 0. The connection that
    /// produced this header must be dropped; the reset length is not a
    /// recovery path.
    pub fn verify(&mut self) -> ChatResult<()> {
        if self.body_len as usize > MAX_BODY {
            let claimed = self.body_len;
            self.body_len = 0;
            return Err(ChatError::Framing(claimed));
        }
        Ok(())
    }

    /// Resolve the raw type code.
    pub fn msg_type(&self) -> ChatResult<MsgType> {
        MsgType::try_from(self.msg_type)
    }
}

/// A complete message: header plus exclusively owned body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    header: Header,
    body: Vec<u8>,
}

impl WireMessage {
    /// A message with an empty body.
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            header: Header::new(msg_type, 0, 0),
            body: Vec::new(),
        }
    }

    /// A message carrying `body`, rejected if it exceeds [`MAX_BODY`].
    pub fn with_body(msg_type: MsgType, body: &[u8]) -> ChatResult<Self> {
        if body.len() > MAX_BODY {
            return Err(ChatError::Framing(body.len() as u32));
        }
        Ok(Self {
            header: Header::new(msg_type, body.len() as u32, 0),
            body: body.to_vec(),
        })
    }

    /// A message carrying `text`, truncated to [`MAX_BODY`] bytes on a
    /// character boundary.
    pub fn with_text(msg_type: MsgType, text: &str) -> Self {
        let mut end = text.len().min(MAX_BODY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let body = text.as_bytes()[..end].to_vec();
        Self {
            header: Header::new(msg_type, body.len() as u32, 0),
            body,
        }
    }

    /// Reassemble a message from an already verified header and its body.
    pub fn from_parts(header: Header, body: Vec<u8>) -> ChatResult<Self> {
        if body.len() != header.body_len as usize {
            return Err(ChatError::Protocol(format!(
                "body is {} bytes, header announces {}",
                body.len(),
                header.body_len
            )));
        }
        Ok(Self { header, body })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn msg_type(&self) -> ChatResult<MsgType> {
        self.header.msg_type()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text (invalid UTF-8 replaced).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Header followed by body, ready to write.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_LEN + self.body.len());
        frame.extend_from_slice(&self.header.encode());
        frame.extend_from_slice(&self.body);
        frame
    }
}

/// Read exactly one header and verify it.
pub async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> ChatResult<Header> {
    let mut buf = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| ChatError::Transport(format!("header read failed: {e}")))?;
    let mut header = Header::decode(&buf);
    header.verify()?;
    Ok(header)
}

/// Read exactly the body announced by a verified header.
pub async fn read_body<R: AsyncRead + Unpin>(reader: &mut R, header: &Header) -> ChatResult<Vec<u8>> {
    let mut body = vec![0u8; header.body_len as usize];
    if !body.is_empty() {
        reader
            .read_exact(&mut body)
            .await
            .map_err(|e| ChatError::Transport(format!("body read failed: {e}")))?;
    }
    Ok(body)
}

/// Read one complete message.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> ChatResult<WireMessage> {
    let header = read_header(reader).await?;
    let body = read_body(reader, &header).await?;
    WireMessage::from_parts(header, body)
}

/// Write one complete message and flush it.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &WireMessage) -> ChatResult<()> {
    writer
        .write_all(&msg.to_bytes())
        .await
        .map_err(|e| ChatError::Transport(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ChatError::Transport(format!("flush failed: {e}")))?;
    Ok(())
}
