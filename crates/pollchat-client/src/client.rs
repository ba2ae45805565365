//! The pollchat client.
//!
//! One request is in flight at a time: every method writes a request and
//! waits for its paired reply before returning.

use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time;
use tracing::debug;

use pollchat_core::codec::{read_message, write_message};
use pollchat_core::{ChatError, ChatResult, MsgType, WireMessage};

/// Connect and per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A connection to a pollchat server.
pub struct ChatClient {
    stream: TcpStream,
    /// Index of the next unseen log line; `None` until login.
    cursor: Option<u64>,
    timeout: Duration,
}

impl ChatClient {
    /// Open a TCP connection to the server.
    pub async fn connect(addr: impl ToSocketAddrs) -> ChatResult<Self> {
        Self::connect_with_timeout(addr, DEFAULT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(addr: impl ToSocketAddrs, timeout: Duration) -> ChatResult<Self> {
        let stream = time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ChatError::Transport("connect timed out".into()))?
            .map_err(|e| ChatError::Transport(format!("connect failed: {e}")))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            cursor: None,
            timeout,
        })
    }

    /// Log in and position the cursor at the end of the log.
    ///
    /// Returns the log size reported by the server.
    pub async fn login(&mut self, username: &str) -> ChatResult<u64> {
        let reply = self
            .request(WireMessage::with_text(MsgType::LoginRequest, username))
            .await?;
        let text = reply.text();
        let size = text
            .trim()
            .parse::<u64>()
            .map_err(|_| ChatError::Protocol(format!("login reply {text:?} is not a log size")))?;
        self.cursor = Some(size);
        debug!(username, cursor = size, "logged in");
        Ok(size)
    }

    /// Post a line. Only the first line of `text` is kept by the server.
    pub async fn send(&mut self, text: &str) -> ChatResult<()> {
        let msg = WireMessage::with_body(MsgType::SendRequest, text.as_bytes())?;
        self.request(msg).await?;
        Ok(())
    }

    /// Fetch the log line at `index`; `None` if the log is not that long yet.
    pub async fn fetch(&mut self, index: u64) -> ChatResult<Option<String>> {
        let reply = self
            .request(WireMessage::with_text(MsgType::FetchRequest, &index.to_string()))
            .await?;
        if reply.body().is_empty() {
            Ok(None)
        } else {
            Ok(Some(reply.text()))
        }
    }

    /// Fetch the line at the cursor and advance past it if there was one.
    pub async fn poll(&mut self) -> ChatResult<Option<String>> {
        let cursor = self
            .cursor
            .ok_or_else(|| ChatError::Protocol("poll before login".into()))?;
        let line = self.fetch(cursor).await?;
        if line.is_some() {
            self.cursor = Some(cursor + 1);
        }
        Ok(line)
    }

    /// Poll until the server has nothing new.
    pub async fn drain(&mut self) -> ChatResult<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.poll().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Log out. The server closes the connection after replying.
    pub async fn logout(mut self) -> ChatResult<()> {
        self.request(WireMessage::new(MsgType::LogoutRequest)).await?;
        Ok(())
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Write one request and read its reply, checking the reply type.
    async fn request(&mut self, msg: WireMessage) -> ChatResult<WireMessage> {
        let request_type = msg.msg_type()?;
        let expected = request_type
            .reply()
            .ok_or_else(|| ChatError::Protocol(format!("{request_type:?} is not a request")))?;

        let exchange = async {
            write_message(&mut self.stream, &msg).await?;
            read_message(&mut self.stream).await
        };
        let reply = time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ChatError::Transport(format!("{request_type:?} timed out")))??;

        let got = reply.msg_type()?;
        if got != expected {
            return Err(ChatError::Protocol(format!(
                "expected {expected:?}, got {got:?}"
            )));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A one-connection fake server that answers each request with
    /// whatever `reply` returns.
    async fn fake_server<F>(reply: F) -> std::net::SocketAddr
    where
        F: Fn(&WireMessage) -> WireMessage + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(request) = read_message(&mut stream).await {
                let response = reply(&request);
                if write_message(&mut stream, &response).await.is_err() {
                    break;
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn poll_advances_only_on_content() {
        let addr = fake_server(|req| match req.msg_type().unwrap() {
            MsgType::LoginRequest => WireMessage::with_text(MsgType::LoginReply, "2"),
            MsgType::FetchRequest => match req.text().as_str() {
                "2" => WireMessage::with_text(MsgType::FetchReply, "line two"),
                _ => WireMessage::new(MsgType::FetchReply),
            },
            _ => WireMessage::new(MsgType::SendReply),
        })
        .await;

        let mut client = ChatClient::connect(addr).await.unwrap();
        assert_eq!(client.cursor(), None);
        assert!(client.poll().await.is_err());

        assert_eq!(client.login("zoe").await.unwrap(), 2);
        assert_eq!(client.poll().await.unwrap().as_deref(), Some("line two"));
        assert_eq!(client.cursor(), Some(3));
        assert_eq!(client.poll().await.unwrap(), None);
        assert_eq!(client.cursor(), Some(3));
    }

    #[tokio::test]
    async fn mismatched_reply_type_is_protocol_error() {
        let addr = fake_server(|_| WireMessage::new(MsgType::SendReply)).await;
        let mut client = ChatClient::connect(addr).await.unwrap();
        assert!(matches!(
            client.fetch(0).await,
            Err(ChatError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn non_numeric_login_reply_rejected() {
        let addr = fake_server(|_| WireMessage::with_text(MsgType::LoginReply, "lots")).await;
        let mut client = ChatClient::connect(addr).await.unwrap();
        assert!(client.login("x").await.is_err());
        assert_eq!(client.cursor(), None);
    }

    #[tokio::test]
    async fn oversized_send_rejected_locally() {
        let addr = fake_server(|_| WireMessage::new(MsgType::SendReply)).await;
        let mut client = ChatClient::connect(addr).await.unwrap();
        let long = "x".repeat(pollchat_core::MAX_BODY + 1);
        assert!(matches!(client.send(&long).await, Err(ChatError::Framing(_))));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut client = ChatClient::connect_with_timeout(addr, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(matches!(client.fetch(0).await, Err(ChatError::Transport(_))));
    }
}
