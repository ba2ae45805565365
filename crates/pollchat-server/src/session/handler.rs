//! Request handlers, keyed by message type.
//!
//! Each handler takes the session and the request body and produces exactly
//! one reply. Handlers never hold the session lock while touching the log.

use super::Session;
use pollchat_core::{ChatError, ChatResult, Header, MsgType, WireMessage};
use tracing::{debug, info, warn};

/// What the session should do after handling a request.
pub(super) struct Outcome {
    pub reply: WireMessage,
    /// Stop the session once the reply is written.
    pub then_stop: bool,
}

impl Outcome {
    fn reply(reply: WireMessage) -> Self {
        Self { reply, then_stop: false }
    }
}

pub(super) fn dispatch(session: &Session, header: &Header, body: &[u8]) -> ChatResult<Outcome> {
    let msg_type = header.msg_type().map_err(|e| {
        warn!(session_id = session.id(), msg_type = header.msg_type, "wrong command");
        e
    })?;

    match msg_type {
        MsgType::LoginRequest => Ok(on_login(session, body)),
        MsgType::SendRequest => Ok(on_send(session, body)),
        MsgType::FetchRequest => on_fetch(session, body),
        MsgType::LogoutRequest => Ok(on_logout(session)),
        other => {
            warn!(session_id = session.id(), msg_type = ?other, "reply type sent as request");
            Err(ChatError::Protocol(format!("{other:?} is not a request")))
        }
    }
}

fn on_login(session: &Session, body: &[u8]) -> Outcome {
    let username = first_line(body);
    session.set_username(username.clone());
    info!(session_id = session.id(), username = %username, "login");

    let relay = session.relay();
    if relay.options.presence_notices {
        relay.log.append(format!("Hello, {username}!"));
    }
    let size = relay.log.size();
    Outcome::reply(WireMessage::with_text(MsgType::LoginReply, &size.to_string()))
}

fn on_send(session: &Session, body: &[u8]) -> Outcome {
    let text = first_line(body);
    let username = session.username();
    session.relay().log.append(format!("{username}: {text}"));
    Outcome::reply(WireMessage::new(MsgType::SendReply))
}

fn on_fetch(session: &Session, body: &[u8]) -> ChatResult<Outcome> {
    let cursor = parse_cursor(body)?;
    let reply = match usize::try_from(cursor)
        .ok()
        .and_then(|index| session.relay().log.get_if_present(index))
    {
        Some(line) => WireMessage::with_text(MsgType::FetchReply, &line),
        None => WireMessage::new(MsgType::FetchReply),
    };
    Ok(Outcome::reply(reply))
}

fn on_logout(session: &Session) -> Outcome {
    debug!(session_id = session.id(), "logout requested");
    Outcome {
        reply: WireMessage::new(MsgType::LogoutReply),
        then_stop: true,
    }
}

/// First line of the body, without its line terminator.
fn first_line(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.lines().next().unwrap_or_default().to_string()
}

/// Leading whitespace-separated token of the body as an unsigned cursor.
fn parse_cursor(body: &[u8]) -> ChatResult<u64> {
    let text = String::from_utf8_lossy(body);
    let token = text.split_whitespace().next().unwrap_or_default();
    token
        .parse::<u64>()
        .map_err(|_| ChatError::Protocol(format!("fetch cursor {token:?} is not an unsigned integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_strips_terminators() {
        assert_eq!(first_line(b"alice"), "alice");
        assert_eq!(first_line(b"alice\nbob"), "alice");
        assert_eq!(first_line(b"alice\r\n"), "alice");
        assert_eq!(first_line(b""), "");
    }

    #[test]
    fn cursor_parsing() {
        assert_eq!(parse_cursor(b"0").unwrap(), 0);
        assert_eq!(parse_cursor(b"  17\n").unwrap(), 17);
        assert!(parse_cursor(b"").is_err());
        assert!(parse_cursor(b"-1").is_err());
        assert!(parse_cursor(b"x1").is_err());
    }
}
