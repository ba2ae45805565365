//! Per-connection protocol sessions.
//!
//! A session owns one socket and runs one task that loops
//! read header → read body → dispatch → write reply. A keepalive task runs
//! beside it. The session is shared (`Arc`) between its I/O task, its
//! keepalive task and the connection registry; any of them may stop it, and
//! only the first stop has an effect.

mod handler;
mod keepalive;

use crate::state::RelayState;
use pollchat_core::codec::{read_body, read_header, write_message};
use pollchat_core::{ChatError, ChatResult};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Settings every session is created with.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How often the keepalive supervisor checks for silence.
    pub keepalive_interval: Duration,
    /// Silence longer than this stops the session.
    pub keepalive_timeout: Duration,
    /// Append "Hello"/"Bye" lines to the log on login and stop.
    pub presence_notices: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(6),
            keepalive_timeout: Duration::from_secs(5),
            presence_notices: true,
        }
    }
}

/// Where the session's I/O task currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    ReadingHeader,
    ReadingBody,
    Dispatching,
    Writing,
    Stopped,
}

/// Why a session stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The client sent a logout request.
    Logout,
    /// No request arrived within the keepalive timeout.
    KeepaliveExpired(Duration),
    /// The server is shutting down.
    Shutdown,
    /// Transport, framing or protocol failure.
    Failed(ChatError),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logout => write!(f, "logout"),
            Self::KeepaliveExpired(idle) => write!(f, "no activity for {} ms", idle.as_millis()),
            Self::Shutdown => write!(f, "server shutdown"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Mutable per-session fields, guarded by the session lock.
#[derive(Debug)]
struct SessionState {
    username: String,
    started: bool,
    phase: SessionPhase,
    last_activity: Instant,
    request_started: Option<Instant>,
    total_time: Duration,
    request_count: u64,
}

/// One client connection.
pub struct Session {
    id: u64,
    peer: SocketAddr,
    relay: Arc<RelayState>,
    state: Mutex<SessionState>,
    closed_tx: watch::Sender<bool>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an idle session bound to the shared relay state.
    pub fn new(relay: Arc<RelayState>, peer: SocketAddr) -> Arc<Self> {
        let id = relay.next_session_id();
        Arc::new(Self {
            id,
            peer,
            relay,
            state: Mutex::new(SessionState {
                username: String::new(),
                started: false,
                phase: SessionPhase::Idle,
                last_activity: Instant::now(),
                request_started: None,
                total_time: Duration::ZERO,
                request_count: 0,
            }),
            closed_tx: watch::channel(false).0,
        })
    }

    /// Register the session and spawn its I/O and keepalive tasks.
    ///
    /// Starting a session twice, or after it stopped, does nothing.
    pub async fn start<S>(self: &Arc<Self>, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        {
            let mut state = self.lock();
            if state.started || state.phase == SessionPhase::Stopped {
                return;
            }
            state.started = true;
            state.last_activity = Instant::now();
        }
        self.relay.registry.register(self.clone()).await;
        debug!(session_id = self.id, peer = %self.peer, "session started");

        tokio::spawn(keepalive::supervise(self.clone()));
        tokio::spawn(self.clone().run(stream));
    }

    /// Stop the session: unregister it, close its socket, log why.
    ///
    /// Returns `true` for the call that actually stopped it; later calls are
    /// no-ops and return `false`.
    pub async fn stop(&self, reason: StopReason) -> bool {
        let username = {
            let mut state = self.lock();
            if !state.started {
                return false;
            }
            state.started = false;
            state.phase = SessionPhase::Stopped;
            state.username.clone()
        };

        match &reason {
            StopReason::Failed(ChatError::Transport(e)) => {
                debug!(session_id = self.id, username = %username, error = %e, "connection dropped")
            }
            StopReason::Failed(e) => {
                warn!(session_id = self.id, username = %username, error = %e, "stopping session")
            }
            StopReason::KeepaliveExpired(_) => {
                warn!(session_id = self.id, username = %username, reason = %reason, "stopping session")
            }
            _ => info!(session_id = self.id, username = %username, reason = %reason, "session stopped"),
        }

        if self.relay.options.presence_notices && !username.is_empty() {
            self.relay.log.append(format!("Bye, {username}!"));
        }
        self.relay.registry.unregister(self.id).await;

        // Wakes the I/O task (which drops the socket) and the keepalive task.
        self.closed_tx.send_replace(true);
        true
    }

    /// Resolve once the session has stopped.
    pub async fn stopped(&self) {
        let mut closed = self.closed_tx.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    /// Username claimed at login (empty before login).
    pub fn username(&self) -> String {
        self.lock().username.clone()
    }

    /// Cumulative request latency.
    pub fn total_time(&self) -> Duration {
        self.lock().total_time
    }

    pub fn request_count(&self) -> u64 {
        self.lock().request_count
    }

    /// Time since the last request arrived.
    pub fn idle_for(&self) -> Duration {
        self.lock().last_activity.elapsed()
    }

    pub(crate) fn relay(&self) -> &RelayState {
        &self.relay
    }

    pub(crate) fn set_username(&self, username: String) {
        self.lock().username = username;
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.lock();
        if state.started {
            state.phase = phase;
        }
    }

    /// A request body has fully arrived.
    fn begin_request(&self) {
        let now = Instant::now();
        let mut state = self.lock();
        state.last_activity = now;
        state.request_started = Some(now);
    }

    /// The reply to the current request has been written.
    fn complete_request(&self) {
        let mut state = self.lock();
        if let Some(started) = state.request_started.take() {
            state.total_time += started.elapsed();
            state.request_count += 1;
        }
    }

    /// I/O task body. Ends when the session stops, by its own doing or not.
    async fn run<S>(self: Arc<Self>, stream: S)
    where
        S: AsyncRead + AsyncWrite,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        let outcome = tokio::select! {
            result = self.serve(&mut reader, &mut writer) => Some(result),
            () = self.stopped() => None,
        };

        if let Some(result) = outcome {
            let reason = match result {
                Ok(()) => StopReason::Logout,
                Err(e) => StopReason::Failed(e),
            };
            self.stop(reason).await;
        }
        // Dropping both halves closes the socket.
    }

    /// Request/reply loop. Returns `Ok` after a logout reply has been sent.
    async fn serve<R, W>(&self, reader: &mut R, writer: &mut W) -> ChatResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            self.set_phase(SessionPhase::ReadingHeader);
            let header = read_header(reader).await?;

            self.set_phase(SessionPhase::ReadingBody);
            let body = read_body(reader, &header).await?;
            self.begin_request();

            self.set_phase(SessionPhase::Dispatching);
            let outcome = handler::dispatch(self, &header, &body)?;

            self.set_phase(SessionPhase::Writing);
            write_message(writer, &outcome.reply).await?;
            self.complete_request();

            if outcome.then_stop {
                return Ok(());
            }
        }
    }
}
