//! Keepalive supervisor: stops sessions that go silent.

use super::{Session, StopReason};
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Check the session every `keepalive_interval`; stop it once it has been
/// idle for longer than `keepalive_timeout`. Returns as soon as the session
/// stops for any reason.
pub(super) async fn supervise(session: Arc<Session>) {
    let options = &session.relay().options;
    let period = options.keepalive_interval;
    let timeout = options.keepalive_timeout;

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = session.stopped() => return,
        }

        if !session.is_started() {
            return;
        }
        let idle = session.idle_for();
        if idle > timeout {
            session.stop(StopReason::KeepaliveExpired(idle)).await;
            return;
        }
    }
}
