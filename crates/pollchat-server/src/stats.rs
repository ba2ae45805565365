//! Aggregate request timing across live sessions.

use crate::registry::ConnectionRegistry;
use crate::server::shutdown_requested;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Point-in-time totals over the sessions currently registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Sum of per-request latency.
    pub total_time: Duration,
    pub request_count: u64,
    pub sessions: usize,
}

impl ServerStats {
    pub async fn collect(registry: &ConnectionRegistry) -> Self {
        let sessions = registry.snapshot().await;
        let mut stats = Self {
            sessions: sessions.len(),
            ..Self::default()
        };
        for session in &sessions {
            stats.total_time += session.total_time();
            stats.request_count += session.request_count();
        }
        stats
    }

    /// Mean latency per request, `None` before the first request.
    pub fn average(&self) -> Option<Duration> {
        if self.request_count == 0 {
            return None;
        }
        let nanos = self.total_time.as_nanos() / u128::from(self.request_count);
        Some(Duration::from_nanos(nanos as u64))
    }
}

/// Log a stats line every `period` until `shutdown` flips to `true`.
pub(crate) async fn report(
    registry: &ConnectionRegistry,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown_requested(&mut shutdown) => return,
        }
        let stats = ServerStats::collect(registry).await;
        info!(
            target: "pollchat::stats",
            total_ms = stats.total_time.as_millis() as u64,
            requests = stats.request_count,
            avg_us = stats.average().map(|d| d.as_micros() as u64).unwrap_or(0),
            sessions = stats.sessions,
            "stats"
        );
    }
}
