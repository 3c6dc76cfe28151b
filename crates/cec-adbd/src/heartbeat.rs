//! Liveness heartbeat.
//!
//! Logs the monitor's uptime at debug level every few seconds. It shares no
//! state with the listener and has no effect on control flow.

use std::time::Duration;

use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Interval between heartbeat lines.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Uptime counter advanced once per tick.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    beats: u64,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self { interval, beats: 0 }
    }

    /// Records one tick and returns the cumulative uptime.
    pub fn beat(&mut self) -> Duration {
        self.beats += 1;
        self.uptime()
    }

    pub fn uptime(&self) -> Duration {
        self.interval
            .saturating_mul(u32::try_from(self.beats).unwrap_or(u32::MAX))
    }

    pub fn beats(&self) -> u64 {
        self.beats
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(HEARTBEAT_INTERVAL)
    }
}

/// Spawns the heartbeat task. It stops when `cancel_token` fires.
pub fn spawn_heartbeat_task(
    period: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<u64> {
    tokio::spawn(async move {
        let mut heartbeat = Heartbeat::new(period);
        // First line after one full period, not at startup
        let mut tick = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => break,

                _ = tick.tick() => {
                    let uptime = heartbeat.beat();
                    debug!(uptime_secs = uptime.as_secs(), "Current uptime");
                }
            }
        }

        debug!(beats = heartbeat.beats(), "Heartbeat stopped");
        heartbeat.beats()
    })
}
