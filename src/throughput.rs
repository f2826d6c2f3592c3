//! Process-wide governor on outbound backend calls per second.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed one-second window shared by every caller, regardless of source
/// identity or tier.
#[derive(Debug)]
pub struct ThroughputLimiter {
    per_second: u32,
    window: Mutex<Window>,
}

impl ThroughputLimiter {
    /// `per_second` is clamped to at least 1.
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second: per_second.max(1),
            window: Mutex::new(Window {
                started_at: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Wait until one more backend call fits into the current window, then
    /// claim it.
    ///
    /// The lock is held while sleeping, so waiters are released one window
    /// at a time in arrival order.
    pub async fn await_slot(&self) {
        let mut window = self.window.lock().await;

        let now = Instant::now();
        if now.duration_since(window.started_at) >= WINDOW {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.per_second {
            let next_window = window.started_at + WINDOW;
            debug!(
                "Throughput ceiling of {}/s reached, waiting {:?}",
                self.per_second,
                next_window.saturating_duration_since(now)
            );
            sleep_until(next_window).await;
            window.started_at = Instant::now();
            window.count = 0;
        }

        window.count += 1;
    }
}
