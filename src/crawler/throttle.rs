//! Rolling-window request pacer.
//!
//! Caps dispatches to N per sliding 60-second window rather than a
//! fixed interval, so short bursts are allowed but the sustained rate
//! stays bounded.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub struct Throttle {
    per_window: u32,
    window: Duration,
    dispatches: Mutex<VecDeque<Instant>>,
}

impl Throttle {
    pub fn per_minute(per_minute: u32) -> Self {
        Self::with_window(per_minute, Duration::from_secs(60))
    }

    pub fn with_window(per_window: u32, window: Duration) -> Self {
        Self {
            per_window,
            window,
            dispatches: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a dispatch slot is free, then claim it.
    pub async fn acquire(&self) {
        if self.per_window == 0 {
            return;
        }
        loop {
            let wait_until = {
                let mut dispatches = self.dispatches.lock().await;
                let now = Instant::now();
                while let Some(front) = dispatches.front() {
                    if now.duration_since(*front) >= self.window {
                        dispatches.pop_front();
                    } else {
                        break;
                    }
                }
                if (dispatches.len() as u32) < self.per_window {
                    dispatches.push_back(now);
                    return;
                }
                match dispatches.front() {
                    Some(oldest) => *oldest + self.window,
                    None => now,
                }
            };
            debug!("Throttle saturated, waiting for a slot");
            tokio::time::sleep_until(wait_until).await;
        }
    }
}
