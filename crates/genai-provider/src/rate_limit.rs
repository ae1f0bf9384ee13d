//! Sliding one-minute request window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

/// Limits calls to `max_calls_per_minute` over any sliding 60s window.
///
/// `acquire` waits instead of failing. A limit of 0 disables limiting.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls_per_minute: usize,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls_per_minute: usize) -> Self {
        Self {
            max_calls_per_minute,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Conservative per-minute budget for a model name, kept a little under
    /// the published free-tier limits.
    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        let limit = if model.contains("1.5-flash") {
            12
        } else if model.contains("1.5-pro") {
            1
        } else {
            4
        };
        Self::new(limit)
    }

    pub fn max_calls_per_minute(&self) -> usize {
        self.max_calls_per_minute
    }

    /// Wait until a call slot is free, then record the call.
    pub async fn acquire(&self) {
        if self.max_calls_per_minute == 0 {
            return;
        }
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= WINDOW)
                {
                    calls.pop_front();
                }
                if calls.len() < self.max_calls_per_minute {
                    calls.push_back(now);
                    return;
                }
                match calls.front() {
                    Some(oldest) => WINDOW.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls recorded in the current window.
    pub async fn in_window(&self) -> usize {
        let calls = self.calls.lock().await;
        let now = Instant::now();
        calls
            .iter()
            .filter(|t| now.duration_since(**t) < WINDOW)
            .count()
    }
}
