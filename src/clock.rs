//! Wall-clock source used for redo cooldown decisions.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time in unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_unix_ms(&self) -> i64;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis() as i64)
            .unwrap_or(0)
    }
}
