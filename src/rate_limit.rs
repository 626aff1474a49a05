use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key count past which each new attempt first sweeps out stale keys.
pub const SWEEP_THRESHOLD: usize = 1024;

/// In-memory rate limiter keyed by `bucket:hash`.
/// Each bucket ("login", "comment") is given its own limit by the caller.
#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt and return true while the key is under `max_attempts`
    /// within the trailing `window`.
    pub fn check_and_record(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        // Login keys come from client-chosen emails, so the map must not only grow
        if map.len() >= SWEEP_THRESHOLD {
            prune(&mut map, now, window);
        }

        let attempts = map.entry(key.to_string()).or_default();
        attempts.retain(|t| now.duration_since(*t) < window);

        if (attempts.len() as u64) < max_attempts {
            attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Forget a key, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drop attempts older than `max_age` and any key left with none.
fn prune(map: &mut HashMap<String, Vec<Instant>>, now: Instant, max_age: Duration) {
    let before = map.len();
    map.retain(|_, attempts| {
        attempts.retain(|t| now.duration_since(*t) < max_age);
        !attempts.is_empty()
    });
    log::debug!("Rate limiter swept {} stale key(s)", before - map.len());
}
