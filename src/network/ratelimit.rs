//! Reconnect rate limiter
//!
//! Remembers when an address last attempted a verified login. Another attempt
//! inside the window is refused; records older than the window are pruned by
//! the maintenance tick.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

pub struct RateLimiter {
    attempts: DashMap<IpAddr, Instant>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            window,
        }
    }

    /// Records an attempt from `ip`. Returns false when the previous attempt
    /// is still inside the window; a refused attempt does not extend it.
    pub fn attempt(&self, ip: IpAddr, now: Instant) -> bool {
        match self.attempts.entry(ip) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.window {
                    tracing::debug!("[ratelimit] refused ip={}", ip);
                    return false;
                }
                entry.insert(now);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Prune expired records. Returns the number of remaining entries.
    pub fn cleanup(&self, now: Instant) -> usize {
        let window = self.window;
        self.attempts
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        self.attempts.len()
    }

    pub fn clear(&self) {
        self.attempts.clear();
        tracing::debug!("[ratelimit] cleared all entries");
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
