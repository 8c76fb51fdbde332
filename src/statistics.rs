//! Process-wide counters
//!
//! Totals are plain atomics. The per-second rates keep the instants of the
//! last second's events and are pruned by the maintenance tick.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(1);

/// Sliding one-second event counter.
#[derive(Default)]
pub struct RateWindow {
    events: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    pub fn record(&self, now: Instant) {
        let mut events = self.events.lock();
        Self::prune_locked(&mut events, now);
        events.push_back(now);
    }

    /// Events in the second before `now`.
    pub fn count(&self, now: Instant) -> u64 {
        let mut events = self.events.lock();
        Self::prune_locked(&mut events, now);
        events.len() as u64
    }

    pub fn prune(&self, now: Instant) {
        Self::prune_locked(&mut self.events.lock(), now);
    }

    fn prune_locked(events: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = events.front() {
            if now.saturating_duration_since(*front) < WINDOW {
                break;
            }
            events.pop_front();
        }
    }
}

#[derive(Default)]
pub struct Statistics {
    total_connections: AtomicU64,
    total_attempted: AtomicU64,
    total_successful: AtomicU64,
    total_failed: AtomicU64,
    total_blacklisted: AtomicU64,
    incoming_bytes: AtomicU64,
    outgoing_bytes: AtomicU64,
    logins: RateWindow,
    connections: RateWindow,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub total_connections: u64,
    pub total_attempted: u64,
    pub total_successful: u64,
    pub total_failed: u64,
    pub total_blacklisted: u64,
    pub incoming_bytes: u64,
    pub outgoing_bytes: u64,
    pub logins_per_second: u64,
    pub connections_per_second: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_connection(&self, now: Instant) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.connections.record(now);
    }

    pub fn count_login(&self, now: Instant) {
        self.logins.record(now);
    }

    pub fn count_attempt(&self) {
        self.total_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_success(&self) {
        self.total_successful.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_failure(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_blacklisted(&self) {
        self.total_blacklisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_incoming(&self, bytes: usize) {
        self.incoming_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn add_outgoing(&self, bytes: usize) {
        self.outgoing_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn total_successful(&self) -> u64 {
        self.total_successful.load(Ordering::Relaxed)
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    pub fn logins_per_second(&self, now: Instant) -> u64 {
        self.logins.count(now)
    }

    pub fn connections_per_second(&self, now: Instant) -> u64 {
        self.connections.count(now)
    }

    pub fn prune(&self, now: Instant) {
        self.logins.prune(now);
        self.connections.prune(now);
    }

    pub fn snapshot(&self, now: Instant) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_attempted: self.total_attempted.load(Ordering::Relaxed),
            total_successful: self.total_successful(),
            total_failed: self.total_failed(),
            total_blacklisted: self.total_blacklisted.load(Ordering::Relaxed),
            incoming_bytes: self.incoming_bytes.load(Ordering::Relaxed),
            outgoing_bytes: self.outgoing_bytes.load(Ordering::Relaxed),
            logins_per_second: self.logins_per_second(now),
            connections_per_second: self.connections_per_second(now),
        }
    }
}
