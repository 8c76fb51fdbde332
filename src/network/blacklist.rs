//! Failure tracker and blacklist
//!
//! Every failed verification adds a strike to the source address. Once the
//! strike count reaches the threshold the address is refused at admission
//! until the record expires. Records expire `ttl` after their last strike.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct StrikeRecord {
    strikes: u32,
    expires: Instant,
}

pub struct Blacklist {
    records: DashMap<IpAddr, StrikeRecord>,
    ttl: Duration,
    /// Strike count at which an address is refused. Zero disables the list.
    threshold: u32,
}

impl Blacklist {
    pub fn new(ttl: Duration, threshold: u32) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
            threshold,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Adds a strike and returns the new count.
    pub fn strike(&self, ip: IpAddr, now: Instant) -> u32 {
        let mut record = self.records.entry(ip).or_insert(StrikeRecord {
            strikes: 0,
            expires: now,
        });
        if record.expires <= now {
            record.strikes = 0;
        }
        record.strikes = record.strikes.saturating_add(1);
        record.expires = now + self.ttl;
        let strikes = record.strikes;
        drop(record);

        if self.threshold > 0 && strikes == self.threshold {
            tracing::info!("[blacklist] lockout ip={} strikes={}", ip, strikes);
        }
        strikes
    }

    pub fn strikes(&self, ip: IpAddr, now: Instant) -> u32 {
        self.records
            .get(&ip)
            .filter(|r| r.expires > now)
            .map(|r| r.strikes)
            .unwrap_or(0)
    }

    pub fn is_blacklisted(&self, ip: IpAddr, now: Instant) -> bool {
        self.threshold > 0 && self.strikes(ip, now) >= self.threshold
    }

    /// Number of addresses currently at or over the threshold.
    pub fn blacklisted_count(&self, now: Instant) -> usize {
        if self.threshold == 0 {
            return 0;
        }
        self.records
            .iter()
            .filter(|r| r.expires > now && r.strikes >= self.threshold)
            .count()
    }

    /// Prune expired records. Returns the number of remaining entries.
    pub fn cleanup(&self, now: Instant) -> usize {
        self.records.retain(|_, record| record.expires > now);
        self.records.len()
    }

    pub fn remove(&self, ip: IpAddr) -> bool {
        self.records.remove(&ip).is_some()
    }

    pub fn clear(&self) {
        self.records.clear();
        tracing::info!("[blacklist] cleared all entries");
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
