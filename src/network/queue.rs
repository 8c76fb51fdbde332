//! Verification queue
//!
//! Admitted connections wait here until the scheduling tick releases them.
//! Each address holds at most one entry. Arrival order lives in a separate
//! deque of `(address, sequence)` slots; removing an entry leaves its slot
//! behind, and `poll` discards slots whose sequence no longer matches. Once
//! stale slots outnumber live entries, `remove` compacts the deque.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

/// Slots tolerated on top of twice the live entries before compacting.
const STALE_SLACK: usize = 64;

/// Deferred start of a verification. Runs once on the worker pool.
pub type StartAction = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full ({0} entries)")]
    Full(usize),

    #[error("{0} is already queued")]
    AlreadyQueued(IpAddr),
}

struct QueueEntry {
    seq: u64,
    action: Mutex<StartAction>,
}

pub struct VerificationQueue {
    entries: DashMap<IpAddr, QueueEntry>,
    order: Mutex<VecDeque<(IpAddr, u64)>>,
    next_seq: AtomicU64,
    capacity: usize,
}

impl VerificationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Inserts `action` for `ip`. A second entry for the same address is
    /// refused and the first one is kept.
    pub fn enqueue(&self, ip: IpAddr, action: StartAction) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full(self.capacity));
        }
        match self.entries.entry(ip) {
            Entry::Occupied(_) => Err(QueueError::AlreadyQueued(ip)),
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert(QueueEntry {
                    seq,
                    action: Mutex::new(action),
                });
                self.order.lock().push_back((ip, seq));
                Ok(())
            }
        }
    }

    /// Removes up to `max` entries in arrival order and hands back their
    /// start actions. Stale slots do not count against `max`.
    pub fn poll(&self, max: usize) -> Vec<StartAction> {
        let mut actions = Vec::with_capacity(max.min(self.entries.len()));
        let mut order = self.order.lock();
        while actions.len() < max {
            let Some((ip, seq)) = order.pop_front() else {
                break;
            };
            if let Some((_, entry)) = self.entries.remove_if(&ip, |_, entry| entry.seq == seq) {
                actions.push(entry.action.into_inner());
            }
        }
        actions
    }

    pub fn remove(&self, ip: IpAddr) -> bool {
        if self.entries.remove(&ip).is_none() {
            return false;
        }
        let mut order = self.order.lock();
        if order.len() > self.entries.len() * 2 + STALE_SLACK {
            order.retain(|(ip, seq)| self.entries.get(ip).is_some_and(|entry| entry.seq == *seq));
        }
        true
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.entries.contains_key(&ip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.order.lock().clear();
    }
}
