//! Admission-side shared state
//!
//! Everything here is keyed by source address and shared between connection
//! tasks: the verification queue, the reconnect rate limiter, the failure
//! blacklist and the attack tracker that samples them.

pub mod attack;
pub mod blacklist;
pub mod queue;
pub mod ratelimit;

pub use attack::{AttackEvent, AttackMetrics, AttackStatistics, AttackThresholds, AttackTracker};
pub use blacklist::Blacklist;
pub use queue::{QueueError, StartAction, VerificationQueue};
pub use ratelimit::RateLimiter;
