//! Attack detection
//!
//! Sampled once per maintenance tick. The process is under attack while any
//! metric is above its threshold; the attack ends once it has lasted long
//! enough and the metrics have stayed quiet for the cooldown.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// One sample of the load the verifier is under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttackMetrics {
    pub joins_per_second: u64,
    pub connections_per_second: u64,
    pub verifying: usize,
    pub queued: usize,
    pub total_successful: u64,
    pub total_failed: u64,
    pub blacklisted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackThresholds {
    pub joins_per_second: u64,
    pub verifying: usize,
    pub queued: usize,
    pub min_attack_duration: Duration,
    pub cooldown: Duration,
}

impl AttackThresholds {
    fn exceeded_by(&self, metrics: &AttackMetrics) -> bool {
        metrics.joins_per_second > self.joins_per_second
            || metrics.verifying > self.verifying
            || metrics.queued > self.queued
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackStatistics {
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    pub peak_joins_per_second: u64,
    pub peak_connections_per_second: u64,
    pub peak_verifying: usize,
    pub peak_queued: usize,
    /// Totals at detection time; the mitigation report carries the deltas.
    pub successful_before: u64,
    pub failed_before: u64,
}

impl AttackStatistics {
    fn new(metrics: &AttackMetrics, now: Instant) -> Self {
        Self {
            started: now,
            started_at: Utc::now(),
            peak_joins_per_second: 0,
            peak_connections_per_second: 0,
            peak_verifying: 0,
            peak_queued: 0,
            successful_before: metrics.total_successful,
            failed_before: metrics.total_failed,
        }
    }

    fn update_peaks(&mut self, metrics: &AttackMetrics) {
        self.peak_joins_per_second = self.peak_joins_per_second.max(metrics.joins_per_second);
        self.peak_connections_per_second = self
            .peak_connections_per_second
            .max(metrics.connections_per_second);
        self.peak_verifying = self.peak_verifying.max(metrics.verifying);
        self.peak_queued = self.peak_queued.max(metrics.queued);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackEvent {
    Detected {
        started_at: DateTime<Utc>,
        metrics: AttackMetrics,
    },
    Mitigated {
        statistics: AttackStatistics,
        ended_at: DateTime<Utc>,
        duration: Duration,
        /// Verifications that succeeded during the attack.
        successful: u64,
        /// Verifications that failed during the attack.
        failed: u64,
        blacklisted: usize,
    },
}

struct ActiveAttack {
    statistics: AttackStatistics,
    last_seen: Instant,
}

pub struct AttackTracker {
    thresholds: AttackThresholds,
    current: Mutex<Option<ActiveAttack>>,
}

impl AttackTracker {
    pub fn new(thresholds: AttackThresholds) -> Self {
        Self {
            thresholds,
            current: Mutex::new(None),
        }
    }

    pub fn is_under_attack(&self) -> bool {
        self.current.lock().is_some()
    }

    pub fn current(&self) -> Option<AttackStatistics> {
        self.current.lock().as_ref().map(|a| a.statistics.clone())
    }

    /// Feeds one sample. Returns an event when an attack starts or ends.
    pub fn check_if_under_attack(&self, metrics: &AttackMetrics, now: Instant) -> Option<AttackEvent> {
        let mut current = self.current.lock();

        if self.thresholds.exceeded_by(metrics) {
            let mut event = None;
            let attack = current.get_or_insert_with(|| {
                let statistics = AttackStatistics::new(metrics, now);
                tracing::warn!(
                    "[attack] detected joins/s={} verifying={} queued={}",
                    metrics.joins_per_second,
                    metrics.verifying,
                    metrics.queued
                );
                event = Some(AttackEvent::Detected {
                    started_at: statistics.started_at,
                    metrics: *metrics,
                });
                ActiveAttack {
                    statistics,
                    last_seen: now,
                }
            });
            attack.last_seen = now;
            attack.statistics.update_peaks(metrics);
            return event;
        }

        let attack = current.as_ref()?;
        let lasted = now.saturating_duration_since(attack.statistics.started);
        let quiet = now.saturating_duration_since(attack.last_seen);
        if lasted < self.thresholds.min_attack_duration || quiet <= self.thresholds.cooldown {
            return None;
        }

        let attack = current.take()?;
        let statistics = attack.statistics;
        let successful = metrics.total_successful.saturating_sub(statistics.successful_before);
        let failed = metrics.total_failed.saturating_sub(statistics.failed_before);
        tracing::info!(
            "[attack] mitigated after {:?} success={} failed={}",
            lasted,
            successful,
            failed
        );
        Some(AttackEvent::Mitigated {
            statistics,
            ended_at: Utc::now(),
            duration: lasted,
            successful,
            failed,
            blacklisted: metrics.blacklisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> AttackTracker {
        AttackTracker::new(AttackThresholds {
            joins_per_second: 8,
            verifying: 8,
            queued: 8,
            min_attack_duration: Duration::from_secs(30),
            cooldown: Duration::from_secs(3),
        })
    }

    fn spike() -> AttackMetrics {
        AttackMetrics {
            joins_per_second: 200,
            verifying: 50,
            queued: 120,
            ..Default::default()
        }
    }

    #[test]
    fn test_quiet_metrics_do_nothing() {
        let tracker = tracker();
        let quiet = AttackMetrics {
            joins_per_second: 8,
            verifying: 8,
            queued: 8,
            ..Default::default()
        };
        assert!(tracker.check_if_under_attack(&quiet, Instant::now()).is_none());
        assert!(!tracker.is_under_attack());
    }

    #[test]
    fn test_single_spike_does_not_mitigate_immediately() {
        let tracker = tracker();
        let t0 = Instant::now();
        let event = tracker.check_if_under_attack(&spike(), t0);
        assert!(matches!(event, Some(AttackEvent::Detected { .. })));

        for secs in 1..30 {
            let now = t0 + Duration::from_secs(secs);
            assert!(tracker.check_if_under_attack(&AttackMetrics::default(), now).is_none());
        }
        assert!(tracker.is_under_attack());
    }

    #[test]
    fn test_sustained_spike_mitigates_once_after_cooldown() {
        let tracker = tracker();
        let t0 = Instant::now();
        let mut detected = 0;
        for secs in 0..40 {
            let mut metrics = spike();
            metrics.total_successful = 100 + secs;
            metrics.total_failed = 10 + secs * 2;
            if let Some(AttackEvent::Detected { .. }) =
                tracker.check_if_under_attack(&metrics, t0 + Duration::from_secs(secs))
            {
                detected += 1;
            }
        }
        assert_eq!(detected, 1);

        let after = AttackMetrics {
            total_successful: 150,
            total_failed: 100,
            ..Default::default()
        };
        let mut mitigated = Vec::new();
        for secs in 40..50 {
            if let Some(event) = tracker.check_if_under_attack(&after, t0 + Duration::from_secs(secs)) {
                mitigated.push((secs, event));
            }
        }
        assert_eq!(mitigated.len(), 1);
        let (secs, event) = &mitigated[0];
        // last under-attack sample at 39s, cooldown of 3s must be exceeded
        assert_eq!(*secs, 43);
        match event {
            AttackEvent::Mitigated {
                statistics,
                successful,
                failed,
                ..
            } => {
                assert_eq!(statistics.peak_joins_per_second, 200);
                assert_eq!(statistics.peak_queued, 120);
                assert_eq!(*successful, 50);
                assert_eq!(*failed, 90);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!tracker.is_under_attack());
    }
}
