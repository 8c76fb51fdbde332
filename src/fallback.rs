//! Fallback server
//!
//! Owns the shared verifier state and the accept loop. Every accepted
//! socket gets its own task running [`connection::serve`]; two background
//! tasks poll the queue and run periodic maintenance.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::admission::Admission;
use crate::connection::{self, Outcome};
use crate::external::{NotificationSink, VerifiedPlayerController};
use crate::network::AttackMetrics;
use crate::statistics::Statistics;
use crate::verification::{Profile, VerificationContext};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

pub struct Fallback {
    pub ctx: Arc<VerificationContext>,
    pub admission: Arc<Admission>,
    pub statistics: Arc<Statistics>,
    pub verified: Arc<dyn VerifiedPlayerController>,
    notifier: Arc<dyn NotificationSink>,
    /// Runs queue start actions off the async workers.
    workers: rayon::ThreadPool,
}

impl Fallback {
    pub fn new(
        ctx: Arc<VerificationContext>,
        verified: Arc<dyn VerifiedPlayerController>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(4);
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("botwall-queue-{}", i))
            .build()
            .context("failed to build queue worker pool")?;
        let statistics = Arc::new(Statistics::new());
        let admission = Arc::new(Admission::new(
            Arc::clone(&ctx),
            Arc::clone(&verified),
            Arc::clone(&statistics),
        ));
        Ok(Self {
            ctx,
            admission,
            statistics,
            verified,
            notifier,
            workers,
        })
    }

    /// Releases up to `max_polls` queued logins.
    pub fn poll_queue(&self) -> usize {
        let actions = self.admission.queue.poll(self.ctx.config.queue.max_polls);
        let released = actions.len();
        for action in actions {
            self.workers.spawn(action);
        }
        released
    }

    pub fn metrics(&self, now: Instant) -> AttackMetrics {
        AttackMetrics {
            joins_per_second: self.statistics.logins_per_second(now),
            connections_per_second: self.statistics.connections_per_second(now),
            verifying: self.admission.verifying(),
            queued: self.admission.queue.len(),
            total_successful: self.statistics.total_successful(),
            total_failed: self.statistics.total_failed(),
            blacklisted: self.admission.blacklist.blacklisted_count(now),
        }
    }

    /// Attack detection and cache expiry.
    pub fn maintenance(&self, now: Instant) {
        let metrics = self.metrics(now);
        if let Some(event) = self.ctx.attack.check_if_under_attack(&metrics, now) {
            self.notifier.notify(&event);
        }
        let limited = self.admission.rate_limiter.cleanup(now);
        let expired = self.admission.blacklist.cleanup(now);
        self.statistics.prune(now);
        if limited + expired > 0 {
            tracing::trace!(
                "[fallback] [cleanup] rate_limited={} blacklist_expired={}",
                limited,
                expired
            );
        }
    }

    pub fn finish(&self, profile: &Profile, started: Instant) {
        self.statistics.count_success();
        if let Err(err) = self.verified.add(&profile.fingerprint()) {
            tracing::warn!(
                "[verify] [store] user={} could not be remembered: {:#}",
                profile.username,
                err
            );
        }
        tracing::info!(
            "[verify] [success] user={} addr={} version={} took={}ms",
            profile.username,
            profile.addr,
            profile.version,
            started.elapsed().as_millis()
        );
    }

    pub fn fail(&self, profile: &Profile, reason: &str) {
        if self.should_log() {
            tracing::info!(
                "[verify] [failed] user={} addr={} version={} reason={}",
                profile.username,
                profile.addr,
                profile.version,
                reason
            );
        }
        self.record_failure(profile.addr.ip());
    }

    /// A connection task died before it could report an outcome.
    pub fn fail_crashed(&self, addr: SocketAddr) {
        tracing::error!("[verify] [failed] addr={} reason=internal error", addr);
        self.record_failure(addr.ip());
    }

    fn record_failure(&self, ip: IpAddr) {
        let now = Instant::now();
        self.statistics.count_failure();
        let strikes = self.admission.blacklist.strike(ip, now);
        let threshold = self.admission.blacklist.threshold();
        if threshold > 0 && strikes == threshold {
            self.statistics.count_blacklisted();
            if self.should_log() {
                tracing::info!("[verify] [blacklist] addr={} strikes={}", ip, strikes);
            }
        }
    }

    fn should_log(&self) -> bool {
        self.ctx.config.log_during_attack || !self.ctx.attack.is_under_attack()
    }

    /// Starts the queue poller and the maintenance ticker.
    pub fn spawn_ticks(self: &Arc<Self>) {
        let fallback = Arc::clone(self);
        let period = self.ctx.config.queue_poll_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                fallback.poll_queue();
            }
        });

        let fallback = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                ticker.tick().await;
                fallback.maintenance(Instant::now());
            }
        });
    }

    /// Accepts connections forever.
    pub async fn serve_listener(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            if let Err(err) = stream.set_nodelay(true) {
                tracing::debug!("[fallback] [nodelay] addr={}: {}", peer, err);
            }
            let fallback = Arc::clone(&self);
            let bedrock = self.ctx.config.is_bedrock_tunnel(peer.ip());
            tokio::spawn(async move {
                let session = connection::serve(Arc::clone(&fallback), stream, peer, bedrock);
                let outcome = fallback.supervise(peer, session).await;
                log_outcome(peer, &outcome);
            });
        }
    }

    /// Runs a connection in its own task so a panic inside it still ends
    /// as a failure for the peer.
    pub async fn supervise<F>(&self, peer: SocketAddr, connection: F) -> Outcome
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        match tokio::spawn(connection).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => {
                self.fail_crashed(peer);
                Outcome::Failed("internal error".to_string())
            }
            Err(_) => Outcome::Abandoned,
        }
    }

    pub async fn run(self: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", bind_addr))?;
        tracing::info!("[fallback] [ready] addr={}", bind_addr);
        self.spawn_ticks();
        self.serve_listener(listener).await
    }
}

fn log_outcome(peer: SocketAddr, outcome: &Outcome) {
    match outcome {
        Outcome::Rejected(rejection) => {
            tracing::debug!("[fallback] [closed] addr={} rejected: {}", peer, rejection)
        }
        other => tracing::trace!("[fallback] [closed] addr={} {:?}", peer, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use crate::external::InMemoryVerifiedPlayers;
    use crate::messages::Messages;
    use crate::network::AttackEvent;
    use crate::protocol::ProtocolVersion;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AttackEvent>>);

    impl NotificationSink for Recorder {
        fn notify(&self, event: &AttackEvent) {
            self.0.lock().push(event.clone());
        }
    }

    fn setup(yaml: &str, notifier: Arc<dyn NotificationSink>) -> Fallback {
        let config = VerificationConfig::from_str(yaml).unwrap();
        let ctx = Arc::new(VerificationContext::new(config, Messages::default()).unwrap());
        Fallback::new(ctx, Arc::new(InMemoryVerifiedPlayers::new()), notifier).unwrap()
    }

    fn profile(ip: [u8; 4]) -> Profile {
        Profile {
            addr: SocketAddr::from((ip, 40000)),
            version: ProtocolVersion::V1_18_2,
            username: "Alice".into(),
            bedrock: false,
        }
    }

    #[test]
    fn test_finish_remembers_fingerprint() {
        let fallback = setup("{}", Arc::new(Recorder::default()));
        let alice = profile([10, 0, 0, 1]);
        fallback.finish(&alice, Instant::now());
        assert!(fallback.verified.contains(&alice.fingerprint()).unwrap());
        assert_eq!(fallback.statistics.total_successful(), 1);
    }

    #[test]
    fn test_second_failure_blacklists() {
        let fallback = setup("blacklist_threshold: 2\n", Arc::new(Recorder::default()));
        let alice = profile([10, 0, 0, 2]);
        let ip = alice.addr.ip();
        fallback.fail(&alice, "first");
        assert!(!fallback.admission.blacklist.is_blacklisted(ip, Instant::now()));
        fallback.fail(&alice, "second");
        assert!(fallback.admission.blacklist.is_blacklisted(ip, Instant::now()));
        let snapshot = fallback.statistics.snapshot(Instant::now());
        assert_eq!(snapshot.total_failed, 2);
        assert_eq!(snapshot.total_blacklisted, 1);
    }

    #[tokio::test]
    async fn test_panicking_connection_counts_as_failure() {
        let fallback = setup("blacklist_threshold: 1\n", Arc::new(Recorder::default()));
        let peer = SocketAddr::from(([10, 0, 0, 9], 40000));
        let crash = async move {
            if peer.port() > 0 {
                panic!("session blew up");
            }
            Outcome::Passed
        };
        let outcome = fallback.supervise(peer, crash).await;
        assert_eq!(outcome, Outcome::Failed("internal error".to_string()));
        assert_eq!(fallback.statistics.total_failed(), 1);
        assert!(fallback.admission.blacklist.is_blacklisted(peer.ip(), Instant::now()));

        let outcome = fallback.supervise(peer, async { Outcome::Passed }).await;
        assert_eq!(outcome, Outcome::Passed);
        assert_eq!(fallback.statistics.total_failed(), 1);
    }

    #[test]
    fn test_poll_queue_runs_actions_in_order() {
        let fallback = setup("queue:\n  max_polls: 2\n", Arc::new(Recorder::default()));
        let (tx, rx) = mpsc::channel();
        for i in 1..=3u8 {
            let tx = tx.clone();
            fallback
                .admission
                .queue
                .enqueue(
                    std::net::IpAddr::from([10, 0, 1, i]),
                    Box::new(move || {
                        let _ = tx.send(i);
                    }),
                )
                .unwrap();
        }
        assert_eq!(fallback.poll_queue(), 2);
        let mut started: Vec<u8> = (0..2).map(|_| rx.recv().unwrap()).collect();
        started.sort();
        assert_eq!(started, vec![1, 2]);
        assert_eq!(fallback.admission.queue.len(), 1);
    }

    #[test]
    fn test_maintenance_notifies_attack() {
        let recorder = Arc::new(Recorder::default());
        let fallback = setup(
            "attack:\n  joins_per_second: 1\n",
            Arc::clone(&recorder) as Arc<dyn NotificationSink>,
        );
        let now = Instant::now();
        for _ in 0..5 {
            fallback.statistics.count_login(now);
        }
        fallback.maintenance(now);
        assert!(fallback.ctx.attack.is_under_attack());
        let events = recorder.0.lock();
        assert!(matches!(events.as_slice(), [AttackEvent::Detected { .. }]));
    }

    #[test]
    fn test_failures_during_attack_still_count() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct Counting(Arc<AtomicUsize>);
        impl NotificationSink for Counting {
            fn notify(&self, _event: &AttackEvent) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let fallback = setup(
            "log_during_attack: false\nattack:\n  joins_per_second: 1\n",
            Arc::new(Counting(Arc::clone(&calls))),
        );
        let now = Instant::now();
        fallback.statistics.count_login(now);
        fallback.statistics.count_login(now);
        fallback.maintenance(now);
        fallback.fail(&profile([10, 0, 0, 3]), "quiet");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.statistics.total_failed(), 1);
    }
}
