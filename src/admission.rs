//! Admission controller
//!
//! Every login passes through [`Admission::admit`] before a session exists.
//! The checks run in a fixed order and the first one that fails decides the
//! disconnect message. Capacity refusals never count as a strike.
//!
//! Admitted connections hold an RAII guard; dropping it releases the slot in
//! the connected set (and the queue entry) or the per-address online count.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::external::VerifiedPlayerController;
use crate::messages::MessageKey;
use crate::network::{Blacklist, QueueError, RateLimiter, StartAction, VerificationQueue};
use crate::protocol::packets::{Handshake, LoginStart};
use crate::protocol::ProtocolVersion;
use crate::statistics::Statistics;
use crate::verification::{fingerprint, VerificationContext};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("malformed login: {0}")]
    Malformed(&'static str),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(i32),

    #[error("protocol version {0} is blacklisted")]
    ProtocolBlacklisted(i32),

    #[error("{0} is already verifying")]
    AlreadyVerifying(IpAddr),

    #[error("{0} is blacklisted")]
    Blacklisted(IpAddr),

    #[error("too many players online from {0}")]
    TooManyOnlinePerAddress(IpAddr),

    #[error("{0} reconnected too fast")]
    ReconnectedTooFast(IpAddr),

    #[error("verification queue is full")]
    QueueFull,

    #[error("too many players verifying")]
    TooManyVerifying,

    #[error("{0} is already queued")]
    AlreadyQueued(IpAddr),
}

impl Rejection {
    pub fn message_key(&self) -> MessageKey {
        match self {
            Rejection::Malformed(_) => MessageKey::VerificationFailed,
            Rejection::UnsupportedVersion(_) => MessageKey::UnsupportedVersion,
            Rejection::ProtocolBlacklisted(_) => MessageKey::ProtocolBlacklisted,
            Rejection::AlreadyVerifying(_) => MessageKey::AlreadyVerifying,
            Rejection::Blacklisted(_) => MessageKey::Blacklisted,
            Rejection::TooManyOnlinePerAddress(_) => MessageKey::TooManyOnlinePerAddress,
            Rejection::ReconnectedTooFast(_) => MessageKey::ReconnectedTooFast,
            Rejection::QueueFull => MessageKey::QueueFull,
            Rejection::TooManyVerifying => MessageKey::TooManyVerifying,
            Rejection::AlreadyQueued(_) => MessageKey::AlreadyQueued,
        }
    }
}

/// Enforces one handshake followed by one login per connection.
#[derive(Debug, Default)]
pub struct HandshakeGate {
    protocol: Option<i32>,
    logged_in: bool,
}

impl HandshakeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handshake(&mut self, handshake: &Handshake) -> Result<(), Rejection> {
        if self.protocol.is_some() {
            return Err(Rejection::Malformed("duplicate handshake"));
        }
        if handshake.hostname.is_empty() {
            return Err(Rejection::Malformed("empty hostname"));
        }
        if !handshake.wants_login() {
            return Err(Rejection::Malformed("unsupported intent"));
        }
        self.protocol = Some(handshake.protocol_version);
        Ok(())
    }

    /// Accepts the login and returns the protocol number from the handshake.
    pub fn login(&mut self, login: &LoginStart, now: DateTime<Utc>) -> Result<i32, Rejection> {
        let Some(protocol) = self.protocol else {
            return Err(Rejection::Malformed("login before handshake"));
        };
        if self.logged_in {
            return Err(Rejection::Malformed("duplicate login"));
        }
        if let Some(key) = &login.public_key {
            if key.expires_at <= now.timestamp_millis() {
                return Err(Rejection::Malformed("expired public key"));
            }
        }
        self.logged_in = true;
        Ok(protocol)
    }
}

/// What admission needs to know about a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub addr: SocketAddr,
    pub protocol: i32,
    pub username: String,
    /// Set by the transport for connections from a trusted Bedrock tunnel.
    pub bedrock: bool,
}

pub enum Admitted {
    /// Not verified at all.
    Bypass(OnlineGuard),
    /// Already passed before.
    Verified(OnlineGuard),
    /// Waiting for the queue to release it.
    Queued(ConnectionGuard),
}

/// Shared admission state: the connected set, the per-address online
/// counts and the queue, rate limiter and blacklist.
pub struct Admission {
    ctx: Arc<VerificationContext>,
    verified: Arc<dyn VerifiedPlayerController>,
    statistics: Arc<Statistics>,
    pub queue: VerificationQueue,
    pub rate_limiter: RateLimiter,
    pub blacklist: Blacklist,
    connected: DashMap<IpAddr, Instant>,
    online: DashMap<IpAddr, usize>,
}

impl Admission {
    pub fn new(
        ctx: Arc<VerificationContext>,
        verified: Arc<dyn VerifiedPlayerController>,
        statistics: Arc<Statistics>,
    ) -> Self {
        let config = &ctx.config;
        let queue = VerificationQueue::new(config.queue.capacity);
        let rate_limiter = RateLimiter::new(config.rate_limit_window());
        let blacklist = Blacklist::new(config.blacklist_ttl(), config.blacklist_threshold);
        Self {
            ctx,
            verified,
            statistics,
            queue,
            rate_limiter,
            blacklist,
            connected: DashMap::new(),
            online: DashMap::new(),
        }
    }

    /// Addresses queued or verifying.
    pub fn verifying(&self) -> usize {
        self.connected.len()
    }

    pub fn is_connected(&self, ip: IpAddr) -> bool {
        self.connected.contains_key(&ip)
    }

    pub fn online(&self, ip: IpAddr) -> usize {
        self.online.get(&ip).map(|count| *count).unwrap_or(0)
    }

    /// Runs the admission checks in order. `start` is enqueued when the
    /// login has to be verified and dropped otherwise.
    pub fn admit(
        self: &Arc<Self>,
        request: &LoginRequest,
        start: StartAction,
        now: Instant,
    ) -> Result<Admitted, Rejection> {
        let config = &self.ctx.config;
        let ip = request.addr.ip();
        self.statistics.count_login(now);

        if !ProtocolVersion::from_id(request.protocol).is_supported() {
            return Err(Rejection::UnsupportedVersion(request.protocol));
        }
        if config.is_protocol_blacklisted(request.protocol) {
            return Err(Rejection::ProtocolBlacklisted(request.protocol));
        }
        if self.connected.contains_key(&ip) {
            return Err(Rejection::AlreadyVerifying(ip));
        }
        if self.blacklist.is_blacklisted(ip, now) {
            return Err(Rejection::Blacklisted(ip));
        }

        let verify = config.timing.applies(self.ctx.attack.is_under_attack());
        if !verify || (request.bedrock && !config.check_bedrock) {
            return self.acquire_online(ip).map(Admitted::Bypass);
        }
        match self.verified.contains(&fingerprint(&request.username, &request.addr)) {
            Ok(true) => return self.acquire_online(ip).map(Admitted::Verified),
            Ok(false) => {}
            Err(err) => tracing::warn!(
                "[admission] verified lookup failed user={}: {:#}",
                request.username,
                err
            ),
        }

        if !self.rate_limiter.attempt(ip, now) {
            return Err(Rejection::ReconnectedTooFast(ip));
        }
        if self.queue.is_full() {
            return Err(Rejection::QueueFull);
        }
        if self.connected.len() >= config.max_verifying {
            return Err(Rejection::TooManyVerifying);
        }
        let mut guard = match self.connected.entry(ip) {
            Entry::Occupied(_) => return Err(Rejection::AlreadyVerifying(ip)),
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                ConnectionGuard {
                    admission: Arc::clone(self),
                    ip,
                    queued: false,
                }
            }
        };
        match self.queue.enqueue(ip, start) {
            Ok(()) => guard.queued = true,
            Err(QueueError::Full(_)) => return Err(Rejection::QueueFull),
            Err(QueueError::AlreadyQueued(_)) => return Err(Rejection::AlreadyQueued(ip)),
        }
        Ok(Admitted::Queued(guard))
    }

    fn acquire_online(self: &Arc<Self>, ip: IpAddr) -> Result<OnlineGuard, Rejection> {
        let max = self.ctx.config.max_online_per_address;
        {
            let mut count = self.online.entry(ip).or_insert(0);
            if *count < max {
                *count += 1;
                return Ok(OnlineGuard {
                    admission: Arc::clone(self),
                    ip,
                });
            }
        }
        self.online.remove_if(&ip, |_, count| *count == 0);
        Err(Rejection::TooManyOnlinePerAddress(ip))
    }
}

/// Membership in the connected set.
pub struct ConnectionGuard {
    admission: Arc<Admission>,
    ip: IpAddr,
    queued: bool,
}

impl ConnectionGuard {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.queued {
            self.admission.queue.remove(self.ip);
        }
        self.admission.connected.remove(&self.ip);
    }
}

/// One slot of the per-address online count.
pub struct OnlineGuard {
    admission: Arc<Admission>,
    ip: IpAddr,
}

impl Drop for OnlineGuard {
    fn drop(&mut self) {
        let online = &self.admission.online;
        if let Some(mut count) = online.get_mut(&self.ip) {
            *count = count.saturating_sub(1);
        }
        online.remove_if(&self.ip, |_, count| *count == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use crate::external::InMemoryVerifiedPlayers;
    use crate::messages::Messages;
    use crate::protocol::packets::login::PlayerPublicKey;

    fn setup(yaml: &str) -> (Arc<Admission>, Arc<InMemoryVerifiedPlayers>) {
        let mut config = VerificationConfig::from_str(yaml).unwrap();
        config.captcha.precompute = 1;
        let ctx = Arc::new(VerificationContext::new(config, Messages::default()).unwrap());
        let verified = Arc::new(InMemoryVerifiedPlayers::new());
        let admission = Admission::new(ctx, verified.clone(), Arc::new(Statistics::new()));
        (Arc::new(admission), verified)
    }

    fn request(addr: &str, username: &str) -> LoginRequest {
        LoginRequest {
            addr: addr.parse().unwrap(),
            protocol: 758,
            username: username.into(),
            bedrock: false,
        }
    }

    fn noop() -> StartAction {
        Box::new(|| {})
    }

    #[test]
    fn test_double_insert_keeps_first_entry() {
        let (admission, _) = setup("{}");
        let now = Instant::now();
        let first = admission.admit(&request("1.2.3.4:1000", "Alice"), noop(), now);
        assert!(matches!(first, Ok(Admitted::Queued(_))));
        let second = admission.admit(&request("1.2.3.4:1001", "Alice"), noop(), now);
        assert!(matches!(second, Err(Rejection::AlreadyVerifying(_))));
        assert_eq!(admission.queue.len(), 1);
        assert_eq!(admission.verifying(), 1);
        assert_eq!(admission.blacklist.strikes("1.2.3.4".parse().unwrap(), now), 0);
    }

    #[test]
    fn test_guard_drop_releases_slot_and_queue_entry() {
        let (admission, _) = setup("rate_limit_ms: 1\n");
        let now = Instant::now();
        let admitted = admission
            .admit(&request("1.2.3.4:1000", "Alice"), noop(), now)
            .unwrap();
        drop(admitted);
        assert_eq!(admission.verifying(), 0);
        assert!(admission.queue.is_empty());
    }

    #[test]
    fn test_version_checks_come_first() {
        let (admission, _) = setup("blacklisted_protocols: [47]\n");
        let now = Instant::now();
        let mut unknown = request("1.2.3.4:1000", "Alice");
        unknown.protocol = 1;
        assert_eq!(
            admission.admit(&unknown, noop(), now).err(),
            Some(Rejection::UnsupportedVersion(1))
        );
        let mut blocked = request("1.2.3.4:1000", "Alice");
        blocked.protocol = 47;
        let rejection = admission.admit(&blocked, noop(), now).err().unwrap();
        assert_eq!(rejection.message_key(), MessageKey::ProtocolBlacklisted);
    }

    #[test]
    fn test_blacklisted_address_is_refused() {
        let (admission, _) = setup("{}");
        let now = Instant::now();
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        admission.blacklist.strike(ip, now);
        admission.blacklist.strike(ip, now);
        let rejection = admission
            .admit(&request("1.2.3.4:1000", "Alice"), noop(), now)
            .err();
        assert_eq!(rejection, Some(Rejection::Blacklisted(ip)));
    }

    #[test]
    fn test_reconnect_inside_window_is_refused() {
        let (admission, _) = setup("{}");
        let now = Instant::now();
        drop(admission.admit(&request("1.2.3.4:1000", "Alice"), noop(), now));
        let again = admission.admit(&request("1.2.3.4:1001", "Alice"), noop(), now);
        assert!(matches!(again, Err(Rejection::ReconnectedTooFast(_))));
    }

    #[test]
    fn test_verified_fast_path_and_online_cap() {
        let (admission, verified) = setup("max_online_per_address: 1\n");
        let now = Instant::now();
        let alice = request("1.2.3.4:1000", "Alice");
        verified
            .add(&fingerprint(&alice.username, &alice.addr))
            .unwrap();
        let first = admission.admit(&alice, noop(), now).unwrap();
        assert!(matches!(first, Admitted::Verified(_)));
        assert_eq!(admission.online(alice.addr.ip()), 1);
        let second = admission.admit(&alice, noop(), now);
        assert!(matches!(second, Err(Rejection::TooManyOnlinePerAddress(_))));
        drop(first);
        assert_eq!(admission.online(alice.addr.ip()), 0);
        assert!(matches!(
            admission.admit(&alice, noop(), now),
            Ok(Admitted::Verified(_))
        ));
    }

    #[test]
    fn test_bypass_when_verification_disabled_or_bedrock() {
        let (admission, _) = setup("timing: never\n");
        let now = Instant::now();
        assert!(matches!(
            admission.admit(&request("1.2.3.4:1000", "Alice"), noop(), now),
            Ok(Admitted::Bypass(_))
        ));

        let (admission, _) = setup("{}");
        let mut tunnelled = request("1.2.3.4:1000", "Steve");
        tunnelled.bedrock = true;
        assert!(matches!(
            admission.admit(&tunnelled, noop(), now),
            Ok(Admitted::Bypass(_))
        ));
        let (admission, _) = setup("check_bedrock: true\n");
        assert!(matches!(
            admission.admit(&tunnelled, noop(), now),
            Ok(Admitted::Queued(_))
        ));
    }

    #[test]
    fn test_username_never_marks_bedrock() {
        let (admission, _) = setup("{}");
        let now = Instant::now();
        for (i, name) in [".Bot", "*Bot", ".", "BE_Bot"].into_iter().enumerate() {
            let ip = format!("10.9.0.{}:1000", i + 1);
            let admitted = admission.admit(&request(&ip, name), noop(), now);
            assert!(
                matches!(admitted, Ok(Admitted::Queued(_))),
                "{} skipped the queue",
                name
            );
        }
    }

    #[test]
    fn test_capacity_rejections() {
        let (admission, _) = setup("queue:\n  capacity: 1\n");
        let now = Instant::now();
        let _held = admission.admit(&request("1.2.3.4:1000", "Alice"), noop(), now);
        let full = admission.admit(&request("5.6.7.8:1000", "Bob"), noop(), now);
        assert_eq!(full.err(), Some(Rejection::QueueFull));

        let (admission, _) = setup("max_verifying: 1\n");
        let _held = admission.admit(&request("1.2.3.4:1000", "Alice"), noop(), now);
        let busy = admission.admit(&request("5.6.7.8:1000", "Bob"), noop(), now);
        assert_eq!(busy.err(), Some(Rejection::TooManyVerifying));
        assert_eq!(admission.blacklist.strikes("5.6.7.8".parse().unwrap(), now), 0);
    }

    fn handshake(hostname: &str) -> Handshake {
        Handshake {
            protocol_version: 758,
            hostname: hostname.into(),
            port: 25565,
            intent: crate::protocol::packets::handshake::INTENT_LOGIN,
        }
    }

    #[test]
    fn test_handshake_gate() {
        let login = LoginStart {
            username: "Alice".into(),
            public_key: None,
            uuid: None,
        };
        let now = Utc::now();

        let mut gate = HandshakeGate::new();
        assert_eq!(
            gate.login(&login, now),
            Err(Rejection::Malformed("login before handshake"))
        );
        assert!(gate.handshake(&handshake("")).is_err());
        gate.handshake(&handshake("play.example.net")).unwrap();
        assert!(gate.handshake(&handshake("play.example.net")).is_err());
        assert_eq!(gate.login(&login, now), Ok(758));
        assert_eq!(gate.login(&login, now), Err(Rejection::Malformed("duplicate login")));
    }

    #[test]
    fn test_expired_public_key_is_refused() {
        let now = Utc::now();
        let mut gate = HandshakeGate::new();
        gate.handshake(&handshake("play.example.net")).unwrap();
        let login = LoginStart {
            username: "Alice".into(),
            public_key: Some(PlayerPublicKey {
                expires_at: now.timestamp_millis() - 1,
                key: vec![1],
                signature: vec![2],
            }),
            uuid: None,
        };
        assert_eq!(
            gate.login(&login, now),
            Err(Rejection::Malformed("expired public key"))
        );
    }
}
