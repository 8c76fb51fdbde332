//! Verification state machine
//!
//! A [`Session`] is sans-IO: the connection task feeds it decoded serverbound
//! packets and drains the packets and phase switches it queued in response.
//! Each stage of the script lives in its own module and reports back with a
//! [`Step`]; the session owns the order in which stages follow each other.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use uuid::Uuid;

use crate::config::{CompiledPatterns, Gamemode, Timing, VerificationConfig};
use crate::external::{
    CaptchaGenerator, EmptyRegistry, PrecomputedCaptchas, RegistryProvider,
};
use crate::messages::{MessageKey, Messages};
use crate::network::AttackTracker;
use crate::protocol::packets::{Clientbound, KeepAlive, Serverbound, SystemChat};
use crate::protocol::{Phase, ProtocolError, ProtocolVersion};

/// Fails the current check with a formatted reason.
macro_rules! ensure_check {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::verification::VerificationError::Check(format!($($arg)+)));
        }
    };
}

mod captcha;
mod gravity;
mod prejoin;
mod transaction;
mod vehicle;

use captcha::CaptchaCheck;
use gravity::Gravity;
use prejoin::{ClientDetails, PreJoin};
use transaction::TransactionCheck;
use vehicle::VehicleCheck;

pub use gravity::fall_distance;

/// Spawn X and Z; the platform is centred on them.
pub const SPAWN_XZ: f64 = 8.0;
/// Edge length of the landing platform.
pub const BLOCKS_PER_ROW: i32 = 8;

/// What the session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    LoginAck,
    Configure,
    PreJoinKeepAlive,
    ClientSettings,
    PluginMessage,
    Transaction,
    Teleport,
    Position,
    Vehicle,
    Captcha,
    Success,
    Failed,
}

impl ConnectionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionPhase::Success | ConnectionPhase::Failed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    Check(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid username: {0}")]
    InvalidUsername(String),
}

impl VerificationError {
    /// Disconnect text the client is shown for this failure.
    pub fn message_key(&self) -> MessageKey {
        match self {
            VerificationError::InvalidUsername(_) => MessageKey::InvalidUsername,
            _ => MessageKey::VerificationFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;

/// Response produced while handling a packet, in send order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Packet(Clientbound),
    /// Both codec directions move to this phase before the next packet.
    Phase(Phase),
}

/// Result of feeding the session one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    /// Every check passed.
    Passed,
    /// Close the connection with this message without counting a failure.
    Disconnect(MessageKey),
}

/// Stage-local result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Stay,
    Done,
}

/// Coordinates and ids shared by every session of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldLayout {
    pub player_entity_id: i32,
    pub vehicle_entity_id: i32,
    pub first_teleport_id: i32,
    pub second_teleport_id: i32,
    /// Y of the platform blocks.
    pub platform_y: i32,
    /// Y the player is parked at while not falling.
    pub in_air_y: i32,
    /// Y the fall starts from.
    pub spawn_y: i32,
}

impl WorldLayout {
    pub fn new(platform_y: i32, in_air_y: i32, max_movement_ticks: u32) -> Self {
        let first_teleport_id = rand::random_range(1..i32::MAX);
        let mut second_teleport_id = rand::random_range(1..i32::MAX);
        if second_teleport_id == first_teleport_id {
            second_teleport_id = first_teleport_id.wrapping_add(1).max(1);
        }
        Self {
            player_entity_id: rand::random(),
            vehicle_entity_id: rand::random(),
            first_teleport_id,
            second_teleport_id,
            platform_y,
            in_air_y,
            spawn_y: platform_y + fall_distance(max_movement_ticks).ceil() as i32,
        }
    }

    pub fn random(max_movement_ticks: u32) -> Self {
        Self::new(
            1 + rand::random_range(0..255),
            1000 + rand::random_range(0..338),
            max_movement_ticks,
        )
    }
}

/// Read-only state every session consults.
pub struct VerificationContext {
    pub config: VerificationConfig,
    pub patterns: CompiledPatterns,
    pub messages: Messages,
    pub world: WorldLayout,
    pub attack: Arc<AttackTracker>,
    pub captchas: Arc<dyn CaptchaGenerator>,
    pub registry: Arc<dyn RegistryProvider>,
}

impl VerificationContext {
    pub fn new(config: VerificationConfig, messages: Messages) -> anyhow::Result<Self> {
        config.validate()?;
        let patterns = config.compile_patterns()?;
        let world = WorldLayout::random(config.gravity.max_movement_ticks);
        let attack = Arc::new(AttackTracker::new(config.attack_thresholds()));
        let captchas = Arc::new(PrecomputedCaptchas::digits(
            config.captcha.precompute,
            config.captcha.answer_length,
        ));
        Ok(Self {
            config,
            patterns,
            messages,
            world,
            attack,
            captchas,
            registry: Arc::new(EmptyRegistry),
        })
    }

    pub fn with_world(mut self, world: WorldLayout) -> Self {
        self.world = world;
        self
    }

    pub fn with_captchas(mut self, captchas: Arc<dyn CaptchaGenerator>) -> Self {
        self.captchas = captchas;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryProvider>) -> Self {
        self.registry = registry;
        self
    }

    /// Most packets a session may send before it is failed.
    pub fn packet_budget(&self) -> u32 {
        let config = &self.config;
        let captcha = if config.captcha.timing == Timing::Never {
            0
        } else {
            (config.captcha.max_duration_ms / 1000) as u32 * 20
        } + 5;
        let vehicle = if config.vehicle.enabled {
            config.vehicle.minimum_packets * 4
        } else {
            0
        };
        config.gravity.max_movement_ticks + 2 + captcha + vehicle + config.captcha.max_tries + 150
    }

    fn captcha_max_duration(&self) -> Duration {
        Duration::from_millis(self.config.captcha.max_duration_ms)
    }
}

/// Who is being verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub addr: SocketAddr,
    pub version: ProtocolVersion,
    pub username: String,
    /// Tunnelled Bedrock client; physics checks are skipped.
    pub bedrock: bool,
}

impl Profile {
    /// Hex MD5 of `username:ip`, the key of the verified-player store.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.username, &self.addr)
    }

    pub fn offline_uuid(&self) -> Uuid {
        offline_uuid(&self.username)
    }
}

pub fn fingerprint(username: &str, addr: &SocketAddr) -> String {
    hex::encode(Md5::digest(format!("{}:{}", username, addr.ip()).as_bytes()))
}

/// Name-based UUID an offline-mode server assigns.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{}", username).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

/// Session data every stage reads and writes.
pub(crate) struct SessionState {
    pub ctx: Arc<VerificationContext>,
    pub profile: Profile,
    pub login_started: Instant,
    pub details: ClientDetails,
    pub expected_keep_alive: Option<i64>,
    pub force_captcha: bool,
    outbox: Vec<Outbound>,
}

impl SessionState {
    pub fn version(&self) -> ProtocolVersion {
        self.profile.version
    }

    pub fn send(&mut self, packet: Clientbound) {
        self.outbox.push(Outbound::Packet(packet));
    }

    pub fn switch_phase(&mut self, phase: Phase) {
        self.outbox.push(Outbound::Phase(phase));
    }

    /// Sends a keep-alive with a fresh id and makes it the outstanding one.
    pub fn send_keep_alive(&mut self) -> i64 {
        let id = rand::random_range(1..i32::MAX) as i64;
        self.expected_keep_alive = Some(id);
        self.send(Clientbound::KeepAlive(KeepAlive { id }));
        id
    }

    /// Chat line from the catalogue; empty texts are not sent.
    pub fn send_message(&mut self, key: MessageKey) {
        let text = self.ctx.messages.get(key);
        if !text.is_empty() {
            let chat = SystemChat::new(text);
            self.send(Clientbound::SystemChat(chat));
        }
    }

    pub fn gamemode(&self) -> Gamemode {
        self.ctx.config.gamemode
    }
}

enum Stage {
    PreJoin(PreJoin),
    Gravity(Gravity),
    Transaction(TransactionCheck),
    Vehicle(VehicleCheck),
    Captcha(CaptchaCheck),
    Success,
    Failed,
}

/// One client's run through the verification script.
pub struct Session {
    state: SessionState,
    stage: Stage,
    packets: u32,
    budget: u32,
}

impl Session {
    pub fn new(ctx: Arc<VerificationContext>, profile: Profile, now: Instant) -> Self {
        let budget = ctx.packet_budget();
        Self {
            state: SessionState {
                ctx,
                profile,
                login_started: now,
                details: ClientDetails::default(),
                expected_keep_alive: None,
                force_captcha: false,
                outbox: Vec::new(),
            },
            stage: Stage::Failed,
            packets: 0,
            budget,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.state.profile
    }

    pub fn login_started(&self) -> Instant {
        self.state.login_started
    }

    /// Sends the login success and whatever the client's version expects
    /// next. 1.7 clients skip the pre-join keep-alive.
    pub fn start(&mut self, now: Instant) -> Result<Progress> {
        let prejoin = PreJoin::enter(&mut self.state);
        self.stage = Stage::PreJoin(prejoin);
        if self.state.version() < ProtocolVersion::V1_8 {
            return self.guard(|session| session.advance(now));
        }
        Ok(Progress::Continue)
    }

    pub fn phase(&self) -> ConnectionPhase {
        match &self.stage {
            Stage::PreJoin(prejoin) => prejoin.phase(&self.state),
            Stage::Gravity(gravity) => gravity.phase(),
            Stage::Transaction(_) => ConnectionPhase::Transaction,
            Stage::Vehicle(_) => ConnectionPhase::Vehicle,
            Stage::Captcha(_) => ConnectionPhase::Captcha,
            Stage::Success => ConnectionPhase::Success,
            Stage::Failed => ConnectionPhase::Failed,
        }
    }

    /// Packets and phase switches queued since the last call.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.state.outbox)
    }

    /// Marks the session failed, e.g. after a decode error.
    pub fn mark_failed(&mut self) {
        self.stage = Stage::Failed;
    }

    pub fn handle(&mut self, packet: Serverbound, now: Instant) -> Result<Progress> {
        self.guard(|session| session.dispatch(packet, now))
    }

    fn guard(&mut self, f: impl FnOnce(&mut Self) -> Result<Progress>) -> Result<Progress> {
        let result = f(self);
        if result.is_err() {
            self.stage = Stage::Failed;
        }
        result
    }

    fn dispatch(&mut self, packet: Serverbound, now: Instant) -> Result<Progress> {
        if self.phase().is_terminal() {
            return Ok(Progress::Continue);
        }
        // Ticks arrive every 50ms on 1.21.2+ and are only counted by the
        // gravity check.
        if !matches!(packet, Serverbound::ClientTickEnd) {
            self.packets += 1;
            ensure_check!(
                self.packets <= self.budget,
                "too many packets: {}/{}",
                self.packets,
                self.budget
            );
        }
        if let Serverbound::KeepAlive(keep_alive) = &packet {
            let expected = self.state.expected_keep_alive.take();
            ensure_check!(
                expected == Some(keep_alive.id),
                "expected K ID {:?} but got {}",
                expected,
                keep_alive.id
            );
        }

        let state = &mut self.state;
        let step = match &mut self.stage {
            Stage::PreJoin(prejoin) => prejoin.handle(state, &packet)?,
            Stage::Gravity(gravity) => gravity.handle(state, &packet)?,
            Stage::Transaction(check) => check.handle(state, &packet)?,
            Stage::Vehicle(check) => check.handle(state, &packet)?,
            Stage::Captcha(check) => check.handle(state, &packet, now)?,
            Stage::Success | Stage::Failed => Step::Stay,
        };
        match step {
            Step::Stay => Ok(Progress::Continue),
            Step::Done => self.advance(now),
        }
    }

    fn captcha_required(&self) -> bool {
        self.state.force_captcha
            || self
                .state
                .ctx
                .config
                .captcha
                .timing
                .applies(self.state.ctx.attack.is_under_attack())
    }

    /// Moves on to the stage after the current one.
    fn advance(&mut self, now: Instant) -> Result<Progress> {
        let config = &self.state.ctx.config;
        let vehicle = config.vehicle.enabled && !self.state.profile.bedrock;
        let current = std::mem::replace(&mut self.stage, Stage::Failed);
        self.stage = match current {
            Stage::PreJoin(_) => {
                let username = &self.state.profile.username;
                if !self.state.ctx.patterns.username.is_match(username) {
                    return Err(VerificationError::InvalidUsername(username.clone()));
                }
                Stage::Gravity(Gravity::enter(&mut self.state))
            }
            Stage::Gravity(_) => Stage::Transaction(TransactionCheck::enter(&mut self.state)),
            Stage::Transaction(_) if vehicle => Stage::Vehicle(VehicleCheck::enter(&mut self.state)),
            Stage::Transaction(_) | Stage::Vehicle(_) if self.captcha_required() => {
                match CaptchaCheck::enter(&mut self.state, now) {
                    Some(check) => Stage::Captcha(check),
                    None => return Ok(Progress::Disconnect(MessageKey::CurrentlyPreparing)),
                }
            }
            Stage::Transaction(_) | Stage::Vehicle(_) | Stage::Captcha(_) => Stage::Success,
            terminal => terminal,
        };
        match self.stage {
            Stage::Success => Ok(Progress::Passed),
            _ => Ok(Progress::Continue),
        }
    }
}
