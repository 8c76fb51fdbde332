//! Verifier configuration
//!
//! Parsed from YAML with serde. Every field has a default, so an empty file
//! is a valid configuration. Regex options are compiled once at load time
//! into [`CompiledPatterns`].

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::network::AttackThresholds;

/// When a check applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Always,
    DuringAttack,
    Never,
}

impl Timing {
    pub fn applies(self, under_attack: bool) -> bool {
        match self {
            Timing::Always => true,
            Timing::DuringAttack => under_attack,
            Timing::Never => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamemode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl Gamemode {
    pub fn id(self) -> u8 {
        match self {
            Gamemode::Survival => 0,
            Gamemode::Creative => 1,
            Gamemode::Adventure => 2,
            Gamemode::Spectator => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Entries released per poll tick.
    #[serde(default = "default_max_queue_polls")]
    pub max_polls: usize,

    #[serde(default = "default_queue_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_polls: default_max_queue_polls(),
            poll_interval_ms: default_queue_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackConfig {
    #[serde(default = "default_attack_threshold")]
    pub joins_per_second: u64,

    #[serde(default = "default_attack_threshold_usize")]
    pub verifying: usize,

    #[serde(default = "default_attack_threshold_usize")]
    pub queued: usize,

    #[serde(default = "default_min_attack_duration_secs")]
    pub min_duration_secs: u64,

    #[serde(default = "default_attack_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            joins_per_second: default_attack_threshold(),
            verifying: default_attack_threshold_usize(),
            queued: default_attack_threshold_usize(),
            min_duration_secs: default_min_attack_duration_secs(),
            cooldown_secs: default_attack_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub check_collisions: bool,

    /// Show the captcha instead of failing on a gravity violation.
    #[serde(default)]
    pub captcha_on_fail: bool,

    #[serde(default = "default_max_movement_ticks")]
    pub max_movement_ticks: u32,

    #[serde(default = "default_gravity_tolerance")]
    pub tolerance: f64,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_collisions: true,
            captcha_on_fail: false,
            max_movement_ticks: default_max_movement_ticks(),
            tolerance: default_gravity_tolerance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_vehicle_minimum_packets")]
    pub minimum_packets: u32,

    #[serde(default = "default_gravity_tolerance")]
    pub tolerance: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            minimum_packets: default_vehicle_minimum_packets(),
            tolerance: default_gravity_tolerance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default = "default_captcha_timing")]
    pub timing: Timing,

    #[serde(default = "default_captcha_max_tries")]
    pub max_tries: u32,

    /// Time allowed from login start until the answer arrives.
    #[serde(default = "default_captcha_max_duration_ms")]
    pub max_duration_ms: u64,

    #[serde(default = "default_captcha_answer_length")]
    pub answer_length: usize,

    /// Captchas generated at startup by the built-in digit renderer.
    #[serde(default = "default_captcha_precompute")]
    pub precompute: usize,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            timing: default_captcha_timing(),
            max_tries: default_captcha_max_tries(),
            max_duration_ms: default_captcha_max_duration_ms(),
            answer_length: default_captcha_answer_length(),
            precompute: default_captcha_precompute(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_brand_max_length")]
    pub max_length: usize,

    #[serde(default = "default_brand_regex")]
    pub regex: String,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: default_brand_max_length(),
            regex: default_brand_regex(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Listen address of the standalone front end.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Server verified players are proxied to. Without one they are
    /// disconnected after the fast path.
    #[serde(default)]
    pub backend: Option<String>,

    /// Whether new players are verified at all.
    #[serde(default = "default_verification_timing")]
    pub timing: Timing,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default = "default_max_verifying")]
    pub max_verifying: usize,

    #[serde(default = "default_max_online_per_address")]
    pub max_online_per_address: usize,

    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    #[serde(default = "default_blacklist_ttl_secs")]
    pub blacklist_ttl_secs: u64,

    /// Failures before an address is refused. Zero disables the blacklist.
    #[serde(default = "default_blacklist_threshold")]
    pub blacklist_threshold: u32,

    #[serde(default)]
    pub attack: AttackConfig,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_login_timeout_ms")]
    pub login_timeout_ms: u64,

    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    #[serde(default)]
    pub gravity: GravityConfig,

    #[serde(default)]
    pub vehicle: VehicleConfig,

    #[serde(default)]
    pub captcha: CaptchaConfig,

    #[serde(default)]
    pub brand: BrandConfig,

    #[serde(default = "default_username_regex")]
    pub username_regex: String,

    #[serde(default)]
    pub blacklisted_protocols: Vec<i32>,

    #[serde(default = "default_gamemode")]
    pub gamemode: Gamemode,

    #[serde(default)]
    pub log_during_attack: bool,

    /// Verify Bedrock players too instead of letting them through.
    #[serde(default)]
    pub check_bedrock: bool,

    /// Source addresses of trusted Bedrock tunnels. Only connections
    /// accepted from one of these count as Bedrock.
    #[serde(default)]
    pub bedrock_tunnels: Vec<IpAddr>,
}

// ============================================
// Default value functions
// ============================================

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0:25565".to_string()
}

fn default_verification_timing() -> Timing {
    Timing::Always
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_max_queue_polls() -> usize {
    30
}

fn default_queue_poll_interval_ms() -> u64 {
    1000
}

fn default_max_verifying() -> usize {
    5000
}

fn default_max_online_per_address() -> usize {
    3
}

fn default_rate_limit_ms() -> u64 {
    8000
}

fn default_blacklist_ttl_secs() -> u64 {
    600
}

fn default_blacklist_threshold() -> u32 {
    2
}

fn default_attack_threshold() -> u64 {
    8
}

fn default_attack_threshold_usize() -> usize {
    8
}

fn default_min_attack_duration_secs() -> u64 {
    30
}

fn default_attack_cooldown_secs() -> u64 {
    3
}

fn default_read_timeout_ms() -> u64 {
    8000
}

fn default_login_timeout_ms() -> u64 {
    5000
}

fn default_queue_timeout_ms() -> u64 {
    60_000
}

fn default_max_movement_ticks() -> u32 {
    8
}

fn default_gravity_tolerance() -> f64 {
    1e-7
}

fn default_vehicle_minimum_packets() -> u32 {
    2
}

fn default_captcha_timing() -> Timing {
    Timing::DuringAttack
}

fn default_captcha_max_tries() -> u32 {
    3
}

fn default_captcha_max_duration_ms() -> u64 {
    30_000
}

fn default_captcha_answer_length() -> usize {
    5
}

fn default_captcha_precompute() -> usize {
    500
}

fn default_brand_max_length() -> usize {
    64
}

fn default_brand_regex() -> String {
    "[!-~ ]+".to_string()
}

fn default_username_regex() -> String {
    "[a-zA-Z0-9_.]+".to_string()
}

fn default_gamemode() -> Gamemode {
    Gamemode::Adventure
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            backend: None,
            timing: default_verification_timing(),
            queue: QueueConfig::default(),
            max_verifying: default_max_verifying(),
            max_online_per_address: default_max_online_per_address(),
            rate_limit_ms: default_rate_limit_ms(),
            blacklist_ttl_secs: default_blacklist_ttl_secs(),
            blacklist_threshold: default_blacklist_threshold(),
            attack: AttackConfig::default(),
            read_timeout_ms: default_read_timeout_ms(),
            login_timeout_ms: default_login_timeout_ms(),
            queue_timeout_ms: default_queue_timeout_ms(),
            gravity: GravityConfig::default(),
            vehicle: VehicleConfig::default(),
            captcha: CaptchaConfig::default(),
            brand: BrandConfig::default(),
            username_regex: default_username_regex(),
            blacklisted_protocols: Vec::new(),
            gamemode: default_gamemode(),
            log_during_attack: false,
            check_bedrock: false,
            bedrock_tunnels: Vec::new(),
        }
    }
}

impl VerificationConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: VerificationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: VerificationConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bind
            .parse::<SocketAddr>()
            .with_context(|| format!("bind is not a socket address: {}", self.bind))?;
        if let Some(backend) = &self.backend {
            anyhow::ensure!(!backend.is_empty(), "backend cannot be empty");
        }

        anyhow::ensure!(self.queue.capacity > 0, "queue.capacity must be positive");
        anyhow::ensure!(self.queue.max_polls > 0, "queue.max_polls must be positive");
        anyhow::ensure!(
            self.queue.poll_interval_ms > 0,
            "queue.poll_interval_ms must be positive"
        );
        anyhow::ensure!(self.max_verifying > 0, "max_verifying must be positive");
        anyhow::ensure!(self.read_timeout_ms > 0, "read_timeout_ms must be positive");
        anyhow::ensure!(self.login_timeout_ms > 0, "login_timeout_ms must be positive");
        anyhow::ensure!(self.queue_timeout_ms > 0, "queue_timeout_ms must be positive");

        anyhow::ensure!(
            (2..=100).contains(&self.gravity.max_movement_ticks),
            "gravity.max_movement_ticks out of range: {} (2..=100)",
            self.gravity.max_movement_ticks
        );
        anyhow::ensure!(
            self.gravity.tolerance >= 0.0 && self.gravity.tolerance.is_finite(),
            "gravity.tolerance must be a finite non-negative number"
        );
        anyhow::ensure!(
            self.vehicle.tolerance >= 0.0 && self.vehicle.tolerance.is_finite(),
            "vehicle.tolerance must be a finite non-negative number"
        );
        anyhow::ensure!(
            self.vehicle.minimum_packets <= 20,
            "vehicle.minimum_packets too large: {} (max 20)",
            self.vehicle.minimum_packets
        );

        anyhow::ensure!(self.captcha.max_tries > 0, "captcha.max_tries must be positive");
        anyhow::ensure!(
            self.captcha.max_duration_ms >= 5000,
            "captcha.max_duration_ms too small: {} (min 5000)",
            self.captcha.max_duration_ms
        );
        anyhow::ensure!(
            (1..=16).contains(&self.captcha.answer_length),
            "captcha.answer_length out of range: {} (1..=16)",
            self.captcha.answer_length
        );

        anyhow::ensure!(self.brand.max_length > 2, "brand.max_length too small");

        // Surface regex errors here rather than at first use
        self.compile_patterns()?;

        Ok(())
    }

    pub fn compile_patterns(&self) -> Result<CompiledPatterns> {
        Ok(CompiledPatterns {
            username: full_match(&self.username_regex)
                .with_context(|| format!("Invalid username_regex: {}", self.username_regex))?,
            brand: full_match(&self.brand.regex)
                .with_context(|| format!("Invalid brand.regex: {}", self.brand.regex))?,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self).context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn is_protocol_blacklisted(&self, protocol: i32) -> bool {
        self.blacklisted_protocols.contains(&protocol)
    }

    pub fn is_bedrock_tunnel(&self, ip: IpAddr) -> bool {
        self.bedrock_tunnels.contains(&ip)
    }

    pub fn attack_thresholds(&self) -> AttackThresholds {
        AttackThresholds {
            joins_per_second: self.attack.joins_per_second,
            verifying: self.attack.verifying,
            queued: self.attack.queued,
            min_attack_duration: Duration::from_secs(self.attack.min_duration_secs),
            cooldown: Duration::from_secs(self.attack.cooldown_secs),
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn blacklist_ttl(&self) -> Duration {
        Duration::from_secs(self.blacklist_ttl_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue.poll_interval_ms)
    }
}

fn full_match(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

/// Regex options compiled to anchored whole-string matchers.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub username: Regex,
    pub brand: Regex,
}
