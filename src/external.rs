//! Collaborator seams
//!
//! The verifier depends on four services it does not own: the store of
//! verified players, the captcha source, attack notifications and the
//! registry payloads newer clients need. Each is a trait with a small
//! in-process implementation.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashSet;

use crate::network::AttackEvent;
use crate::protocol::packets::world::MAP_SIZE;
use crate::protocol::ProtocolVersion;

/// Remembers which fingerprints already passed verification.
pub trait VerifiedPlayerController: Send + Sync {
    fn contains(&self, fingerprint: &str) -> Result<bool>;
    fn add(&self, fingerprint: &str) -> Result<()>;
    fn remove(&self, fingerprint: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryVerifiedPlayers {
    fingerprints: DashSet<String>,
}

impl InMemoryVerifiedPlayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

impl VerifiedPlayerController for InMemoryVerifiedPlayers {
    fn contains(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.fingerprints.contains(fingerprint))
    }

    fn add(&self, fingerprint: &str) -> Result<()> {
        self.fingerprints.insert(fingerprint.to_string());
        Ok(())
    }

    fn remove(&self, fingerprint: &str) -> Result<()> {
        self.fingerprints.remove(fingerprint);
        Ok(())
    }
}

/// A map image and the text drawn on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    /// `MAP_SIZE * MAP_SIZE` map colour ids, row major.
    pub image: Bytes,
    pub answer: String,
}

pub trait CaptchaGenerator: Send + Sync {
    /// Returns `None` while nothing is ready to be served.
    fn generate(&self, answer_length: usize) -> Option<Captcha>;
}

/// Serves a fixed pool of captchas round-robin.
#[derive(Default)]
pub struct PrecomputedCaptchas {
    pool: Vec<Captcha>,
    cursor: AtomicUsize,
}

impl PrecomputedCaptchas {
    pub fn new(pool: Vec<Captcha>) -> Self {
        Self {
            pool,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pool of `count` captchas with random digit answers drawn in a block
    /// font over background noise.
    pub fn digits(count: usize, answer_length: usize) -> Self {
        let pool = (0..count)
            .map(|_| {
                let answer: String = (0..answer_length)
                    .map(|_| char::from(b'0' + rand::random_range(0..10u8)))
                    .collect();
                Captcha {
                    image: render_digits(&answer),
                    answer,
                }
            })
            .collect();
        Self::new(pool)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl CaptchaGenerator for PrecomputedCaptchas {
    fn generate(&self, answer_length: usize) -> Option<Captcha> {
        let candidates = self.pool.len();
        for _ in 0..candidates {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates;
            let captcha = &self.pool[index];
            if captcha.answer.chars().count() == answer_length {
                return Some(captcha.clone());
            }
        }
        None
    }
}

// 3x5 glyphs, one row per entry, bit 2 is the left column
const GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

const BACKGROUND: u8 = 8 * 4 + 2;
const FOREGROUND: u8 = 29 * 4 + 3;
const NOISE: u8 = 11 * 4 + 1;

fn render_digits(answer: &str) -> Bytes {
    let mut image = vec![BACKGROUND; MAP_SIZE * MAP_SIZE];
    for pixel in image.iter_mut() {
        if rand::random_range(0..12u8) == 0 {
            *pixel = NOISE;
        }
    }

    let digits: Vec<usize> = answer
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| (b - b'0') as usize)
        .collect();
    if digits.is_empty() {
        return Bytes::from(image);
    }

    // glyph cell is 4 columns wide including spacing
    let scale = (MAP_SIZE / (digits.len() * 4 + 1)).clamp(1, 8);
    let width = digits.len() * 4 * scale;
    let left = MAP_SIZE.saturating_sub(width) / 2;
    let top = (MAP_SIZE - 5 * scale) / 2;

    for (i, digit) in digits.iter().enumerate() {
        let jitter = rand::random_range(0..=scale);
        for (row, bits) in GLYPHS[*digit].iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = left + (i * 4 + col) * scale + dx;
                        let y = (top + row * scale + dy + jitter).min(MAP_SIZE - 1);
                        if x < MAP_SIZE {
                            image[y * MAP_SIZE + x] = FOREGROUND;
                        }
                    }
                }
            }
        }
    }
    Bytes::from(image)
}

/// Fire-and-forget sink for attack start and end events.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &AttackEvent);
}

pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, event: &AttackEvent) {
        match event {
            AttackEvent::Detected { started_at, metrics } => {
                tracing::warn!(
                    "[notify] attack detected at {} joins/s={} verifying={} queued={}",
                    started_at.to_rfc3339(),
                    metrics.joins_per_second,
                    metrics.verifying,
                    metrics.queued
                );
            }
            AttackEvent::Mitigated {
                statistics,
                ended_at,
                duration,
                successful,
                failed,
                blacklisted,
            } => {
                tracing::info!(
                    "[notify] attack from {} to {} ({}s) peak joins/s={} peak cps={} peak verifying={} peak queued={} verified={} failed={} blacklisted={}",
                    statistics.started_at.to_rfc3339(),
                    ended_at.to_rfc3339(),
                    duration.as_secs(),
                    statistics.peak_joins_per_second,
                    statistics.peak_connections_per_second,
                    statistics.peak_verifying,
                    statistics.peak_queued,
                    successful,
                    failed,
                    blacklisted
                );
            }
        }
    }
}

/// Pre-encoded registry NBT for the versions that need it.
pub trait RegistryProvider: Send + Sync {
    /// Bodies of the configuration-phase RegistryData packets (1.20.2+).
    fn registry_data(&self, version: ProtocolVersion) -> Vec<Bytes>;
    /// Registry codec written into JoinGame (1.16 to 1.20.1).
    fn dimension_codec(&self, version: ProtocolVersion) -> Bytes;
    /// Dimension type element written into JoinGame (1.16.2 to 1.18.2).
    fn dimension_element(&self, version: ProtocolVersion) -> Bytes;
}

pub struct EmptyRegistry;

impl RegistryProvider for EmptyRegistry {
    fn registry_data(&self, _version: ProtocolVersion) -> Vec<Bytes> {
        Vec::new()
    }

    fn dimension_codec(&self, _version: ProtocolVersion) -> Bytes {
        Bytes::new()
    }

    fn dimension_element(&self, _version: ProtocolVersion) -> Bytes {
        Bytes::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryPayload {
    pub registry_data: Vec<Bytes>,
    pub dimension_codec: Bytes,
    pub dimension_element: Bytes,
}

/// Payloads keyed by the first protocol version they apply to.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    steps: Vec<(ProtocolVersion, RegistryPayload)>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: ProtocolVersion, payload: RegistryPayload) -> Self {
        self.steps.push((from, payload));
        self.steps.sort_by_key(|(from, _)| *from);
        self
    }

    /// Loads `<dir>/<protocol id>/` subdirectories. Each may hold
    /// `registry_data_<n>.bin`, `dimension_codec.nbt` and
    /// `dimension_element.nbt`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read registry dir: {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.parse::<i32>().ok()) else {
                continue;
            };
            let version = ProtocolVersion::from_id(id);
            if version.is_unknown() {
                tracing::warn!("[registry] skipping unknown protocol dir {}", id);
                continue;
            }
            let path = entry.path();
            let read = |file: &str| -> Result<Bytes> {
                let file = path.join(file);
                if !file.exists() {
                    return Ok(Bytes::new());
                }
                let data = fs::read(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                Ok(Bytes::from(data))
            };
            let mut registry_data = Vec::new();
            for n in 0.. {
                let part = read(&format!("registry_data_{}.bin", n))?;
                if part.is_empty() {
                    break;
                }
                registry_data.push(part);
            }
            let payload = RegistryPayload {
                registry_data,
                dimension_codec: read("dimension_codec.nbt")?,
                dimension_element: read("dimension_element.nbt")?,
            };
            tracing::debug!(
                "[registry] loaded {} ({} registry packets)",
                version,
                payload.registry_data.len()
            );
            registry = registry.with(version, payload);
        }
        Ok(registry)
    }

    fn payload(&self, version: ProtocolVersion) -> Option<&RegistryPayload> {
        self.steps
            .iter()
            .rev()
            .find(|(from, _)| *from <= version)
            .map(|(_, payload)| payload)
    }
}

impl RegistryProvider for StaticRegistry {
    fn registry_data(&self, version: ProtocolVersion) -> Vec<Bytes> {
        self.payload(version)
            .map(|p| p.registry_data.clone())
            .unwrap_or_default()
    }

    fn dimension_codec(&self, version: ProtocolVersion) -> Bytes {
        self.payload(version)
            .map(|p| p.dimension_codec.clone())
            .unwrap_or_default()
    }

    fn dimension_element(&self, version: ProtocolVersion) -> Bytes {
        self.payload(version)
            .map(|p| p.dimension_element.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_verified_players() {
        let players = InMemoryVerifiedPlayers::new();
        assert!(!players.contains("abc").unwrap());
        players.add("abc").unwrap();
        assert!(players.contains("abc").unwrap());
        players.remove("abc").unwrap();
        assert!(players.is_empty());
    }

    #[test]
    fn test_precomputed_round_robin() {
        let pool = vec![
            Captcha {
                image: Bytes::from_static(&[0]),
                answer: "one".into(),
            },
            Captcha {
                image: Bytes::from_static(&[1]),
                answer: "two".into(),
            },
        ];
        let captchas = PrecomputedCaptchas::new(pool);
        assert_eq!(captchas.generate(3).unwrap().answer, "one");
        assert_eq!(captchas.generate(3).unwrap().answer, "two");
        assert_eq!(captchas.generate(3).unwrap().answer, "one");
        assert!(captchas.generate(5).is_none());
    }

    #[test]
    fn test_empty_pool_has_nothing_ready() {
        assert!(PrecomputedCaptchas::default().generate(5).is_none());
    }

    #[test]
    fn test_digit_captchas() {
        let captchas = PrecomputedCaptchas::digits(4, 5);
        assert_eq!(captchas.len(), 4);
        let captcha = captchas.generate(5).unwrap();
        assert_eq!(captcha.image.len(), MAP_SIZE * MAP_SIZE);
        assert!(captcha.answer.chars().all(|c| c.is_ascii_digit()));
        assert!(captcha.image.contains(&FOREGROUND));
    }

    #[test]
    fn test_static_registry_steps() {
        let registry = StaticRegistry::new()
            .with(
                ProtocolVersion::V1_20_5,
                RegistryPayload {
                    registry_data: vec![Bytes::from_static(b"new")],
                    ..Default::default()
                },
            )
            .with(
                ProtocolVersion::V1_20_2,
                RegistryPayload {
                    registry_data: vec![Bytes::from_static(b"old")],
                    ..Default::default()
                },
            );
        assert!(registry.registry_data(ProtocolVersion::V1_20).is_empty());
        assert_eq!(registry.registry_data(ProtocolVersion::V1_20_3)[0], "old");
        assert_eq!(registry.registry_data(ProtocolVersion::V1_21_9)[0], "new");
    }
}
