//! Botwall - Minecraft anti-bot verification
//!
//! Sits in front of a game server and makes new players prove they run a
//! real client: settings and brand, a forced fall onto a platform, a window
//! transaction, a boat and minecart ride and an optional map captcha.

// ============================================
// Wire protocol
// ============================================

/// Framing, field codecs, version table and packet registry
pub mod protocol;

// ============================================
// Verification
// ============================================

/// Per-client check state machine
pub mod verification;
/// Queue, rate limiter, blacklist and attack tracking
pub mod network;
/// Gatekeeping between login and verification
pub mod admission;
/// Counters and rolling rates
pub mod statistics;

// ============================================
// Host pipeline
// ============================================

/// Drives one client stream
pub mod connection;
/// Process owner and TCP front end
pub mod fallback;
/// Collaborator traits and default implementations
pub mod external;

/// Verifier configuration
pub mod config;
/// Disconnect message catalogue
pub mod messages;
