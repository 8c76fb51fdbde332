//! Wire protocol
//!
//! Framing, primitive field codecs, the protocol version table and the
//! per-phase packet registry. Everything in here is a pure function of the
//! bytes and the negotiated [`ProtocolVersion`]; no I/O happens in this module.

pub mod codec;
pub mod frame;
pub mod nbt;
pub mod packets;
pub mod registry;
pub mod text;
pub mod types;
pub mod version;

pub use registry::{Direction, Phase};
pub use version::ProtocolVersion;

/// Errors raised while decoding attacker-controlled bytes.
///
/// Every variant is fatal to the connection that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed VarInt")]
    MalformedVarInt,

    #[error("malformed VarLong")]
    MalformedVarLong,

    #[error("frame length prefix exceeds 21 bits")]
    FrameTooBig,

    #[error("negative length: {0}")]
    NegativeLength(i32),

    #[error("truncated field: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("string too long: {len} (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("byte array too long: {len} (max {max})")]
    ByteArrayTooLong { len: usize, max: usize },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("{remaining} trailing bytes after packet 0x{id:02X}")]
    TrailingBytes { id: i32, remaining: usize },

    #[error("{0} cannot be decoded")]
    DecodeUnsupported(&'static str),

    #[error("{packet} is not mapped for {version} in phase {phase:?}")]
    NotMapped {
        packet: &'static str,
        version: ProtocolVersion,
        phase: Phase,
    },
}
