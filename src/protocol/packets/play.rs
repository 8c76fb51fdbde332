//! Serverbound game packets.

use bytes::{Buf, BufMut};

use crate::protocol::codec::{
    read_bool, read_byte_array, read_bytes, read_f32, read_f64, read_i16, read_i32, read_i64,
    read_i8, read_string, read_u8, read_uuid, read_var_int, write_bool, write_string,
    write_var_int,
};
use crate::protocol::{ProtocolError, ProtocolVersion};

/// Window-confirmation before 1.17, ping/pong after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub window_id: i8,
    pub id: i32,
    pub accepted: bool,
}

impl Transaction {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_17 {
            buf.put_i32(self.id);
        } else {
            buf.put_i8(self.window_id);
            buf.put_i16(self.id as i16);
            write_bool(buf, self.accepted);
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        if version >= ProtocolVersion::V1_17 {
            return Ok(Self {
                window_id: 0,
                id: read_i32(buf)?,
                accepted: true,
            });
        }
        Ok(Self {
            window_id: read_i8(buf)?,
            id: read_i16(buf)? as i32,
            accepted: read_bool(buf)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmTeleport {
    pub teleport_id: i32,
}

impl ConfirmTeleport {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        write_var_int(buf, self.teleport_id);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self {
            teleport_id: read_var_int(buf)?,
        })
    }
}

const FLAG_ON_GROUND: u8 = 0x01;
const FLAG_HORIZONTAL_COLLISION: u8 = 0x02;

/// Ground state trailing every movement packet. From 1.21.2 it is a flag
/// byte that also carries horizontal collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementFlags {
    pub on_ground: bool,
    pub horizontal_collision: bool,
}

impl MovementFlags {
    pub fn on_ground(on_ground: bool) -> Self {
        Self {
            on_ground,
            horizontal_collision: false,
        }
    }

    fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_21_2 {
            let mut flags = 0;
            if self.on_ground {
                flags |= FLAG_ON_GROUND;
            }
            if self.horizontal_collision {
                flags |= FLAG_HORIZONTAL_COLLISION;
            }
            buf.put_u8(flags);
        } else {
            write_bool(buf, self.on_ground);
        }
    }

    fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        if version >= ProtocolVersion::V1_21_2 {
            let flags = read_u8(buf)?;
            return Ok(Self {
                on_ground: flags & FLAG_ON_GROUND != 0,
                horizontal_collision: flags & FLAG_HORIZONTAL_COLLISION != 0,
            });
        }
        Ok(Self::on_ground(read_bool(buf)?))
    }
}

/// Eye height 1.7 clients send as "stance" after the feet Y.
const LEGACY_EYE_HEIGHT: f64 = 1.62;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub flags: MovementFlags,
}

impl SetPlayerPosition {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        if version < ProtocolVersion::V1_8 {
            buf.put_f64(self.y + LEGACY_EYE_HEIGHT);
        }
        buf.put_f64(self.z);
        self.flags.encode(buf, version);
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let x = read_f64(buf)?;
        let y = read_f64(buf)?;
        if version < ProtocolVersion::V1_8 {
            read_f64(buf)?;
        }
        let z = read_f64(buf)?;
        Ok(Self {
            x,
            y,
            z,
            flags: MovementFlags::decode(buf, version)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPlayerPositionRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub flags: MovementFlags,
}

impl SetPlayerPositionRotation {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        if version < ProtocolVersion::V1_8 {
            buf.put_f64(self.y + LEGACY_EYE_HEIGHT);
        }
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        self.flags.encode(buf, version);
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let x = read_f64(buf)?;
        let y = read_f64(buf)?;
        if version < ProtocolVersion::V1_8 {
            read_f64(buf)?;
        }
        Ok(Self {
            x,
            y,
            z: read_f64(buf)?,
            yaw: read_f32(buf)?,
            pitch: read_f32(buf)?,
            flags: MovementFlags::decode(buf, version)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetPlayerRotation {
    pub yaw: f32,
    pub pitch: f32,
    pub flags: MovementFlags,
}

impl SetPlayerRotation {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        self.flags.encode(buf, version);
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        Ok(Self {
            yaw: read_f32(buf)?,
            pitch: read_f32(buf)?,
            flags: MovementFlags::decode(buf, version)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPlayerOnGround {
    pub flags: MovementFlags,
}

impl SetPlayerOnGround {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        self.flags.encode(buf, version);
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        Ok(Self {
            flags: MovementFlags::decode(buf, version)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleMove {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl VehicleMove {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: read_f64(buf)?,
            y: read_f64(buf)?,
            z: read_f64(buf)?,
            yaw: read_f32(buf)?,
            pitch: read_f32(buf)?,
        })
    }
}

/// Steering input. From 1.21.2 only the key bitmask is sent and the
/// movement impulses read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerInput {
    pub sideways: f32,
    pub forward: f32,
    pub jump: bool,
    pub sneak: bool,
}

impl PlayerInput {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_21_2 {
            let mut mask = 0u8;
            if self.jump {
                mask |= 0x10;
            }
            if self.sneak {
                mask |= 0x20;
            }
            buf.put_u8(mask);
            return;
        }
        buf.put_f32(self.sideways);
        buf.put_f32(self.forward);
        if version < ProtocolVersion::V1_8 {
            write_bool(buf, self.jump);
            write_bool(buf, self.sneak);
        } else {
            buf.put_u8(self.jump as u8 | (self.sneak as u8) << 1);
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        if version >= ProtocolVersion::V1_21_2 {
            let mask = read_u8(buf)?;
            return Ok(Self {
                jump: mask & 0x10 != 0,
                sneak: mask & 0x20 != 0,
                ..Self::default()
            });
        }
        let sideways = read_f32(buf)?;
        let forward = read_f32(buf)?;
        let (jump, sneak) = if version < ProtocolVersion::V1_8 {
            (read_bool(buf)?, read_bool(buf)?)
        } else {
            let flags = read_u8(buf)?;
            (flags & 0x01 != 0, flags & 0x02 != 0)
        };
        Ok(Self {
            sideways,
            forward,
            jump,
            sneak,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaddleBoat {
    pub left: bool,
    pub right: bool,
}

impl PaddleBoat {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        write_bool(buf, self.left);
        write_bool(buf, self.right);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self {
            left: read_bool(buf)?,
            right: read_bool(buf)?,
        })
    }
}

pub const MAX_CHAT_LEN: usize = 256;

const MAX_LAST_SEEN: i32 = 5;
const SIGNATURE_LEN: usize = 256;
const MAX_LEGACY_SIGNATURE_LEN: usize = 256;
const LAST_SEEN_BITSET_LEN: usize = 3;

/// Chat message. Signing data is validated for shape and then dropped; the
/// encoder always writes an unsigned message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub message: String,
    pub timestamp: i64,
    pub salt: i64,
}

impl Chat {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: 0,
            salt: 0,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        write_string(buf, &self.message);
        if version >= ProtocolVersion::V1_19_3 {
            buf.put_i64(self.timestamp);
            buf.put_i64(self.salt);
            write_bool(buf, false);
            write_var_int(buf, 0);
            buf.put_slice(&[0; LAST_SEEN_BITSET_LEN]);
            if version >= ProtocolVersion::V1_21_5 {
                buf.put_u8(0);
            }
        } else if version >= ProtocolVersion::V1_19 {
            buf.put_i64(self.timestamp);
            buf.put_i64(self.salt);
            write_var_int(buf, 0);
            write_bool(buf, false);
            if version >= ProtocolVersion::V1_19_1 {
                write_var_int(buf, 0);
                write_bool(buf, false);
            }
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let message = read_string(buf, MAX_CHAT_LEN)?;
        let mut chat = Self::new(message);
        if version >= ProtocolVersion::V1_19_3 {
            chat.timestamp = read_i64(buf)?;
            chat.salt = read_i64(buf)?;
            if read_bool(buf)? {
                read_bytes(buf, SIGNATURE_LEN)?;
            }
            read_var_int(buf)?;
            read_bytes(buf, LAST_SEEN_BITSET_LEN)?;
            if version >= ProtocolVersion::V1_21_5 {
                read_u8(buf)?;
            }
        } else if version >= ProtocolVersion::V1_19 {
            chat.timestamp = read_i64(buf)?;
            chat.salt = read_i64(buf)?;
            read_byte_array(buf, MAX_LEGACY_SIGNATURE_LEN)?;
            read_bool(buf)?;
            if version >= ProtocolVersion::V1_19_1 {
                let seen = read_var_int(buf)?;
                if !(0..=MAX_LAST_SEEN).contains(&seen) {
                    return Err(ProtocolError::DecodeUnsupported("last seen message count"));
                }
                for _ in 0..seen {
                    read_uuid(buf)?;
                    read_byte_array(buf, MAX_LEGACY_SIGNATURE_LEN)?;
                }
                if read_bool(buf)? {
                    read_uuid(buf)?;
                    read_byte_array(buf, MAX_LEGACY_SIGNATURE_LEN)?;
                }
            }
        }
        Ok(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_transaction_layouts() {
        let t = Transaction {
            window_id: 0,
            id: -1234,
            accepted: true,
        };
        let mut old = BytesMut::new();
        t.encode(&mut old, ProtocolVersion::V1_16_4);
        assert_eq!(old.len(), 4);
        let mut new = BytesMut::new();
        t.encode(&mut new, ProtocolVersion::V1_17);
        assert_eq!(new.len(), 4);
        assert_eq!(Transaction::decode(&mut old.freeze(), ProtocolVersion::V1_16_4).unwrap(), t);
        assert_eq!(Transaction::decode(&mut new.freeze(), ProtocolVersion::V1_17).unwrap(), t);
    }

    #[test]
    fn test_legacy_position_has_stance() {
        let p = SetPlayerPosition {
            x: 8.0,
            y: 70.0,
            z: 8.0,
            flags: MovementFlags::on_ground(false),
        };
        let mut buf = BytesMut::new();
        p.encode(&mut buf, ProtocolVersion::V1_7_6);
        assert_eq!(buf.len(), 8 * 4 + 1);
        assert_eq!(SetPlayerPosition::decode(&mut buf.freeze(), ProtocolVersion::V1_7_6).unwrap(), p);
    }

    #[test]
    fn test_movement_flag_byte() {
        let flags = MovementFlags {
            on_ground: true,
            horizontal_collision: true,
        };
        let mut buf = BytesMut::new();
        flags.encode(&mut buf, ProtocolVersion::V1_21_2);
        assert_eq!(&buf[..], &[0x03]);
        let decoded = MovementFlags::decode(&mut buf.freeze(), ProtocolVersion::V1_21_2).unwrap();
        assert_eq!(decoded, flags);
    }

    #[test]
    fn test_player_input_mask() {
        let input = PlayerInput {
            jump: true,
            ..PlayerInput::default()
        };
        let mut buf = BytesMut::new();
        input.encode(&mut buf, ProtocolVersion::V1_21_4);
        assert_eq!(&buf[..], &[0x10]);
    }

    #[test]
    fn test_signed_chat_tail_is_consumed() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "abcd");
        buf.put_i64(1);
        buf.put_i64(2);
        write_bool(&mut buf, true);
        buf.put_slice(&[7u8; SIGNATURE_LEN]);
        write_var_int(&mut buf, 3);
        buf.put_slice(&[0, 0, 0]);
        let mut frozen = buf.freeze();
        let chat = Chat::decode(&mut frozen, ProtocolVersion::V1_20).unwrap();
        assert_eq!(chat.message, "abcd");
        assert!(!frozen.has_remaining());
    }
}
