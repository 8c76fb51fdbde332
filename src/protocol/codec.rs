//! Primitive field codecs
//!
//! VarInt/VarLong plus the bounds-checked fixed-width readers every packet
//! layout is built from. `bytes::Buf` getters panic on underflow, so all reads
//! of client data go through the checked helpers below.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use super::ProtocolError;

/// Largest VarInt encoding in bytes.
pub const MAX_VAR_INT_LEN: usize = 5;

/// Largest VarLong encoding in bytes.
pub const MAX_VAR_LONG_LEN: usize = 10;

/// Reads a VarInt, consuming at most 5 bytes.
pub fn read_var_int<B: Buf>(buf: &mut B) -> Result<i32, ProtocolError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VAR_INT_LEN {
        if !buf.has_remaining() {
            return Err(ProtocolError::MalformedVarInt);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u32) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(ProtocolError::MalformedVarInt)
}

/// Reads a VarLong, consuming at most 10 bytes.
pub fn read_var_long<B: Buf>(buf: &mut B) -> Result<i64, ProtocolError> {
    let mut value: u64 = 0;
    for i in 0..MAX_VAR_LONG_LEN {
        if !buf.has_remaining() {
            return Err(ProtocolError::MalformedVarLong);
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value as i64);
        }
    }
    Err(ProtocolError::MalformedVarLong)
}

/// Number of bytes `value` occupies as a VarInt.
pub fn var_int_len(value: i32) -> usize {
    let value = value as u32;
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Writes the minimal VarInt encoding of `value`.
pub fn write_var_int<B: BufMut>(buf: &mut B, value: i32) {
    let value = value as u32;
    if value & (u32::MAX << 7) == 0 {
        buf.put_u8(value as u8);
    } else if value & (u32::MAX << 14) == 0 {
        buf.put_u16((((value & 0x7F) | 0x80) << 8 | (value >> 7)) as u16);
    } else {
        write_var_int_full(buf, value);
    }
}

fn write_var_int_full<B: BufMut>(buf: &mut B, mut value: u32) {
    while value & !0x7F != 0 {
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Writes the minimal VarLong encoding of `value`.
pub fn write_var_long<B: BufMut>(buf: &mut B, value: i64) {
    let mut value = value as u64;
    if value & (u64::MAX << 7) == 0 {
        buf.put_u8(value as u8);
        return;
    }
    if value & (u64::MAX << 14) == 0 {
        buf.put_u16((((value & 0x7F) | 0x80) << 8 | (value >> 7)) as u16);
        return;
    }
    while value & !0x7F != 0 {
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn ensure<B: Buf>(buf: &B, needed: usize) -> Result<(), ProtocolError> {
    let remaining = buf.remaining();
    if remaining < needed {
        return Err(ProtocolError::Truncated { needed, remaining });
    }
    Ok(())
}

pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8, ProtocolError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_i8<B: Buf>(buf: &mut B) -> Result<i8, ProtocolError> {
    ensure(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn read_bool<B: Buf>(buf: &mut B) -> Result<bool, ProtocolError> {
    Ok(read_u8(buf)? != 0)
}

pub fn read_i16<B: Buf>(buf: &mut B) -> Result<i16, ProtocolError> {
    ensure(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn read_u16<B: Buf>(buf: &mut B) -> Result<u16, ProtocolError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_i32<B: Buf>(buf: &mut B) -> Result<i32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn read_i64<B: Buf>(buf: &mut B) -> Result<i64, ProtocolError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn read_f32<B: Buf>(buf: &mut B) -> Result<f32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_f32())
}

pub fn read_f64<B: Buf>(buf: &mut B) -> Result<f64, ProtocolError> {
    ensure(buf, 8)?;
    Ok(buf.get_f64())
}

/// Reads a VarInt-prefixed UTF-8 string of at most `max_chars` characters.
pub fn read_string<B: Buf>(buf: &mut B, max_chars: usize) -> Result<String, ProtocolError> {
    let len = read_var_int(buf)?;
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len));
    }
    let len = len as usize;
    // A char is at most 3 bytes in the modified UTF-8 the client writes.
    let max_bytes = max_chars.saturating_mul(3);
    if len > max_bytes {
        return Err(ProtocolError::StringTooLong { len, max: max_bytes });
    }
    ensure(buf, len)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    let s = String::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
    let chars = s.chars().count();
    if chars > max_chars {
        return Err(ProtocolError::StringTooLong { len: chars, max: max_chars });
    }
    Ok(s)
}

pub fn write_string<B: BufMut>(buf: &mut B, s: &str) {
    write_var_int(buf, s.len() as i32);
    buf.put_slice(s.as_bytes());
}

/// Reads a VarInt-prefixed byte array of at most `max` bytes.
pub fn read_byte_array<B: Buf>(buf: &mut B, max: usize) -> Result<Vec<u8>, ProtocolError> {
    let len = read_var_int(buf)?;
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len));
    }
    let len = len as usize;
    if len > max {
        return Err(ProtocolError::ByteArrayTooLong { len, max });
    }
    read_bytes(buf, len)
}

pub fn write_byte_array<B: BufMut>(buf: &mut B, data: &[u8]) {
    write_var_int(buf, data.len() as i32);
    buf.put_slice(data);
}

/// Reads exactly `len` raw bytes.
pub fn read_bytes<B: Buf>(buf: &mut B, len: usize) -> Result<Vec<u8>, ProtocolError> {
    ensure(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Reads a UUID as two big-endian longs.
pub fn read_uuid<B: Buf>(buf: &mut B) -> Result<Uuid, ProtocolError> {
    ensure(buf, 16)?;
    Ok(Uuid::from_u128(buf.get_u128()))
}

pub fn write_uuid<B: BufMut>(buf: &mut B, uuid: &Uuid) {
    buf.put_u128(uuid.as_u128());
}

pub fn write_bool<B: BufMut>(buf: &mut B, value: bool) {
    buf.put_u8(value as u8);
}

/// Writes a VarInt-counted array of strings.
pub fn write_string_array<B: BufMut>(buf: &mut B, values: &[&str]) {
    write_var_int(buf, values.len() as i32);
    for value in values {
        write_string(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encode(value: i32) -> BytesMut {
        let mut buf = BytesMut::new();
        write_var_int(&mut buf, value);
        buf
    }

    #[test]
    fn test_var_int_known_encodings() {
        assert_eq!(&encode(0)[..], &[0x00]);
        assert_eq!(&encode(1)[..], &[0x01]);
        assert_eq!(&encode(127)[..], &[0x7F]);
        assert_eq!(&encode(128)[..], &[0x80, 0x01]);
        assert_eq!(&encode(255)[..], &[0xFF, 0x01]);
        assert_eq!(&encode(25565)[..], &[0xDD, 0xC7, 0x01]);
        assert_eq!(&encode(2097151)[..], &[0xFF, 0xFF, 0x7F]);
        assert_eq!(&encode(i32::MAX)[..], &[0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert_eq!(&encode(-1)[..], &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(&encode(i32::MIN)[..], &[0x80, 0x80, 0x80, 0x80, 0x08]);
    }

    #[test]
    fn test_var_int_round_trip() {
        for value in [0, 1, 2, 127, 128, 16383, 16384, 2097151, 2097152, i32::MAX, -1, i32::MIN, -758] {
            let mut buf = encode(value).freeze();
            assert_eq!(var_int_len(value), buf.len());
            assert_eq!(read_var_int(&mut buf).unwrap(), value);
            assert!(!buf.has_remaining());
        }
    }

    #[test]
    fn test_var_int_too_many_continuation_bytes() {
        let mut buf: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(read_var_int(&mut buf), Err(ProtocolError::MalformedVarInt)));
    }

    #[test]
    fn test_var_int_exhausted_buffer() {
        let mut buf: &[u8] = &[0x80, 0x80];
        assert!(matches!(read_var_int(&mut buf), Err(ProtocolError::MalformedVarInt)));
        let mut empty: &[u8] = &[];
        assert!(matches!(read_var_int(&mut empty), Err(ProtocolError::MalformedVarInt)));
    }

    #[test]
    fn test_var_long_round_trip() {
        for value in [0i64, 1, 127, 128, 16384, i32::MAX as i64, i64::MAX, -1, i64::MIN] {
            let mut buf = BytesMut::new();
            write_var_long(&mut buf, value);
            assert!(buf.len() <= MAX_VAR_LONG_LEN);
            let mut frozen = buf.freeze();
            assert_eq!(read_var_long(&mut frozen).unwrap(), value);
        }
    }

    #[test]
    fn test_string_limits() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "Alice");
        let mut frozen = buf.clone().freeze();
        assert_eq!(read_string(&mut frozen, 16).unwrap(), "Alice");

        let mut frozen = buf.freeze();
        assert!(matches!(
            read_string(&mut frozen, 4),
            Err(ProtocolError::StringTooLong { .. })
        ));
    }

    #[test]
    fn test_string_truncated() {
        // claims 10 bytes, carries 2
        let mut buf: &[u8] = &[0x0A, b'h', b'i'];
        assert!(matches!(
            read_string(&mut buf, 16),
            Err(ProtocolError::Truncated { needed: 10, remaining: 2 })
        ));
    }

    #[test]
    fn test_negative_string_length() {
        let mut buf = BytesMut::new();
        write_var_int(&mut buf, -5);
        let mut frozen = buf.freeze();
        assert!(matches!(read_string(&mut frozen, 16), Err(ProtocolError::NegativeLength(-5))));
    }

    #[test]
    fn test_fixed_width_underflow() {
        let mut buf: &[u8] = &[0x01, 0x02];
        assert!(read_i32(&mut buf).is_err());
        let mut buf: &[u8] = &[0x01, 0x02];
        assert_eq!(read_i16(&mut buf).unwrap(), 0x0102);
    }

    #[test]
    fn test_uuid_round_trip() {
        let id = Uuid::from_u128(0x0123_4567_89AB_CDEF_0011_2233_4455_6677);
        let mut buf = BytesMut::new();
        write_uuid(&mut buf, &id);
        let mut frozen = buf.freeze();
        assert_eq!(read_uuid(&mut frozen).unwrap(), id);
    }
}
