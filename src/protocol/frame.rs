//! Length-prefixed framing
//!
//! Frames are `VarInt length || payload`. Serverbound length prefixes are
//! limited to 3 bytes (21 bits), the largest frame a vanilla client sends
//! uncompressed.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::codec::{var_int_len, write_var_int};
use super::ProtocolError;

/// Longest accepted length prefix in bytes.
pub const MAX_LENGTH_PREFIX: usize = 3;

/// Largest payload a 21-bit prefix can describe.
pub const MAX_FRAME_LEN: usize = (1 << 21) - 1;

enum Prefix {
    Incomplete,
    Complete { value: usize, len: usize },
}

fn peek_length_prefix(buf: &[u8]) -> Result<Prefix, ProtocolError> {
    let mut value = 0usize;
    for (i, byte) in buf.iter().take(MAX_LENGTH_PREFIX).enumerate() {
        value |= ((byte & 0x7F) as usize) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(Prefix::Complete { value, len: i + 1 });
        }
    }
    if buf.len() >= MAX_LENGTH_PREFIX {
        return Err(ProtocolError::FrameTooBig);
    }
    Ok(Prefix::Incomplete)
}

/// Pulls the next complete frame out of `buf`.
///
/// Zero bytes in front of a length prefix are padding (or empty frames) and
/// are discarded. If the buffer does not yet hold a whole frame, `Ok(None)` is
/// returned and the remaining bytes are left untouched for the next read.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
    loop {
        let zeros = buf.iter().take_while(|b| **b == 0).count();
        if zeros > 0 {
            buf.advance(zeros);
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let (length, prefix_len) = match peek_length_prefix(&buf[..])? {
            Prefix::Incomplete => return Ok(None),
            Prefix::Complete { value, len } => (value, len),
        };

        if length == 0 {
            buf.advance(prefix_len);
            continue;
        }
        if buf.len() < prefix_len + length {
            return Ok(None);
        }

        buf.advance(prefix_len);
        return Ok(Some(buf.split_to(length).freeze()));
    }
}

/// Appends `payload` to `out` as one frame.
pub fn encode_frame(out: &mut BytesMut, payload: &[u8]) {
    out.reserve(var_int_len(payload.len() as i32) + payload.len());
    write_var_int(out, payload.len() as i32);
    out.put_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> BytesMut {
        let mut out = BytesMut::new();
        encode_frame(&mut out, payload);
        out
    }

    #[test]
    fn test_single_frame() {
        let mut buf = framed(&[0x00, 0x2F, 0x01]);
        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[0x00, 0x2F, 0x01]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_two_frames_back_to_back() {
        let mut buf = framed(b"abc");
        buf.extend_from_slice(&framed(b"de"));
        assert_eq!(&decode_frame(&mut buf).unwrap().unwrap()[..], b"abc");
        assert_eq!(&decode_frame(&mut buf).unwrap().unwrap()[..], b"de");
        assert!(decode_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_partial_frame_leaves_buffer_untouched() {
        let full = framed(&[1u8; 300]);
        let mut buf = BytesMut::from(&full[..100]);
        assert!(decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 100);

        buf.extend_from_slice(&full[100..]);
        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame.len(), 300);
    }

    #[test]
    fn test_partial_length_prefix_waits() {
        let mut buf = BytesMut::from(&[0x80u8][..]);
        assert!(decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_leading_zero_padding_skipped() {
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        buf.extend_from_slice(&framed(b"xy"));
        assert_eq!(&decode_frame(&mut buf).unwrap().unwrap()[..], b"xy");
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let mut buf = BytesMut::from(&[0x80u8, 0x80, 0x80, 0x01][..]);
        assert!(matches!(decode_frame(&mut buf), Err(ProtocolError::FrameTooBig)));
    }

    #[test]
    fn test_largest_three_byte_frame_header() {
        let mut buf = BytesMut::from(&[0xFFu8, 0xFF, 0x7F][..]);
        // valid prefix, payload not there yet
        assert!(decode_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }
}
