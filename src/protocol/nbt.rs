//! Minimal NBT writer
//!
//! Only what the verifier sends: heightmaps, map item data and text
//! components. Reading NBT is never needed since clients send none.

use bytes::BufMut;

use super::ProtocolVersion;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<Tag>),
    Compound(Vec<(String, Tag)>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn id(&self) -> u8 {
        match self {
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::LongArray(_) => 12,
        }
    }

    /// Convenience builder for compounds.
    pub fn compound<I, K>(entries: I) -> Tag
    where
        I: IntoIterator<Item = (K, Tag)>,
        K: Into<String>,
    {
        Tag::Compound(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn write_payload<B: BufMut>(&self, buf: &mut B) {
        match self {
            Tag::Byte(v) => buf.put_i8(*v),
            Tag::Short(v) => buf.put_i16(*v),
            Tag::Int(v) => buf.put_i32(*v),
            Tag::Long(v) => buf.put_i64(*v),
            Tag::Float(v) => buf.put_f32(*v),
            Tag::Double(v) => buf.put_f64(*v),
            Tag::String(s) => write_nbt_string(buf, s),
            Tag::List(items) => {
                buf.put_u8(items.first().map(Tag::id).unwrap_or(0));
                buf.put_i32(items.len() as i32);
                for item in items {
                    item.write_payload(buf);
                }
            }
            Tag::Compound(entries) => {
                for (name, tag) in entries {
                    buf.put_u8(tag.id());
                    write_nbt_string(buf, name);
                    tag.write_payload(buf);
                }
                buf.put_u8(0);
            }
            Tag::LongArray(values) => {
                buf.put_i32(values.len() as i32);
                for v in values {
                    buf.put_i64(*v);
                }
            }
        }
    }
}

fn write_nbt_string<B: BufMut>(buf: &mut B, s: &str) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(u16::MAX as usize);
    buf.put_u16(len as u16);
    buf.put_slice(&bytes[..len]);
}

/// Writes `tag` as a root tag the way `version` expects it on the wire.
///
/// From 1.20.2 on network NBT drops the root name.
pub fn write_root<B: BufMut>(buf: &mut B, tag: &Tag, version: ProtocolVersion) {
    buf.put_u8(tag.id());
    if version < ProtocolVersion::V1_20_2 {
        write_nbt_string(buf, "");
    }
    tag.write_payload(buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_named_root_before_1_20_2() {
        let mut buf = BytesMut::new();
        write_root(&mut buf, &Tag::compound([("a", Tag::Int(7))]), ProtocolVersion::V1_18_2);
        assert_eq!(
            &buf[..],
            &[10, 0, 0, 3, 0, 1, b'a', 0, 0, 0, 7, 0]
        );
    }

    #[test]
    fn test_nameless_root_from_1_20_2() {
        let mut buf = BytesMut::new();
        write_root(&mut buf, &Tag::String("hi".into()), ProtocolVersion::V1_20_3);
        assert_eq!(&buf[..], &[8, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_empty_list_uses_end_type() {
        let mut buf = BytesMut::new();
        Tag::List(vec![]).write_payload(&mut buf);
        assert_eq!(&buf[..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_long_array() {
        let mut buf = BytesMut::new();
        Tag::LongArray(vec![1, 2]).write_payload(&mut buf);
        assert_eq!(buf.len(), 4 + 16);
    }
}
