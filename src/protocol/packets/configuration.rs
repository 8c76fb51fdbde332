//! Packets exchanged during configuration. Keep-alive, client information
//! and plugin messages are also sent in the game phase with the same layout.

use bytes::{Buf, BufMut, Bytes};

use crate::protocol::codec::{
    read_bool, read_bytes, read_i32, read_i64, read_i8, read_string, read_u16, read_u8,
    read_var_int, write_bool, write_string, write_var_int,
};
use crate::protocol::{ProtocolError, ProtocolVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub id: i64,
}

impl KeepAlive {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_12_2 {
            buf.put_i64(self.id);
        } else if version >= ProtocolVersion::V1_8 {
            write_var_int(buf, self.id as i32);
        } else {
            buf.put_i32(self.id as i32);
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let id = if version >= ProtocolVersion::V1_12_2 {
            read_i64(buf)?
        } else if version >= ProtocolVersion::V1_8 {
            read_var_int(buf)? as i64
        } else {
            read_i32(buf)? as i64
        };
        Ok(Self { id })
    }
}

pub const MAX_LOCALE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInformation {
    pub locale: String,
    pub view_distance: i8,
    pub chat_visibility: i32,
    pub chat_colors: bool,
    /// Only sent by 1.7 clients.
    pub difficulty: i8,
    pub skin_parts: u8,
    pub main_hand: i32,
    pub chat_filtering: bool,
    pub client_listing: bool,
    pub particle_status: i32,
}

impl Default for ClientInformation {
    fn default() -> Self {
        Self {
            locale: String::from("en_us"),
            view_distance: 10,
            chat_visibility: 0,
            chat_colors: true,
            difficulty: 0,
            skin_parts: 0x7F,
            main_hand: 1,
            chat_filtering: false,
            client_listing: true,
            particle_status: 0,
        }
    }
}

impl ClientInformation {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        write_string(buf, &self.locale);
        buf.put_i8(self.view_distance);
        write_var_int(buf, self.chat_visibility);
        write_bool(buf, self.chat_colors);
        if version < ProtocolVersion::V1_8 {
            buf.put_i8(self.difficulty);
        }
        buf.put_u8(self.skin_parts);
        if version >= ProtocolVersion::V1_9 {
            write_var_int(buf, self.main_hand);
        }
        if version >= ProtocolVersion::V1_17 {
            write_bool(buf, self.chat_filtering);
        }
        if version >= ProtocolVersion::V1_18 {
            write_bool(buf, self.client_listing);
        }
        if version >= ProtocolVersion::V1_21_2 {
            write_var_int(buf, self.particle_status);
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let mut info = Self {
            locale: read_string(buf, MAX_LOCALE_LEN)?,
            view_distance: read_i8(buf)?,
            chat_visibility: read_var_int(buf)?,
            chat_colors: read_bool(buf)?,
            ..Self::default()
        };
        if version < ProtocolVersion::V1_8 {
            info.difficulty = read_i8(buf)?;
        }
        info.skin_parts = read_u8(buf)?;
        if version >= ProtocolVersion::V1_9 {
            info.main_hand = read_var_int(buf)?;
        }
        if version >= ProtocolVersion::V1_17 {
            info.chat_filtering = read_bool(buf)?;
        }
        if version >= ProtocolVersion::V1_18 {
            info.client_listing = read_bool(buf)?;
        }
        if version >= ProtocolVersion::V1_21_2 {
            info.particle_status = read_var_int(buf)?;
        }
        Ok(info)
    }
}

pub const MAX_CHANNEL_LEN: usize = 48;
pub const MAX_PLUGIN_DATA_LEN: usize = i16::MAX as usize;

pub const BRAND_CHANNEL: &str = "minecraft:brand";
pub const LEGACY_BRAND_CHANNEL: &str = "MC|Brand";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMessage {
    pub channel: String,
    pub data: Bytes,
}

impl PluginMessage {
    /// Brand message in the shape a vanilla client sends it.
    pub fn brand(brand: &str, version: ProtocolVersion) -> Self {
        let channel = if version >= ProtocolVersion::V1_13 {
            BRAND_CHANNEL
        } else {
            LEGACY_BRAND_CHANNEL
        };
        let mut data = bytes::BytesMut::new();
        if version >= ProtocolVersion::V1_8 {
            write_string(&mut data, brand);
        } else {
            data.put_slice(brand.as_bytes());
        }
        Self {
            channel: channel.to_string(),
            data: data.freeze(),
        }
    }

    pub fn is_brand(&self) -> bool {
        self.channel == BRAND_CHANNEL || self.channel == LEGACY_BRAND_CHANNEL
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        write_string(buf, &self.channel);
        if version < ProtocolVersion::V1_8 {
            buf.put_u16(self.data.len() as u16);
        }
        buf.put_slice(&self.data);
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let channel = read_string(buf, MAX_CHANNEL_LEN)?;
        let len = if version < ProtocolVersion::V1_8 {
            // Forge extends the short with one more byte when the top bit is set
            let low = read_u16(buf)? as usize;
            if low & 0x8000 != 0 {
                (low & 0x7FFF) | ((read_u8(buf)? as usize) << 15)
            } else {
                low
            }
        } else {
            buf.remaining()
        };
        if len > MAX_PLUGIN_DATA_LEN {
            return Err(ProtocolError::ByteArrayTooLong {
                len,
                max: MAX_PLUGIN_DATA_LEN,
            });
        }
        let data = Bytes::from(read_bytes(buf, len)?);
        Ok(Self { channel, data })
    }
}

/// Pre-encoded registry payload. The body is written verbatim after the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryData {
    pub body: Bytes,
}

impl RegistryData {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_keep_alive_widths() {
        let packet = KeepAlive { id: 42 };
        for (version, len) in [
            (ProtocolVersion::V1_7_2, 4),
            (ProtocolVersion::V1_8, 1),
            (ProtocolVersion::V1_12_1, 1),
            (ProtocolVersion::V1_12_2, 8),
            (ProtocolVersion::V1_21_9, 8),
        ] {
            let mut buf = BytesMut::new();
            packet.encode(&mut buf, version);
            assert_eq!(buf.len(), len, "{}", version);
            assert_eq!(KeepAlive::decode(&mut buf.freeze(), version).unwrap(), packet);
        }
    }

    #[test]
    fn test_brand_payload_keeps_length_prefix() {
        let brand = PluginMessage::brand("vanilla", ProtocolVersion::V1_18_2);
        assert!(brand.is_brand());
        assert_eq!(brand.data[0], 7);
        assert_eq!(&brand.data[1..], b"vanilla");

        let legacy = PluginMessage::brand("vanilla", ProtocolVersion::V1_7_6);
        assert_eq!(legacy.channel, LEGACY_BRAND_CHANNEL);
        assert_eq!(&legacy.data[..], b"vanilla");
    }

    #[test]
    fn test_plugin_message_legacy_length() {
        let message = PluginMessage::brand("vanilla", ProtocolVersion::V1_7_2);
        let mut buf = BytesMut::new();
        message.encode(&mut buf, ProtocolVersion::V1_7_2);
        let mut frozen = buf.freeze();
        assert_eq!(PluginMessage::decode(&mut frozen, ProtocolVersion::V1_7_2).unwrap(), message);
        assert!(!frozen.has_remaining());
    }

    #[test]
    fn test_client_information_fields_by_version() {
        let info = ClientInformation::default();
        let mut old = BytesMut::new();
        info.encode(&mut old, ProtocolVersion::V1_8);
        let mut new = BytesMut::new();
        info.encode(&mut new, ProtocolVersion::V1_21_2);
        // main hand, filtering, listing and particle status
        assert_eq!(new.len() - old.len(), 4);
    }
}
