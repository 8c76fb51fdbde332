//! Chat text components
//!
//! JSON text before 1.20.3, network NBT from 1.20.3 on. The verifier only
//! ever sends plain text, so a component is a single `text` node.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use super::codec::{read_string, read_u16, read_u8, write_string};
use super::nbt::{self, Tag};
use super::{ProtocolError, ProtocolVersion};

/// Longest JSON text accepted when reading a component back.
const MAX_JSON_TEXT: usize = 262_144;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextComponent {
    pub text: String,
}

impl TextComponent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"text\":\"\"}"))
    }

    /// Writes the component in the form `version` expects.
    pub fn write<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_20_3 {
            nbt::write_root(buf, &Tag::String(self.text.clone()), version);
        } else {
            write_string(buf, &self.to_json());
        }
    }

    pub fn read<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        if version >= ProtocolVersion::V1_20_3 {
            let tag = read_u8(buf)?;
            if tag != 8 {
                return Err(ProtocolError::DecodeUnsupported("non-string text component"));
            }
            let len = read_u16(buf)? as usize;
            let raw = super::codec::read_bytes(buf, len)?;
            let text = String::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
            return Ok(Self { text });
        }
        let json = read_string(buf, MAX_JSON_TEXT)?;
        match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(serde_json::Value::String(text)) => Ok(Self { text }),
            Ok(value) => Ok(Self {
                text: value
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
            }),
            Err(_) => Err(ProtocolError::DecodeUnsupported("malformed JSON text component")),
        }
    }
}
