use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::protocol::codec::{
    read_bool, read_byte_array, read_i64, read_string, read_uuid, read_var_int, write_bool,
    write_byte_array, write_string, write_uuid, write_var_int,
};
use crate::protocol::text::TextComponent;
use crate::protocol::{Phase, ProtocolError, ProtocolVersion};

pub const MAX_USERNAME_LEN: usize = 16;

const MAX_KEY_SIGNATURE_LEN: usize = 4096;
const MAX_KEY_LEN: usize = 512;

/// Chat signing key sent by 1.19 to 1.19.2 clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPublicKey {
    pub expires_at: i64,
    pub key: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub username: String,
    pub public_key: Option<PlayerPublicKey>,
    pub uuid: Option<Uuid>,
}

impl LoginStart {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            public_key: None,
            uuid: None,
        }
    }

    fn has_key_field(version: ProtocolVersion) -> bool {
        version >= ProtocolVersion::V1_19 && version < ProtocolVersion::V1_19_3
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        write_string(buf, &self.username);
        if Self::has_key_field(version) {
            write_bool(buf, self.public_key.is_some());
            if let Some(key) = &self.public_key {
                buf.put_i64(key.expires_at);
                write_byte_array(buf, &key.key);
                write_byte_array(buf, &key.signature);
            }
        }
        if version >= ProtocolVersion::V1_20_2 {
            write_uuid(buf, &self.uuid.unwrap_or_default());
        } else if version >= ProtocolVersion::V1_19_1 {
            write_bool(buf, self.uuid.is_some());
            if let Some(uuid) = &self.uuid {
                write_uuid(buf, uuid);
            }
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let username = read_string(buf, MAX_USERNAME_LEN)?;

        let mut public_key = None;
        if Self::has_key_field(version) && read_bool(buf)? {
            let expires_at = read_i64(buf)?;
            let key = read_byte_array(buf, MAX_KEY_LEN)?;
            let signature = read_byte_array(buf, MAX_KEY_SIGNATURE_LEN)?;
            if key.is_empty() || signature.is_empty() {
                return Err(ProtocolError::DecodeUnsupported("empty player public key"));
            }
            public_key = Some(PlayerPublicKey {
                expires_at,
                key,
                signature,
            });
        }

        let uuid = if version >= ProtocolVersion::V1_20_2 {
            Some(read_uuid(buf)?)
        } else if version >= ProtocolVersion::V1_19_1 && read_bool(buf)? {
            Some(read_uuid(buf)?)
        } else {
            None
        };

        Ok(Self {
            username,
            public_key,
            uuid,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl LoginSuccess {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_16 {
            write_uuid(buf, &self.uuid);
        } else if version >= ProtocolVersion::V1_7_6 {
            write_string(buf, &self.uuid.hyphenated().to_string());
        } else {
            write_string(buf, &self.uuid.simple().to_string());
        }
        write_string(buf, &self.username);
        if version >= ProtocolVersion::V1_19 {
            // no profile properties
            write_var_int(buf, 0);
        }
        if version == ProtocolVersion::V1_20_5 || version == ProtocolVersion::V1_21 {
            // strict error handling
            write_bool(buf, false);
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let uuid = if version >= ProtocolVersion::V1_16 {
            read_uuid(buf)?
        } else {
            let raw = read_string(buf, 36)?;
            Uuid::parse_str(&raw).map_err(|_| ProtocolError::DecodeUnsupported("malformed UUID string"))?
        };
        let username = read_string(buf, MAX_USERNAME_LEN)?;
        if version >= ProtocolVersion::V1_19 {
            let properties = read_var_int(buf)?;
            if properties != 0 {
                return Err(ProtocolError::DecodeUnsupported("login success properties"));
            }
        }
        if version == ProtocolVersion::V1_20_5 || version == ProtocolVersion::V1_21 {
            read_bool(buf)?;
        }
        Ok(Self { uuid, username })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: TextComponent,
}

impl Disconnect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: TextComponent::new(reason),
        }
    }

    /// Login-phase disconnects are JSON text in every version.
    fn text_version(version: ProtocolVersion, phase: Phase) -> ProtocolVersion {
        if phase == Phase::Login {
            ProtocolVersion::V1_20_2
        } else {
            version
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion, phase: Phase) {
        self.reason.write(buf, Self::text_version(version, phase));
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion, phase: Phase) -> Result<Self, ProtocolError> {
        Ok(Self {
            reason: TextComponent::read(buf, Self::text_version(version, phase))?,
        })
    }
}
