use bytes::{Buf, BufMut};

use crate::protocol::codec::{read_string, read_u16, read_var_int, write_string, write_var_int};
use crate::protocol::ProtocolError;

/// Hostname limit: 255 for the name itself plus room for the FML and
/// BungeeCord style suffixes clients append.
pub const MAX_HOSTNAME_LEN: usize = 255 + 5 + 1;

pub const INTENT_STATUS: i32 = 1;
pub const INTENT_LOGIN: i32 = 2;
pub const INTENT_TRANSFER: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub hostname: String,
    pub port: u16,
    pub intent: i32,
}

impl Handshake {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        write_var_int(buf, self.protocol_version);
        write_string(buf, &self.hostname);
        buf.put_u16(self.port);
        write_var_int(buf, self.intent);
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol_version: read_var_int(buf)?,
            hostname: read_string(buf, MAX_HOSTNAME_LEN)?,
            port: read_u16(buf)?,
            intent: read_var_int(buf)?,
        })
    }

    /// Login and transfer intents both lead into the login phase.
    pub fn wants_login(&self) -> bool {
        self.intent == INTENT_LOGIN || self.intent == INTENT_TRANSFER
    }
}
