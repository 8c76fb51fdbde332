//! Login success, configuration and the pre-join keep-alive.

use crate::protocol::packets::{
    ClientInformation, Clientbound, LoginSuccess, PluginMessage, RegistryData, Serverbound,
};
use crate::protocol::{Phase, ProtocolVersion};

use super::{ConnectionPhase, Result, SessionState, Step};

/// Client settings and brand. Pre-1.20.2 clients send them while falling,
/// so the gravity stage forwards them here as well.
#[derive(Debug, Default)]
pub(crate) struct ClientDetails {
    client_information: bool,
    brand: bool,
}

impl ClientDetails {
    pub fn on_client_information(
        &mut self,
        state: &SessionState,
        info: &ClientInformation,
    ) -> Result<()> {
        ensure_check!(!self.client_information, "sent duplicate client information");
        if !state.profile.bedrock {
            ensure_check!(info.view_distance >= 2, "view distance: {}", info.view_distance);
        }
        self.client_information = true;
        Ok(())
    }

    pub fn on_plugin_message(&mut self, state: &SessionState, message: &PluginMessage) -> Result<()> {
        if !message.is_brand() {
            return Ok(());
        }
        let brand = &state.ctx.config.brand;
        if brand.enabled {
            ensure_check!(!self.brand, "sent duplicate client brand");
            let data = &message.data;
            ensure_check!(data.len() > 1, "client brand is too short");
            ensure_check!(
                data.len() < brand.max_length,
                "client brand contains too much data: {}",
                data.len()
            );
            let text = String::from_utf8_lossy(data);
            // from 1.8 the payload starts with its VarInt length
            let text = match text.char_indices().nth(1) {
                Some((start, _)) if state.version() >= ProtocolVersion::V1_8 => &text[start..],
                _ => &text[..],
            };
            ensure_check!(
                state.ctx.patterns.brand.is_match(text),
                "client brand does not match pattern: {}",
                text
            );
        }
        self.brand = true;
        Ok(())
    }

    pub fn require_complete(&self) -> Result<()> {
        ensure_check!(self.client_information, "didn't send client settings");
        ensure_check!(self.brand, "didn't send client brand");
        Ok(())
    }

    fn missing_phase(&self) -> Option<ConnectionPhase> {
        if !self.client_information {
            Some(ConnectionPhase::ClientSettings)
        } else if !self.brand {
            Some(ConnectionPhase::PluginMessage)
        } else {
            None
        }
    }
}

pub(crate) struct PreJoin {
    acknowledged: bool,
    keep_alive_answered: bool,
}

impl PreJoin {
    pub fn enter(state: &mut SessionState) -> Self {
        let success = LoginSuccess {
            uuid: state.profile.offline_uuid(),
            username: state.profile.username.clone(),
        };
        state.send(Clientbound::LoginSuccess(success));
        let version = state.version();
        if !version.has_configuration_phase() {
            state.switch_phase(Phase::Game);
            if version >= ProtocolVersion::V1_8 {
                state.send_keep_alive();
            }
        }
        Self {
            acknowledged: false,
            keep_alive_answered: false,
        }
    }

    pub fn phase(&self, state: &SessionState) -> ConnectionPhase {
        if !state.version().has_configuration_phase() {
            return ConnectionPhase::PreJoinKeepAlive;
        }
        if !self.acknowledged {
            ConnectionPhase::LoginAck
        } else if !self.keep_alive_answered {
            ConnectionPhase::PreJoinKeepAlive
        } else {
            state
                .details
                .missing_phase()
                .unwrap_or(ConnectionPhase::Configure)
        }
    }

    pub fn handle(&mut self, state: &mut SessionState, packet: &Serverbound) -> Result<Step> {
        match packet {
            Serverbound::KeepAlive(_) => {
                // the id was matched before the packet got here
                self.keep_alive_answered = true;
                if !state.version().has_configuration_phase() {
                    return Ok(Step::Done);
                }
                let registry = state.ctx.registry.registry_data(state.version());
                for body in registry {
                    state.send(Clientbound::RegistryData(RegistryData { body }));
                }
                state.send(Clientbound::FinishConfiguration);
            }
            Serverbound::LoginAcknowledged => {
                ensure_check!(!self.acknowledged, "sent duplicate login ack");
                self.acknowledged = true;
                state.switch_phase(Phase::Configuration);
                state.send_keep_alive();
            }
            Serverbound::FinishConfiguration => {
                ensure_check!(self.keep_alive_answered, "finished configuration too early");
                state.switch_phase(Phase::Game);
                if !state.profile.bedrock {
                    state.details.require_complete()?;
                }
                return Ok(Step::Done);
            }
            Serverbound::ClientInformation(info) => {
                let mut details = std::mem::take(&mut state.details);
                let result = details.on_client_information(state, info);
                state.details = details;
                result?;
            }
            Serverbound::PluginMessage(message) => {
                let mut details = std::mem::take(&mut state.details);
                let result = details.on_plugin_message(state, message);
                state.details = details;
                result?;
            }
            _ => {}
        }
        Ok(Step::Stay)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{context, keep_alive_id, packets, session};
    use super::super::{ConnectionPhase, Outbound};
    use crate::protocol::packets::{
        ClientInformation, Clientbound, KeepAlive, PluginMessage, Serverbound,
    };
    use crate::protocol::{Phase, ProtocolVersion};
    use bytes::Bytes;
    use std::time::Instant;

    #[test]
    fn test_modern_login_walks_configuration() {
        let ctx = context("{}");
        let version = ProtocolVersion::V1_20_2;
        let mut session = session(&ctx, version);
        let now = Instant::now();
        session.start(now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::LoginAck);
        let sent = session.drain_outbound();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Outbound::Packet(Clientbound::LoginSuccess(_))));

        session.handle(Serverbound::LoginAcknowledged, now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::PreJoinKeepAlive);
        let sent = session.drain_outbound();
        assert_eq!(sent[0], Outbound::Phase(Phase::Configuration));
        let id = match &sent[1] {
            Outbound::Packet(Clientbound::KeepAlive(keep_alive)) => keep_alive.id,
            other => panic!("unexpected {:?}", other),
        };

        session.handle(Serverbound::KeepAlive(KeepAlive { id }), now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::ClientSettings);
        assert!(packets(&mut session).contains(&Clientbound::FinishConfiguration));

        session
            .handle(Serverbound::ClientInformation(ClientInformation::default()), now)
            .unwrap();
        assert_eq!(session.phase(), ConnectionPhase::PluginMessage);
        session
            .handle(Serverbound::PluginMessage(PluginMessage::brand("vanilla", version)), now)
            .unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Configure);

        session.handle(Serverbound::FinishConfiguration, now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Teleport);
        let sent = session.drain_outbound();
        assert_eq!(sent[0], Outbound::Phase(Phase::Game));
        assert!(matches!(sent[1], Outbound::Packet(Clientbound::JoinGame(_))));
    }

    #[test]
    fn test_finish_configuration_requires_brand() {
        let ctx = context("{}");
        let mut session = session(&ctx, ProtocolVersion::V1_21_4);
        let now = Instant::now();
        session.start(now).unwrap();
        session.handle(Serverbound::LoginAcknowledged, now).unwrap();
        let id = keep_alive_id(&packets(&mut session));
        session.handle(Serverbound::KeepAlive(KeepAlive { id }), now).unwrap();
        session
            .handle(Serverbound::ClientInformation(ClientInformation::default()), now)
            .unwrap();
        let err = session.handle(Serverbound::FinishConfiguration, now).unwrap_err();
        assert_eq!(err.to_string(), "didn't send client brand");
    }

    #[test]
    fn test_duplicate_login_ack_fails() {
        let ctx = context("{}");
        let mut session = session(&ctx, ProtocolVersion::V1_20_2);
        let now = Instant::now();
        session.start(now).unwrap();
        session.handle(Serverbound::LoginAcknowledged, now).unwrap();
        assert!(session.handle(Serverbound::LoginAcknowledged, now).is_err());
    }

    #[test]
    fn test_low_view_distance_fails() {
        let ctx = context("{}");
        let mut session = session_in_world(&ctx);
        let err = session
            .handle(
                Serverbound::ClientInformation(ClientInformation {
                    view_distance: 1,
                    ..ClientInformation::default()
                }),
                Instant::now(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "view distance: 1");
    }

    #[test]
    fn test_brand_checks() {
        let ctx = context("brand:\n  max_length: 10\n");
        let version = ProtocolVersion::V1_18_2;

        let mut session = session_in_world(&ctx);
        let long = PluginMessage::brand("much-too-long-brand", version);
        assert!(session
            .handle(Serverbound::PluginMessage(long), Instant::now())
            .is_err());

        let mut session = session_in_world(&ctx);
        let control = PluginMessage {
            channel: "minecraft:brand".into(),
            data: Bytes::from_static(b"\x03a\x07b"),
        };
        assert!(session
            .handle(Serverbound::PluginMessage(control), Instant::now())
            .is_err());

        let mut session = session_in_world(&ctx);
        let other = PluginMessage {
            channel: "example:channel".into(),
            data: Bytes::from_static(b"\x00"),
        };
        session
            .handle(Serverbound::PluginMessage(other), Instant::now())
            .unwrap();
        let brand = PluginMessage::brand("vanilla", version);
        session
            .handle(Serverbound::PluginMessage(brand.clone()), Instant::now())
            .unwrap();
        let err = session
            .handle(Serverbound::PluginMessage(brand), Instant::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "sent duplicate client brand");
    }

    #[test]
    fn test_disabled_brand_check_allows_repeats() {
        let ctx = context("brand:\n  enabled: false\n");
        let mut session = session_in_world(&ctx);
        let brand = PluginMessage::brand("vanilla", ProtocolVersion::V1_18_2);
        for _ in 0..2 {
            session
                .handle(Serverbound::PluginMessage(brand.clone()), Instant::now())
                .unwrap();
        }
        assert_ne!(session.phase(), ConnectionPhase::Failed);
    }

    fn session_in_world(ctx: &std::sync::Arc<super::super::VerificationContext>) -> super::super::Session {
        let mut session = session(ctx, ProtocolVersion::V1_18_2);
        let now = Instant::now();
        session.start(now).unwrap();
        let id = keep_alive_id(&packets(&mut session));
        session.handle(Serverbound::KeepAlive(KeepAlive { id }), now).unwrap();
        session.drain_outbound();
        session
    }
}
