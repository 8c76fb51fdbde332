//! Typed packets, one enum per direction.
//!
//! Body layouts are pure functions of the protocol version. Packet ids are
//! resolved separately by [`super::registry`].

pub mod configuration;
pub mod handshake;
pub mod login;
pub mod play;
pub mod world;

use bytes::{Buf, BufMut};

use super::registry::{ClientboundKind, ServerboundKind};
use super::{Phase, ProtocolError, ProtocolVersion};

pub use configuration::{ClientInformation, KeepAlive, PluginMessage, RegistryData};
pub use handshake::Handshake;
pub use login::{Disconnect, LoginStart, LoginSuccess};
pub use play::{
    Chat, ConfirmTeleport, MovementFlags, PaddleBoat, PlayerInput, SetPlayerOnGround,
    SetPlayerPosition, SetPlayerPositionRotation, SetPlayerRotation, Transaction, VehicleMove,
};
pub use world::{
    BlockUpdate, ChunkData, GameEvent, JoinGame, MapData, PlayerAbilities, PlayerPositionRotation,
    RemoveEntities, SetContainerSlot, SetDefaultSpawnPosition, SetPassengers, SpawnEntity,
    SystemChat, UpdateSectionBlocks,
};

/// Packets a client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Serverbound {
    Handshake(Handshake),
    LoginStart(LoginStart),
    LoginAcknowledged,
    ClientInformation(ClientInformation),
    PluginMessage(PluginMessage),
    FinishConfiguration,
    KeepAlive(KeepAlive),
    Transaction(Transaction),
    ConfirmTeleport(ConfirmTeleport),
    SetPlayerPosition(SetPlayerPosition),
    SetPlayerPositionRotation(SetPlayerPositionRotation),
    SetPlayerRotation(SetPlayerRotation),
    SetPlayerOnGround(SetPlayerOnGround),
    VehicleMove(VehicleMove),
    PlayerInput(PlayerInput),
    PaddleBoat(PaddleBoat),
    Chat(Chat),
    ClientTickEnd,
}

impl Serverbound {
    pub fn kind(&self) -> ServerboundKind {
        match self {
            Serverbound::Handshake(_) => ServerboundKind::Handshake,
            Serverbound::LoginStart(_) => ServerboundKind::LoginStart,
            Serverbound::LoginAcknowledged => ServerboundKind::LoginAcknowledged,
            Serverbound::ClientInformation(_) => ServerboundKind::ClientInformation,
            Serverbound::PluginMessage(_) => ServerboundKind::PluginMessage,
            Serverbound::FinishConfiguration => ServerboundKind::FinishConfiguration,
            Serverbound::KeepAlive(_) => ServerboundKind::KeepAlive,
            Serverbound::Transaction(_) => ServerboundKind::Transaction,
            Serverbound::ConfirmTeleport(_) => ServerboundKind::ConfirmTeleport,
            Serverbound::SetPlayerPosition(_) => ServerboundKind::SetPlayerPosition,
            Serverbound::SetPlayerPositionRotation(_) => ServerboundKind::SetPlayerPositionRotation,
            Serverbound::SetPlayerRotation(_) => ServerboundKind::SetPlayerRotation,
            Serverbound::SetPlayerOnGround(_) => ServerboundKind::SetPlayerOnGround,
            Serverbound::VehicleMove(_) => ServerboundKind::VehicleMove,
            Serverbound::PlayerInput(_) => ServerboundKind::PlayerInput,
            Serverbound::PaddleBoat(_) => ServerboundKind::PaddleBoat,
            Serverbound::Chat(_) => ServerboundKind::Chat,
            Serverbound::ClientTickEnd => ServerboundKind::ClientTickEnd,
        }
    }

    /// Writes the packet body (no id).
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        match self {
            Serverbound::Handshake(p) => p.encode(buf),
            Serverbound::LoginStart(p) => p.encode(buf, version),
            Serverbound::LoginAcknowledged
            | Serverbound::FinishConfiguration
            | Serverbound::ClientTickEnd => {}
            Serverbound::ClientInformation(p) => p.encode(buf, version),
            Serverbound::PluginMessage(p) => p.encode(buf, version),
            Serverbound::KeepAlive(p) => p.encode(buf, version),
            Serverbound::Transaction(p) => p.encode(buf, version),
            Serverbound::ConfirmTeleport(p) => p.encode(buf),
            Serverbound::SetPlayerPosition(p) => p.encode(buf, version),
            Serverbound::SetPlayerPositionRotation(p) => p.encode(buf, version),
            Serverbound::SetPlayerRotation(p) => p.encode(buf, version),
            Serverbound::SetPlayerOnGround(p) => p.encode(buf, version),
            Serverbound::VehicleMove(p) => p.encode(buf),
            Serverbound::PlayerInput(p) => p.encode(buf, version),
            Serverbound::PaddleBoat(p) => p.encode(buf),
            Serverbound::Chat(p) => p.encode(buf, version),
        }
    }

    pub fn decode<B: Buf>(
        kind: ServerboundKind,
        buf: &mut B,
        version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        Ok(match kind {
            ServerboundKind::Handshake => Serverbound::Handshake(Handshake::decode(buf)?),
            ServerboundKind::LoginStart => Serverbound::LoginStart(LoginStart::decode(buf, version)?),
            ServerboundKind::LoginAcknowledged => Serverbound::LoginAcknowledged,
            ServerboundKind::ClientInformation => {
                Serverbound::ClientInformation(ClientInformation::decode(buf, version)?)
            }
            ServerboundKind::PluginMessage => {
                Serverbound::PluginMessage(PluginMessage::decode(buf, version)?)
            }
            ServerboundKind::FinishConfiguration => Serverbound::FinishConfiguration,
            ServerboundKind::KeepAlive => Serverbound::KeepAlive(KeepAlive::decode(buf, version)?),
            ServerboundKind::Transaction => {
                Serverbound::Transaction(Transaction::decode(buf, version)?)
            }
            ServerboundKind::ConfirmTeleport => {
                Serverbound::ConfirmTeleport(ConfirmTeleport::decode(buf)?)
            }
            ServerboundKind::SetPlayerPosition => {
                Serverbound::SetPlayerPosition(SetPlayerPosition::decode(buf, version)?)
            }
            ServerboundKind::SetPlayerPositionRotation => Serverbound::SetPlayerPositionRotation(
                SetPlayerPositionRotation::decode(buf, version)?,
            ),
            ServerboundKind::SetPlayerRotation => {
                Serverbound::SetPlayerRotation(SetPlayerRotation::decode(buf, version)?)
            }
            ServerboundKind::SetPlayerOnGround => {
                Serverbound::SetPlayerOnGround(SetPlayerOnGround::decode(buf, version)?)
            }
            ServerboundKind::VehicleMove => Serverbound::VehicleMove(VehicleMove::decode(buf)?),
            ServerboundKind::PlayerInput => {
                Serverbound::PlayerInput(PlayerInput::decode(buf, version)?)
            }
            ServerboundKind::PaddleBoat => Serverbound::PaddleBoat(PaddleBoat::decode(buf)?),
            ServerboundKind::Chat => Serverbound::Chat(Chat::decode(buf, version)?),
            ServerboundKind::ClientTickEnd => Serverbound::ClientTickEnd,
        })
    }
}

/// Packets the verifier sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    Disconnect(Disconnect),
    LoginSuccess(LoginSuccess),
    FinishConfiguration,
    KeepAlive(KeepAlive),
    RegistryData(RegistryData),
    JoinGame(Box<JoinGame>),
    PlayerPositionRotation(PlayerPositionRotation),
    PlayerAbilities(PlayerAbilities),
    ChunkData(ChunkData),
    RemoveEntities(RemoveEntities),
    SetPassengers(SetPassengers),
    SpawnEntity(SpawnEntity),
    UpdateSectionBlocks(UpdateSectionBlocks),
    Transaction(Transaction),
    SetDefaultSpawnPosition(SetDefaultSpawnPosition),
    MapData(MapData),
    SetContainerSlot(SetContainerSlot),
    SystemChat(SystemChat),
    GameEvent(GameEvent),
}

impl Clientbound {
    pub fn kind(&self) -> ClientboundKind {
        match self {
            Clientbound::Disconnect(_) => ClientboundKind::Disconnect,
            Clientbound::LoginSuccess(_) => ClientboundKind::LoginSuccess,
            Clientbound::FinishConfiguration => ClientboundKind::FinishConfiguration,
            Clientbound::KeepAlive(_) => ClientboundKind::KeepAlive,
            Clientbound::RegistryData(_) => ClientboundKind::RegistryData,
            Clientbound::JoinGame(_) => ClientboundKind::JoinGame,
            Clientbound::PlayerPositionRotation(_) => ClientboundKind::PlayerPositionRotation,
            Clientbound::PlayerAbilities(_) => ClientboundKind::PlayerAbilities,
            Clientbound::ChunkData(_) => ClientboundKind::ChunkData,
            Clientbound::RemoveEntities(_) => ClientboundKind::RemoveEntities,
            Clientbound::SetPassengers(_) => ClientboundKind::SetPassengers,
            Clientbound::SpawnEntity(_) => ClientboundKind::SpawnEntity,
            Clientbound::UpdateSectionBlocks(_) => ClientboundKind::UpdateSectionBlocks,
            Clientbound::Transaction(_) => ClientboundKind::Transaction,
            Clientbound::SetDefaultSpawnPosition(_) => ClientboundKind::SetDefaultSpawnPosition,
            Clientbound::MapData(_) => ClientboundKind::MapData,
            Clientbound::SetContainerSlot(_) => ClientboundKind::SetContainerSlot,
            Clientbound::SystemChat(_) => ClientboundKind::SystemChat,
            Clientbound::GameEvent(_) => ClientboundKind::GameEvent,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion, phase: Phase) {
        match self {
            Clientbound::Disconnect(p) => p.encode(buf, version, phase),
            Clientbound::LoginSuccess(p) => p.encode(buf, version),
            Clientbound::FinishConfiguration => {}
            Clientbound::KeepAlive(p) => p.encode(buf, version),
            Clientbound::RegistryData(p) => p.encode(buf),
            Clientbound::JoinGame(p) => p.encode(buf, version),
            Clientbound::PlayerPositionRotation(p) => p.encode(buf, version),
            Clientbound::PlayerAbilities(p) => p.encode(buf),
            Clientbound::ChunkData(p) => p.encode(buf, version),
            Clientbound::RemoveEntities(p) => p.encode(buf, version),
            Clientbound::SetPassengers(p) => p.encode(buf, version),
            Clientbound::SpawnEntity(p) => p.encode(buf, version),
            Clientbound::UpdateSectionBlocks(p) => p.encode(buf, version),
            Clientbound::Transaction(p) => p.encode(buf, version),
            Clientbound::SetDefaultSpawnPosition(p) => p.encode(buf, version),
            Clientbound::MapData(p) => p.encode(buf, version),
            Clientbound::SetContainerSlot(p) => p.encode(buf, version),
            Clientbound::SystemChat(p) => p.encode(buf, version),
            Clientbound::GameEvent(p) => p.encode(buf),
        }
    }

    /// Reads the packets a client simulator reacts to. World payloads are
    /// skipped with `Ok(None)`.
    pub fn decode<B: Buf>(
        kind: ClientboundKind,
        buf: &mut B,
        version: ProtocolVersion,
        phase: Phase,
    ) -> Result<Option<Self>, ProtocolError> {
        Ok(Some(match kind {
            ClientboundKind::Disconnect => Clientbound::Disconnect(Disconnect::decode(buf, version, phase)?),
            ClientboundKind::LoginSuccess => {
                Clientbound::LoginSuccess(LoginSuccess::decode(buf, version)?)
            }
            ClientboundKind::FinishConfiguration => Clientbound::FinishConfiguration,
            ClientboundKind::KeepAlive => Clientbound::KeepAlive(KeepAlive::decode(buf, version)?),
            ClientboundKind::Transaction => {
                Clientbound::Transaction(Transaction::decode(buf, version)?)
            }
            ClientboundKind::PlayerPositionRotation => {
                Clientbound::PlayerPositionRotation(PlayerPositionRotation::decode(buf, version)?)
            }
            ClientboundKind::UpdateSectionBlocks => {
                Clientbound::UpdateSectionBlocks(UpdateSectionBlocks::decode(buf, version)?)
            }
            _ => return Ok(None),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::registry::{decode_serverbound, encode_serverbound, serverbound_id};
    use uuid::Uuid;

    fn samples(version: ProtocolVersion) -> Vec<(Phase, Serverbound)> {
        let uuid = (version >= ProtocolVersion::V1_19_1).then(|| Uuid::from_u128(7));
        let flags = MovementFlags::on_ground(false);
        vec![
            (
                Phase::Handshake,
                Serverbound::Handshake(Handshake {
                    protocol_version: 758,
                    hostname: "play.example.net".into(),
                    port: 25565,
                    intent: handshake::INTENT_LOGIN,
                }),
            ),
            (
                Phase::Login,
                Serverbound::LoginStart(LoginStart {
                    username: "Alice".into(),
                    public_key: None,
                    uuid,
                }),
            ),
            (Phase::Login, Serverbound::LoginAcknowledged),
            (Phase::Configuration, Serverbound::FinishConfiguration),
            (Phase::Configuration, Serverbound::KeepAlive(KeepAlive { id: 99 })),
            (Phase::Game, Serverbound::KeepAlive(KeepAlive { id: 99 })),
            (Phase::Game, Serverbound::ClientInformation(ClientInformation::default())),
            (
                Phase::Game,
                Serverbound::Transaction(Transaction {
                    window_id: 0,
                    id: -5,
                    accepted: true,
                }),
            ),
            (Phase::Game, Serverbound::ConfirmTeleport(ConfirmTeleport { teleport_id: 3 })),
            (
                Phase::Game,
                Serverbound::SetPlayerPosition(SetPlayerPosition {
                    x: 8.0,
                    y: 301.25,
                    z: 8.0,
                    flags,
                }),
            ),
            (
                Phase::Game,
                Serverbound::SetPlayerPositionRotation(SetPlayerPositionRotation {
                    x: 8.0,
                    y: 301.25,
                    z: 8.0,
                    yaw: 90.0,
                    pitch: 0.0,
                    flags,
                }),
            ),
            (
                Phase::Game,
                Serverbound::SetPlayerRotation(SetPlayerRotation {
                    yaw: 1.0,
                    pitch: 2.0,
                    flags,
                }),
            ),
            (Phase::Game, Serverbound::SetPlayerOnGround(SetPlayerOnGround { flags })),
            (
                Phase::Game,
                Serverbound::VehicleMove(VehicleMove {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                    yaw: 4.0,
                    pitch: 5.0,
                }),
            ),
            (Phase::Game, Serverbound::PlayerInput(PlayerInput::default())),
            (Phase::Game, Serverbound::PaddleBoat(PaddleBoat { left: true, right: false })),
            (Phase::Game, Serverbound::Chat(Chat::new("abcde"))),
            (Phase::Game, Serverbound::ClientTickEnd),
        ]
    }

    #[test]
    fn test_serverbound_round_trip_every_version() {
        for version in ProtocolVersion::ALL {
            let mut samples = samples(*version);
            samples.push((
                if version.has_configuration_phase() {
                    Phase::Configuration
                } else {
                    Phase::Game
                },
                Serverbound::PluginMessage(PluginMessage::brand("vanilla", *version)),
            ));
            for (phase, packet) in samples {
                if serverbound_id(packet.kind(), phase, *version).is_none() {
                    continue;
                }
                let encoded = encode_serverbound(&packet, *version, phase).unwrap();
                let decoded = decode_serverbound(encoded, *version, phase)
                    .unwrap()
                    .unwrap_or_else(|| panic!("{:?} skipped on {}", packet.kind(), version));
                assert_eq!(decoded, packet, "{:?} on {}", phase, version);
            }
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut encoded =
            encode_serverbound(&Serverbound::KeepAlive(KeepAlive { id: 1 }), ProtocolVersion::V1_18_2, Phase::Game)
                .unwrap()
                .to_vec();
        encoded.push(0);
        assert!(matches!(
            decode_serverbound(encoded.into(), ProtocolVersion::V1_18_2, Phase::Game),
            Err(ProtocolError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn test_platform_blocks_are_readable_back() {
        use crate::protocol::registry::{decode_clientbound, encode_clientbound};
        use crate::protocol::types::BlockType;

        let platform = UpdateSectionBlocks {
            section_x: 0,
            section_z: 0,
            blocks: (4..6)
                .flat_map(|x| {
                    (10..12).map(move |z| BlockUpdate {
                        x,
                        y: 70,
                        z,
                        block: BlockType::Trapdoor,
                    })
                })
                .collect(),
        };
        for version in [
            ProtocolVersion::V1_7_2,
            ProtocolVersion::V1_8,
            ProtocolVersion::V1_13,
            ProtocolVersion::V1_18_2,
            ProtocolVersion::V1_21_4,
        ] {
            let packet = Clientbound::UpdateSectionBlocks(platform.clone());
            let encoded = encode_clientbound(&packet, version, Phase::Game).unwrap();
            let decoded = decode_clientbound(encoded, version, Phase::Game).unwrap();
            assert_eq!(decoded, Some(packet), "{}", version);
        }
    }

    #[test]
    fn test_every_clientbound_packet_encodes_where_mapped() {
        use crate::protocol::registry::{clientbound_id, encode_clientbound};
        use crate::protocol::types::{BlockType, EntityType};

        let packets = vec![
            (Phase::Login, Clientbound::Disconnect(Disconnect::new("bye"))),
            (
                Phase::Login,
                Clientbound::LoginSuccess(LoginSuccess {
                    uuid: Uuid::from_u128(1),
                    username: "Alice".into(),
                }),
            ),
            (Phase::Game, Clientbound::JoinGame(Box::new(JoinGame::new(1, 0)))),
            (Phase::Game, Clientbound::ChunkData(ChunkData { x: 0, z: 0 })),
            (
                Phase::Game,
                Clientbound::SpawnEntity(SpawnEntity::new(2, EntityType::Boat, 8.0, 1000.0, 8.0)),
            ),
            (
                Phase::Game,
                Clientbound::UpdateSectionBlocks(UpdateSectionBlocks {
                    section_x: 0,
                    section_z: 0,
                    blocks: vec![BlockUpdate {
                        x: 4,
                        y: 64,
                        z: 4,
                        block: BlockType::EndPortalFrame,
                    }],
                }),
            ),
            (Phase::Game, Clientbound::SetContainerSlot(SetContainerSlot::filled_map(36))),
            (Phase::Game, Clientbound::SystemChat(SystemChat::new("hi"))),
            (
                Phase::Game,
                Clientbound::RemoveEntities(RemoveEntities { entity_ids: vec![2] }),
            ),
            (
                Phase::Game,
                Clientbound::SetPassengers(SetPassengers {
                    vehicle_id: 2,
                    passenger_ids: vec![1],
                }),
            ),
        ];
        for version in ProtocolVersion::ALL {
            for (phase, packet) in &packets {
                if clientbound_id(packet.kind(), *phase, *version).is_some() {
                    assert!(encode_clientbound(packet, *version, *phase).is_ok());
                }
            }
        }
    }
}
