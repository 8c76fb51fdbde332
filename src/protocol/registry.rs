//! Packet id registry
//!
//! Packet ids move around between releases. Each packet kind carries a
//! [`VersionTable`] of `(first version, id)` steps per phase; an entry applies
//! from its version until the next entry takes over.

use bytes::{Buf, Bytes, BytesMut};

use super::codec::{read_var_int, write_var_int};
use super::packets::{Clientbound, Serverbound};
use super::version::ProtocolVersion::{self, *};
use super::ProtocolError;

/// Connection phase the registry resolves ids for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Handshake,
    Login,
    Configuration,
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

/// Values keyed by the first protocol version they apply to.
///
/// Steps must be sorted by version. A lookup returns the value of the last
/// step whose version is not newer than the requested one.
#[derive(Debug, Clone, Copy)]
pub struct VersionTable<T: 'static>(pub &'static [(ProtocolVersion, T)]);

impl<T: Copy> VersionTable<T> {
    pub fn get(&self, version: ProtocolVersion) -> Option<T> {
        self.0
            .iter()
            .rev()
            .find(|(from, _)| *from <= version)
            .map(|(_, value)| *value)
    }
}

macro_rules! packet_kinds {
    ($name:ident { $($variant:ident,)* }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

packet_kinds!(ServerboundKind {
    Handshake,
    LoginStart,
    LoginAcknowledged,
    ClientInformation,
    PluginMessage,
    FinishConfiguration,
    KeepAlive,
    Transaction,
    ConfirmTeleport,
    SetPlayerPosition,
    SetPlayerPositionRotation,
    SetPlayerRotation,
    SetPlayerOnGround,
    VehicleMove,
    PlayerInput,
    PaddleBoat,
    Chat,
    ClientTickEnd,
});

packet_kinds!(ClientboundKind {
    Disconnect,
    LoginSuccess,
    FinishConfiguration,
    KeepAlive,
    RegistryData,
    JoinGame,
    PlayerPositionRotation,
    PlayerAbilities,
    ChunkData,
    RemoveEntities,
    SetPassengers,
    SpawnEntity,
    UpdateSectionBlocks,
    Transaction,
    SetDefaultSpawnPosition,
    MapData,
    SetContainerSlot,
    SystemChat,
    GameEvent,
});

type IdTable = VersionTable<i32>;

const SERVERBOUND: &[(Phase, ServerboundKind, IdTable)] = &[
    (Phase::Handshake, ServerboundKind::Handshake, VersionTable(&[(Unknown, 0x00)])),
    (Phase::Login, ServerboundKind::LoginStart, VersionTable(&[(V1_7_2, 0x00)])),
    (Phase::Login, ServerboundKind::LoginAcknowledged, VersionTable(&[(V1_20_2, 0x03)])),
    (Phase::Configuration, ServerboundKind::ClientInformation, VersionTable(&[(V1_20_2, 0x00)])),
    (
        Phase::Configuration,
        ServerboundKind::PluginMessage,
        VersionTable(&[(V1_20_2, 0x01), (V1_20_5, 0x02)]),
    ),
    (
        Phase::Configuration,
        ServerboundKind::FinishConfiguration,
        VersionTable(&[(V1_20_2, 0x02), (V1_20_5, 0x03)]),
    ),
    (
        Phase::Configuration,
        ServerboundKind::KeepAlive,
        VersionTable(&[(V1_20_2, 0x03), (V1_20_5, 0x04)]),
    ),
    (
        Phase::Game,
        ServerboundKind::ClientTickEnd,
        VersionTable(&[(V1_21_2, 0x0B), (V1_21_6, 0x0C)]),
    ),
    (
        Phase::Game,
        ServerboundKind::PaddleBoat,
        VersionTable(&[
            (V1_9, 0x11),
            (V1_12, 0x12),
            (V1_12_1, 0x11),
            (V1_13, 0x14),
            (V1_14, 0x16),
            (V1_16, 0x17),
            (V1_17, 0x16),
            (V1_19, 0x18),
            (V1_19_1, 0x19),
            (V1_19_3, 0x18),
            (V1_19_4, 0x19),
            (V1_20_2, 0x1B),
            (V1_20_3, 0x1C),
            (V1_20_5, 0x1F),
            (V1_21_2, 0x21),
            (V1_21_6, 0x22),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::PlayerInput,
        VersionTable(&[
            (V1_7_2, 0x0C),
            (V1_9, 0x15),
            (V1_12, 0x16),
            (V1_13, 0x1A),
            (V1_14, 0x1C),
            (V1_16, 0x1D),
            (V1_17, 0x1C),
            (V1_19, 0x1E),
            (V1_19_1, 0x1F),
            (V1_19_3, 0x1E),
            (V1_19_4, 0x1F),
            (V1_20_2, 0x22),
            (V1_20_3, 0x23),
            (V1_20_5, 0x26),
            (V1_21_2, 0x28),
            (V1_21_4, 0x29),
            (V1_21_6, 0x2A),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::VehicleMove,
        VersionTable(&[
            (V1_9, 0x10),
            (V1_12, 0x11),
            (V1_12_1, 0x10),
            (V1_13, 0x13),
            (V1_14, 0x15),
            (V1_16, 0x16),
            (V1_17, 0x15),
            (V1_19, 0x17),
            (V1_19_1, 0x18),
            (V1_19_3, 0x17),
            (V1_19_4, 0x18),
            (V1_20_2, 0x1A),
            (V1_20_3, 0x1B),
            (V1_20_5, 0x1E),
            (V1_21_2, 0x20),
            (V1_21_6, 0x21),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::Chat,
        VersionTable(&[
            (V1_7_2, 0x01),
            (V1_9, 0x02),
            (V1_12, 0x03),
            (V1_12_1, 0x02),
            (V1_14, 0x03),
            (V1_19, 0x04),
            (V1_19_1, 0x05),
            (V1_20_5, 0x06),
            (V1_21_2, 0x07),
            (V1_21_6, 0x08),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::KeepAlive,
        VersionTable(&[
            (V1_7_2, 0x00),
            (V1_9, 0x0B),
            (V1_12, 0x0C),
            (V1_12_1, 0x0B),
            (V1_13, 0x0E),
            (V1_14, 0x0F),
            (V1_16, 0x10),
            (V1_17, 0x0F),
            (V1_19, 0x11),
            (V1_19_1, 0x12),
            (V1_19_3, 0x11),
            (V1_19_4, 0x12),
            (V1_20_2, 0x14),
            (V1_20_3, 0x15),
            (V1_20_5, 0x18),
            (V1_21_2, 0x1A),
            (V1_21_6, 0x1B),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::ClientInformation,
        VersionTable(&[
            (V1_7_2, 0x15),
            (V1_9, 0x04),
            (V1_12, 0x05),
            (V1_12_1, 0x04),
            (V1_14, 0x05),
            (V1_19, 0x07),
            (V1_19_1, 0x08),
            (V1_19_3, 0x07),
            (V1_19_4, 0x08),
            (V1_20_2, 0x09),
            (V1_20_5, 0x0A),
            (V1_21_2, 0x0C),
            (V1_21_6, 0x0D),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::PluginMessage,
        VersionTable(&[
            (V1_7_2, 0x17),
            (V1_9, 0x09),
            (V1_12, 0x0A),
            (V1_12_1, 0x09),
            (V1_13, 0x0A),
            (V1_14, 0x0B),
            (V1_17, 0x0A),
            (V1_19, 0x0C),
            (V1_19_1, 0x0D),
            (V1_19_3, 0x0C),
            (V1_19_4, 0x0D),
            (V1_20_2, 0x0F),
            (V1_21, 0x12),
            (V1_21_2, 0x14),
            (V1_21_6, 0x15),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::SetPlayerOnGround,
        VersionTable(&[
            (V1_7_2, 0x03),
            (V1_9, 0x0F),
            (V1_12, 0x0D),
            (V1_12_1, 0x0C),
            (V1_13, 0x0F),
            (V1_14, 0x14),
            (V1_16, 0x15),
            (V1_17, 0x14),
            (V1_19, 0x16),
            (V1_19_1, 0x17),
            (V1_19_3, 0x16),
            (V1_19_4, 0x17),
            (V1_20_2, 0x19),
            (V1_20_3, 0x1A),
            (V1_20_5, 0x1D),
            (V1_21_2, 0x1F),
            (V1_21_6, 0x20),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::SetPlayerPosition,
        VersionTable(&[
            (V1_7_2, 0x04),
            (V1_9, 0x0C),
            (V1_12, 0x0E),
            (V1_12_1, 0x0D),
            (V1_13, 0x10),
            (V1_14, 0x11),
            (V1_16, 0x12),
            (V1_17, 0x11),
            (V1_19, 0x13),
            (V1_19_1, 0x14),
            (V1_19_3, 0x13),
            (V1_19_4, 0x14),
            (V1_20_2, 0x16),
            (V1_20_3, 0x17),
            (V1_20_5, 0x1A),
            (V1_21_2, 0x1C),
            (V1_21_6, 0x1D),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::SetPlayerRotation,
        VersionTable(&[
            (V1_7_2, 0x05),
            (V1_9, 0x0E),
            (V1_12, 0x10),
            (V1_12_1, 0x0F),
            (V1_13, 0x12),
            (V1_14, 0x13),
            (V1_16, 0x14),
            (V1_17, 0x13),
            (V1_19, 0x15),
            (V1_19_1, 0x16),
            (V1_19_3, 0x15),
            (V1_19_4, 0x16),
            (V1_20_2, 0x18),
            (V1_20_3, 0x19),
            (V1_20_5, 0x1C),
            (V1_21_2, 0x1E),
            (V1_21_6, 0x1F),
        ]),
    ),
    (
        Phase::Game,
        ServerboundKind::SetPlayerPositionRotation,
        VersionTable(&[
            (V1_7_2, 0x06),
            (V1_9, 0x0D),
            (V1_12, 0x0F),
            (V1_12_1, 0x0E),
            (V1_13, 0x11),
            (V1_14, 0x12),
            (V1_16, 0x13),
            (V1_17, 0x12),
            (V1_19, 0x14),
            (V1_19_1, 0x15),
            (V1_19_3, 0x14),
            (V1_19_4, 0x15),
            (V1_20_2, 0x17),
            (V1_20_3, 0x18),
            (V1_20_5, 0x1B),
            (V1_21_2, 0x1D),
            (V1_21_6, 0x1E),
        ]),
    ),
    (Phase::Game, ServerboundKind::ConfirmTeleport, VersionTable(&[(V1_9, 0x00)])),
    (
        Phase::Game,
        ServerboundKind::Transaction,
        VersionTable(&[
            (V1_7_2, 0x0F),
            (V1_9, 0x05),
            (V1_12, 0x06),
            (V1_12_1, 0x05),
            (V1_13, 0x06),
            (V1_14, 0x07),
            (V1_17, 0x1D),
            (V1_19, 0x1F),
            (V1_19_1, 0x20),
            (V1_19_3, 0x1F),
            (V1_19_4, 0x20),
            (V1_20_2, 0x23),
            (V1_20_3, 0x24),
            (V1_20_5, 0x27),
            (V1_21_2, 0x29),
            (V1_21_4, 0x2B),
            (V1_21_6, 0x2C),
        ]),
    ),
];

const CLIENTBOUND: &[(Phase, ClientboundKind, IdTable)] = &[
    (Phase::Login, ClientboundKind::Disconnect, VersionTable(&[(V1_7_2, 0x00)])),
    (Phase::Login, ClientboundKind::LoginSuccess, VersionTable(&[(V1_7_2, 0x02)])),
    (
        Phase::Configuration,
        ClientboundKind::Disconnect,
        VersionTable(&[(V1_20_2, 0x01), (V1_20_5, 0x02)]),
    ),
    (
        Phase::Configuration,
        ClientboundKind::FinishConfiguration,
        VersionTable(&[(V1_20_2, 0x02), (V1_20_5, 0x03)]),
    ),
    (
        Phase::Configuration,
        ClientboundKind::KeepAlive,
        VersionTable(&[(V1_20_2, 0x03), (V1_20_5, 0x04)]),
    ),
    (
        Phase::Configuration,
        ClientboundKind::RegistryData,
        VersionTable(&[(V1_20_2, 0x05), (V1_20_5, 0x07)]),
    ),
    (
        Phase::Game,
        ClientboundKind::JoinGame,
        VersionTable(&[
            (V1_7_2, 0x01),
            (V1_9, 0x23),
            (V1_13, 0x25),
            (V1_15, 0x26),
            (V1_16, 0x25),
            (V1_16_2, 0x24),
            (V1_17, 0x26),
            (V1_19, 0x23),
            (V1_19_1, 0x25),
            (V1_19_3, 0x24),
            (V1_19_4, 0x28),
            (V1_20_2, 0x29),
            (V1_20_5, 0x2B),
            (V1_21_2, 0x2C),
            (V1_21_5, 0x2B),
            (V1_21_9, 0x30),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::KeepAlive,
        VersionTable(&[
            (V1_7_2, 0x00),
            (V1_9, 0x1F),
            (V1_13, 0x21),
            (V1_14, 0x20),
            (V1_15, 0x21),
            (V1_16, 0x20),
            (V1_16_2, 0x1F),
            (V1_17, 0x21),
            (V1_19, 0x1E),
            (V1_19_1, 0x20),
            (V1_19_3, 0x1F),
            (V1_19_4, 0x23),
            (V1_20_2, 0x24),
            (V1_20_5, 0x26),
            (V1_21_2, 0x27),
            (V1_21_5, 0x26),
            (V1_21_9, 0x2B),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::Disconnect,
        VersionTable(&[
            (V1_7_2, 0x40),
            (V1_9, 0x1A),
            (V1_13, 0x1B),
            (V1_14, 0x1A),
            (V1_15, 0x1B),
            (V1_16, 0x1A),
            (V1_16_2, 0x19),
            (V1_17, 0x1A),
            (V1_19, 0x17),
            (V1_19_1, 0x19),
            (V1_19_3, 0x17),
            (V1_19_4, 0x1A),
            (V1_20_2, 0x1B),
            (V1_20_5, 0x1D),
            (V1_21_5, 0x1C),
            (V1_21_9, 0x20),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::PlayerPositionRotation,
        VersionTable(&[
            (V1_7_2, 0x08),
            (V1_9, 0x2E),
            (V1_12_1, 0x2F),
            (V1_13, 0x32),
            (V1_14, 0x35),
            (V1_15, 0x36),
            (V1_16, 0x35),
            (V1_16_2, 0x34),
            (V1_17, 0x38),
            (V1_19, 0x36),
            (V1_19_1, 0x39),
            (V1_19_3, 0x38),
            (V1_19_4, 0x3C),
            (V1_20_2, 0x3E),
            (V1_20_5, 0x40),
            (V1_21_2, 0x42),
            (V1_21_5, 0x41),
            (V1_21_9, 0x46),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::PlayerAbilities,
        VersionTable(&[
            (V1_7_2, 0x39),
            (V1_9, 0x2B),
            (V1_12_1, 0x2C),
            (V1_13, 0x2E),
            (V1_14, 0x31),
            (V1_15, 0x32),
            (V1_16, 0x31),
            (V1_16_2, 0x30),
            (V1_17, 0x32),
            (V1_19, 0x2F),
            (V1_19_1, 0x31),
            (V1_19_3, 0x30),
            (V1_19_4, 0x34),
            (V1_20_2, 0x36),
            (V1_20_5, 0x38),
            (V1_21_2, 0x3A),
            (V1_21_5, 0x39),
            (V1_21_9, 0x3E),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::ChunkData,
        VersionTable(&[
            (V1_7_2, 0x21),
            (V1_9, 0x20),
            (V1_13, 0x22),
            (V1_14, 0x21),
            (V1_15, 0x22),
            (V1_16, 0x21),
            (V1_16_2, 0x20),
            (V1_17, 0x22),
            (V1_19, 0x1F),
            (V1_19_1, 0x21),
            (V1_19_3, 0x20),
            (V1_19_4, 0x24),
            (V1_20_2, 0x25),
            (V1_20_5, 0x27),
            (V1_21_2, 0x28),
            (V1_21_5, 0x27),
            (V1_21_9, 0x2C),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::RemoveEntities,
        VersionTable(&[
            (V1_7_2, 0x13),
            (V1_9, 0x30),
            (V1_12, 0x31),
            (V1_12_2, 0x32),
            (V1_13, 0x35),
            (V1_14, 0x37),
            (V1_15, 0x38),
            (V1_16, 0x37),
            (V1_16_2, 0x36),
            (V1_17, 0x3A),
            (V1_19, 0x38),
            (V1_19_1, 0x3B),
            (V1_19_3, 0x3A),
            (V1_19_4, 0x3E),
            (V1_20_2, 0x40),
            (V1_20_5, 0x42),
            (V1_21_2, 0x47),
            (V1_21_5, 0x46),
            (V1_21_9, 0x4B),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::SetPassengers,
        VersionTable(&[
            (V1_7_2, 0x1B),
            (V1_9, 0x40),
            (V1_12, 0x42),
            (V1_12_1, 0x43),
            (V1_13, 0x46),
            (V1_14, 0x4A),
            (V1_15, 0x4B),
            (V1_17, 0x54),
            (V1_19_1, 0x57),
            (V1_19_3, 0x55),
            (V1_19_4, 0x59),
            (V1_20_2, 0x5B),
            (V1_20_3, 0x5D),
            (V1_20_5, 0x5F),
            (V1_21_2, 0x65),
            (V1_21_5, 0x64),
            (V1_21_9, 0x69),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::SpawnEntity,
        VersionTable(&[(V1_7_2, 0x0E), (V1_9, 0x00), (V1_19_4, 0x01)]),
    ),
    (
        Phase::Game,
        ClientboundKind::UpdateSectionBlocks,
        VersionTable(&[
            (V1_7_2, 0x22),
            (V1_9, 0x10),
            (V1_13, 0x0F),
            (V1_15, 0x10),
            (V1_16, 0x0F),
            (V1_16_2, 0x3B),
            (V1_17, 0x3F),
            (V1_19, 0x3D),
            (V1_19_1, 0x40),
            (V1_19_3, 0x3F),
            (V1_19_4, 0x43),
            (V1_20_2, 0x45),
            (V1_20_3, 0x47),
            (V1_20_5, 0x49),
            (V1_21_2, 0x4E),
            (V1_21_5, 0x4D),
            (V1_21_9, 0x52),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::Transaction,
        VersionTable(&[
            (V1_7_2, 0x32),
            (V1_9, 0x11),
            (V1_13, 0x12),
            (V1_15, 0x13),
            (V1_16, 0x12),
            (V1_16_2, 0x11),
            (V1_17, 0x30),
            (V1_19, 0x2D),
            (V1_19_1, 0x2F),
            (V1_19_3, 0x2E),
            (V1_19_4, 0x32),
            (V1_20_2, 0x33),
            (V1_20_5, 0x35),
            (V1_21_2, 0x37),
            (V1_21_5, 0x36),
            (V1_21_9, 0x3B),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::SetDefaultSpawnPosition,
        VersionTable(&[
            (V1_7_2, 0x05),
            (V1_9, 0x43),
            (V1_12, 0x45),
            (V1_12_1, 0x46),
            (V1_13, 0x49),
            (V1_14, 0x4D),
            (V1_15, 0x4E),
            (V1_16, 0x42),
            (V1_17, 0x4B),
            (V1_19, 0x4A),
            (V1_19_1, 0x4D),
            (V1_19_3, 0x4C),
            (V1_19_4, 0x50),
            (V1_20_2, 0x52),
            (V1_20_3, 0x54),
            (V1_20_5, 0x56),
            (V1_21_2, 0x5B),
            (V1_21_5, 0x5A),
            (V1_21_9, 0x5F),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::MapData,
        VersionTable(&[
            (V1_7_2, 0x34),
            (V1_9, 0x24),
            (V1_13, 0x26),
            (V1_15, 0x27),
            (V1_16, 0x26),
            (V1_16_2, 0x25),
            (V1_17, 0x27),
            (V1_19, 0x24),
            (V1_19_1, 0x26),
            (V1_19_3, 0x25),
            (V1_19_4, 0x29),
            (V1_20_2, 0x2A),
            (V1_20_5, 0x2C),
            (V1_21_2, 0x2D),
            (V1_21_5, 0x2C),
            (V1_21_9, 0x31),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::SetContainerSlot,
        VersionTable(&[
            (V1_7_2, 0x2F),
            (V1_9, 0x16),
            (V1_13, 0x17),
            (V1_14, 0x16),
            (V1_15, 0x17),
            (V1_16, 0x16),
            (V1_16_2, 0x15),
            (V1_17, 0x16),
            (V1_19, 0x13),
            (V1_19_3, 0x12),
            (V1_19_4, 0x14),
            (V1_20_2, 0x15),
            (V1_21_5, 0x14),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::SystemChat,
        VersionTable(&[
            (V1_7_2, 0x02),
            (V1_9, 0x0F),
            (V1_13, 0x0E),
            (V1_15, 0x0F),
            (V1_16, 0x0E),
            (V1_17, 0x0F),
            (V1_19, 0x5F),
            (V1_19_1, 0x62),
            (V1_19_3, 0x60),
            (V1_19_4, 0x64),
            (V1_20_2, 0x67),
            (V1_20_3, 0x69),
            (V1_20_5, 0x6C),
            (V1_21_2, 0x73),
            (V1_21_5, 0x72),
            (V1_21_9, 0x77),
        ]),
    ),
    (
        Phase::Game,
        ClientboundKind::GameEvent,
        VersionTable(&[
            (V1_20_3, 0x20),
            (V1_20_5, 0x22),
            (V1_21_2, 0x23),
            (V1_21_5, 0x22),
            (V1_21_9, 0x26),
        ]),
    ),
];

pub fn serverbound_id(kind: ServerboundKind, phase: Phase, version: ProtocolVersion) -> Option<i32> {
    SERVERBOUND
        .iter()
        .find(|(p, k, _)| *p == phase && *k == kind)
        .and_then(|(_, _, table)| table.get(version))
}

pub fn clientbound_id(kind: ClientboundKind, phase: Phase, version: ProtocolVersion) -> Option<i32> {
    CLIENTBOUND
        .iter()
        .find(|(p, k, _)| *p == phase && *k == kind)
        .and_then(|(_, _, table)| table.get(version))
}

pub fn serverbound_kind(id: i32, phase: Phase, version: ProtocolVersion) -> Option<ServerboundKind> {
    SERVERBOUND
        .iter()
        .find(|(p, _, table)| *p == phase && table.get(version) == Some(id))
        .map(|(_, kind, _)| *kind)
}

pub fn clientbound_kind(id: i32, phase: Phase, version: ProtocolVersion) -> Option<ClientboundKind> {
    CLIENTBOUND
        .iter()
        .find(|(p, _, table)| *p == phase && table.get(version) == Some(id))
        .map(|(_, kind, _)| *kind)
}

/// Encodes `packet` as `VarInt id || body`, without the frame prefix.
pub fn encode_serverbound(
    packet: &Serverbound,
    version: ProtocolVersion,
    phase: Phase,
) -> Result<Bytes, ProtocolError> {
    let kind = packet.kind();
    let id = serverbound_id(kind, phase, version).ok_or(ProtocolError::NotMapped {
        packet: kind.name(),
        version,
        phase,
    })?;
    let mut buf = BytesMut::with_capacity(64);
    write_var_int(&mut buf, id);
    packet.encode(&mut buf, version);
    Ok(buf.freeze())
}

/// Decodes one frame sent by a client.
///
/// Ids with no packet mapped in `phase` return `Ok(None)`; the caller skips
/// them. A mapped packet must consume the frame exactly.
pub fn decode_serverbound(
    mut frame: Bytes,
    version: ProtocolVersion,
    phase: Phase,
) -> Result<Option<Serverbound>, ProtocolError> {
    let id = read_var_int(&mut frame)?;
    let Some(kind) = serverbound_kind(id, phase, version) else {
        return Ok(None);
    };
    let packet = Serverbound::decode(kind, &mut frame, version)?;
    if frame.has_remaining() {
        return Err(ProtocolError::TrailingBytes {
            id,
            remaining: frame.remaining(),
        });
    }
    Ok(Some(packet))
}

pub fn encode_clientbound(
    packet: &Clientbound,
    version: ProtocolVersion,
    phase: Phase,
) -> Result<Bytes, ProtocolError> {
    let kind = packet.kind();
    let id = clientbound_id(kind, phase, version).ok_or(ProtocolError::NotMapped {
        packet: kind.name(),
        version,
        phase,
    })?;
    let mut buf = BytesMut::with_capacity(128);
    write_var_int(&mut buf, id);
    packet.encode(&mut buf, version, phase);
    Ok(buf.freeze())
}

/// Decodes a frame sent by the server. Only the packets a client simulator
/// has to react to are readable; everything else comes back as `Ok(None)`.
pub fn decode_clientbound(
    mut frame: Bytes,
    version: ProtocolVersion,
    phase: Phase,
) -> Result<Option<Clientbound>, ProtocolError> {
    let id = read_var_int(&mut frame)?;
    let Some(kind) = clientbound_kind(id, phase, version) else {
        return Ok(None);
    };
    Clientbound::decode(kind, &mut frame, version, phase)
}

/// Per-connection view of the registry.
///
/// The version is fixed at handshake time, the phase moves forward as the
/// login progresses.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    version: ProtocolVersion,
    phase: Phase,
}

impl PacketCodec {
    pub fn new(version: ProtocolVersion, phase: Phase) -> Self {
        Self { version, phase }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::trace!("[codec] phase {:?} -> {:?} ({})", self.phase, phase, self.version);
        }
        self.phase = phase;
    }

    pub fn decode_serverbound(&self, frame: Bytes) -> Result<Option<Serverbound>, ProtocolError> {
        decode_serverbound(frame, self.version, self.phase)
    }

    pub fn encode_serverbound(&self, packet: &Serverbound) -> Result<Bytes, ProtocolError> {
        encode_serverbound(packet, self.version, self.phase)
    }

    pub fn decode_clientbound(&self, frame: Bytes) -> Result<Option<Clientbound>, ProtocolError> {
        decode_clientbound(frame, self.version, self.phase)
    }

    pub fn encode_clientbound(&self, packet: &Clientbound) -> Result<Bytes, ProtocolError> {
        encode_clientbound(packet, self.version, self.phase)
    }
}
