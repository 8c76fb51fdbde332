//! Clientbound game packets that build the verification world.
//!
//! Most of these are encode-only. A client simulator reads the teleport to
//! learn the spawn position and the block update to learn the platform top.

use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::protocol::codec::{
    read_bool, read_f32, read_f64, read_i16, read_i32, read_i64, read_u8, read_var_int,
    read_var_long, write_bool, write_byte_array,
    write_string, write_string_array, write_uuid, write_var_int, write_var_long,
};
use crate::protocol::nbt::{self, Tag};
use crate::protocol::text::TextComponent;
use crate::protocol::types::{filled_map_id, map_id_component, BlockType, EntityType};
use crate::protocol::{ProtocolError, ProtocolVersion};

pub const OVERWORLD: &str = "minecraft:overworld";

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub hardcore: bool,
    pub gamemode: u8,
    pub previous_gamemode: i8,
    pub level_names: Vec<String>,
    /// Complete registry codec NBT, root tag included (1.16 to 1.20.1).
    pub dimension_codec: Bytes,
    /// Dimension type NBT element (1.16.2 to 1.18.2).
    pub dimension_element: Bytes,
    pub dimension_key: String,
    /// Index of the dimension type in the registry (1.20.5+).
    pub dimension_id: i32,
    pub legacy_dimension: i32,
    pub level_name: String,
    pub hashed_seed: i64,
    pub difficulty: u8,
    pub max_players: i32,
    pub level_type: String,
    pub view_distance: i32,
    pub simulation_distance: i32,
    pub reduced_debug_info: bool,
    pub show_respawn_screen: bool,
    pub limited_crafting: bool,
    pub debug: bool,
    pub flat: bool,
    pub portal_cooldown: i32,
    pub sea_level: i32,
    pub secure_profile: bool,
}

impl JoinGame {
    pub fn new(entity_id: i32, gamemode: u8) -> Self {
        Self {
            entity_id,
            hardcore: false,
            gamemode,
            previous_gamemode: -1,
            level_names: vec![OVERWORLD.to_string()],
            dimension_codec: Bytes::new(),
            dimension_element: Bytes::new(),
            dimension_key: OVERWORLD.to_string(),
            dimension_id: 0,
            legacy_dimension: 0,
            level_name: OVERWORLD.to_string(),
            hashed_seed: rand::random(),
            difficulty: 0,
            max_players: 1,
            level_type: String::from("flat"),
            view_distance: 2,
            simulation_distance: 2,
            reduced_debug_info: false,
            show_respawn_screen: true,
            limited_crafting: false,
            debug: false,
            flat: true,
            portal_cooldown: 0,
            sea_level: 63,
            secure_profile: false,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        use ProtocolVersion::*;

        buf.put_i32(self.entity_id);
        if version >= V1_16_2 {
            write_bool(buf, self.hardcore);
        }
        if version < V1_20_2 {
            buf.put_u8(self.gamemode);
        }

        if version >= V1_16 {
            if version < V1_20_2 {
                buf.put_i8(self.previous_gamemode);
            }
            let names: Vec<&str> = self.level_names.iter().map(String::as_str).collect();
            write_string_array(buf, &names);
            if version < V1_20_2 {
                buf.put_slice(&self.dimension_codec);
            }
            if version >= V1_16_2 && version < V1_19 {
                buf.put_slice(&self.dimension_element);
            } else if version < V1_20_2 {
                write_string(buf, &self.dimension_key);
            }
            if version < V1_20_2 {
                write_string(buf, &self.level_name);
            }
        } else if version > V1_9 {
            buf.put_i32(self.legacy_dimension);
        } else {
            buf.put_i8(self.legacy_dimension as i8);
        }

        if version >= V1_15 && version < V1_20_2 {
            buf.put_i64(self.hashed_seed);
        }
        if version < V1_14 {
            buf.put_u8(self.difficulty);
        }
        if version >= V1_16_2 {
            write_var_int(buf, self.max_players);
        } else {
            buf.put_u8(self.max_players as u8);
        }
        if version < V1_16 {
            write_string(buf, &self.level_type);
        }
        if version >= V1_14 {
            write_var_int(buf, self.view_distance);
        }
        if version >= V1_18 {
            write_var_int(buf, self.simulation_distance);
        }
        if version >= V1_8 {
            write_bool(buf, self.reduced_debug_info);
        }
        if version >= V1_15 {
            write_bool(buf, self.show_respawn_screen);
        }
        if version >= V1_20_2 {
            write_bool(buf, self.limited_crafting);
            if version >= V1_20_5 {
                write_var_int(buf, self.dimension_id);
            } else {
                write_string(buf, &self.dimension_key);
            }
            write_string(buf, &self.level_name);
            buf.put_i64(self.hashed_seed);
            buf.put_u8(self.gamemode);
            buf.put_i8(self.previous_gamemode);
        }
        if version >= V1_16 {
            write_bool(buf, self.debug);
            write_bool(buf, self.flat);
        }
        if version >= V1_19 {
            // no last death location
            write_bool(buf, false);
        }
        if version >= V1_20 {
            write_var_int(buf, self.portal_cooldown);
        }
        if version >= V1_21_2 {
            write_var_int(buf, self.sea_level);
        }
        if version >= V1_20_5 {
            write_bool(buf, self.secure_profile);
        }
    }
}

/// Relative flag for the Y coordinate of a teleport.
pub const RELATIVE_Y: i32 = 1 << 1;

/// Offset 1.7 clients expect on absolute teleports (feet to eyes).
const LEGACY_EYE_OFFSET: f64 = 1.62f32 as f64;

/// Synchronize-player-position. Each one carries a teleport id the client
/// must confirm (1.9+).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPositionRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub relative: i32,
    pub teleport_id: i32,
    pub dismount: bool,
}

impl PlayerPositionRotation {
    pub fn absolute(x: f64, y: f64, z: f64, teleport_id: i32) -> Self {
        Self {
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
            relative: 0,
            teleport_id,
            dismount: false,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_21_2 {
            write_var_int(buf, self.teleport_id);
            buf.put_f64(self.x);
            buf.put_f64(self.y);
            buf.put_f64(self.z);
            // velocity
            buf.put_f64(0.0);
            buf.put_f64(0.0);
            buf.put_f64(0.0);
            buf.put_f32(self.yaw);
            buf.put_f32(self.pitch);
            buf.put_i32(self.relative);
            return;
        }

        buf.put_f64(self.x);
        if version >= ProtocolVersion::V1_8 {
            buf.put_f64(self.y);
        } else {
            buf.put_f64(self.y + LEGACY_EYE_OFFSET);
        }
        buf.put_f64(self.z);
        buf.put_f32(self.yaw);
        buf.put_f32(self.pitch);
        buf.put_u8(self.relative as u8);
        if version > ProtocolVersion::V1_8 {
            write_var_int(buf, self.teleport_id);
            if version.in_between(ProtocolVersion::V1_17, ProtocolVersion::V1_19_3) {
                write_bool(buf, self.dismount);
            }
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        if version >= ProtocolVersion::V1_21_2 {
            let teleport_id = read_var_int(buf)?;
            let (x, y, z) = (read_f64(buf)?, read_f64(buf)?, read_f64(buf)?);
            for _ in 0..3 {
                read_f64(buf)?;
            }
            return Ok(Self {
                x,
                y,
                z,
                yaw: read_f32(buf)?,
                pitch: read_f32(buf)?,
                relative: read_i32(buf)?,
                teleport_id,
                dismount: false,
            });
        }

        let x = read_f64(buf)?;
        let mut y = read_f64(buf)?;
        if version < ProtocolVersion::V1_8 {
            y -= LEGACY_EYE_OFFSET;
        }
        let mut packet = Self {
            x,
            y,
            z: read_f64(buf)?,
            yaw: read_f32(buf)?,
            pitch: read_f32(buf)?,
            relative: read_u8(buf)? as i32,
            teleport_id: 0,
            dismount: false,
        };
        if version > ProtocolVersion::V1_8 {
            packet.teleport_id = read_var_int(buf)?;
            if version.in_between(ProtocolVersion::V1_17, ProtocolVersion::V1_19_3) {
                packet.dismount = crate::protocol::codec::read_bool(buf)?;
            }
        }
        Ok(packet)
    }
}

pub const ABILITY_FLYING: u8 = 0x02;
pub const ABILITY_ALLOW_FLYING: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerAbilities {
    pub flags: u8,
    pub flying_speed: f32,
    pub field_of_view: f32,
}

impl PlayerAbilities {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.flags);
        buf.put_f32(self.flying_speed);
        buf.put_f32(self.field_of_view);
    }
}

/// An empty chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkData {
    pub x: i32,
    pub z: i32,
}

impl ChunkData {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        use ProtocolVersion::*;

        buf.put_i32(self.x);
        buf.put_i32(self.z);

        if version >= V1_17 {
            if version <= V1_17_1 {
                // section mask
                write_var_int(buf, 0);
            }
        } else {
            // full chunk
            write_bool(buf, true);
            if version.in_between(V1_16, V1_16_1) {
                // ignore old data
                write_bool(buf, true);
            }
            if version > V1_8 {
                write_var_int(buf, 0);
            } else {
                buf.put_u16(1);
            }
        }

        if version >= V1_14 {
            let longs = if version < V1_18 { 36 } else { 37 };
            let heightmaps = Tag::compound([("MOTION_BLOCKING", Tag::LongArray(vec![0; longs]))]);
            nbt::write_root(buf, &heightmaps, version);

            if version.in_between(V1_15, V1_17_1) {
                if version >= V1_16_2 {
                    write_var_int(buf, 1024);
                    for _ in 0..1024 {
                        write_var_int(buf, 1);
                    }
                } else {
                    for _ in 0..1024 {
                        buf.put_i32(0);
                    }
                }
            }
        }

        if version < V1_8 {
            buf.put_i32(0);
            buf.put_slice(&[0, 0]);
        } else if version < V1_13 {
            write_var_int(buf, 0);
        } else if version < V1_15 {
            write_byte_array(buf, &[0; 256 * 4]);
        } else if version < V1_18 {
            write_var_int(buf, 0);
        } else {
            // empty section: block count, single-valued air, single-valued biome
            const SECTION: [u8; 8] = [0, 0, 0, 0, 0, 0, 1, 0];
            let sections = if version >= V1_21_2 { 24 } else { 16 };
            write_var_int(buf, (SECTION.len() * sections) as i32);
            for _ in 0..sections {
                buf.put_slice(&SECTION);
            }
        }

        if version >= V1_9_4 {
            // block entities
            write_var_int(buf, 0);
        }

        if version >= V1_21_2 {
            for _ in 0..6 {
                write_var_int(buf, 0);
            }
        } else if version >= V1_18 {
            const LIGHT: [u8; 15] = [1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 3, 0xFF, 0xFF, 0, 0];
            if version >= V1_20 {
                buf.put_slice(&LIGHT[1..]);
            } else {
                buf.put_slice(&LIGHT);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveEntities {
    pub entity_ids: Vec<i32>,
}

impl RemoveEntities {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version < ProtocolVersion::V1_8 {
            buf.put_u8(self.entity_ids.len() as u8);
            for id in &self.entity_ids {
                buf.put_i32(*id);
            }
        } else if version == ProtocolVersion::V1_17 {
            // 1.17 removes one entity per packet
            write_var_int(buf, self.entity_ids.first().copied().unwrap_or_default());
        } else {
            write_var_int(buf, self.entity_ids.len() as i32);
            for id in &self.entity_ids {
                write_var_int(buf, *id);
            }
        }
    }
}

/// Mounts passengers on a vehicle. Before 1.9 this is the attach-entity
/// packet, which links a single passenger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPassengers {
    pub vehicle_id: i32,
    pub passenger_ids: Vec<i32>,
}

impl SetPassengers {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version >= ProtocolVersion::V1_9 {
            write_var_int(buf, self.vehicle_id);
            write_var_int(buf, self.passenger_ids.len() as i32);
            for id in &self.passenger_ids {
                write_var_int(buf, *id);
            }
        } else {
            buf.put_i32(self.passenger_ids.first().copied().unwrap_or(-1));
            buf.put_i32(self.vehicle_id);
            // leash
            write_bool(buf, false);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnEntity {
    pub entity_id: i32,
    pub uuid: Uuid,
    pub entity_type: EntityType,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub data: i32,
}

impl SpawnEntity {
    pub fn new(entity_id: i32, entity_type: EntityType, x: f64, y: f64, z: f64) -> Self {
        Self {
            entity_id,
            uuid: Uuid::from_u128(rand::random()),
            entity_type,
            x,
            y,
            z,
            data: 0,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        write_var_int(buf, self.entity_id);
        if version >= ProtocolVersion::V1_9 {
            write_uuid(buf, &self.uuid);
        }
        let type_id = self.entity_type.id(version);
        if version >= ProtocolVersion::V1_14 {
            write_var_int(buf, type_id);
        } else {
            buf.put_u8(type_id as u8);
        }
        if version >= ProtocolVersion::V1_9 {
            buf.put_f64(self.x);
            buf.put_f64(self.y);
            buf.put_f64(self.z);
        } else {
            // fixed point, 5 fractional bits
            buf.put_i32((self.x * 32.0) as i32);
            buf.put_i32((self.y * 32.0) as i32);
            buf.put_i32((self.z * 32.0) as i32);
        }
        // pitch, yaw
        buf.put_u8(0);
        buf.put_u8(0);
        if version >= ProtocolVersion::V1_19 {
            // head yaw
            buf.put_u8(0);
            write_var_int(buf, self.data);
        } else {
            buf.put_i32(self.data);
        }
        if self.data > 0 || version >= ProtocolVersion::V1_9 {
            // velocity
            buf.put_i16(0);
            buf.put_i16(0);
            buf.put_i16(0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockUpdate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block: BlockType,
}

impl BlockUpdate {
    /// Position inside the chunk section, as packed from 1.16.2 on.
    fn section_position(&self) -> i64 {
        (((self.x & 0xF) << 8) | ((self.z & 0xF) << 4) | (self.y & 0xF)) as i64
    }

    /// Position inside the chunk column, as packed before 1.16.2.
    fn legacy_position(&self) -> i16 {
        (((self.x & 0xF) << 12) | ((self.z & 0xF) << 8) | (self.y & 0xFF)) as i16
    }
}

/// Multi-block change inside one chunk section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSectionBlocks {
    pub section_x: i32,
    pub section_z: i32,
    pub blocks: Vec<BlockUpdate>,
}

impl UpdateSectionBlocks {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version < ProtocolVersion::V1_16_2 {
            buf.put_i32(self.section_x);
            buf.put_i32(self.section_z);
            if version < ProtocolVersion::V1_8 {
                buf.put_i16(self.blocks.len() as i16);
                buf.put_i32(4 * self.blocks.len() as i32);
            } else {
                write_var_int(buf, self.blocks.len() as i32);
            }
            for block in &self.blocks {
                buf.put_i16(block.legacy_position());
                let id = block.block.id(version);
                if version >= ProtocolVersion::V1_13 {
                    write_var_int(buf, id);
                } else if version < ProtocolVersion::V1_8 {
                    buf.put_i16((id << 4) as i16);
                } else {
                    write_var_int(buf, id << 4);
                }
            }
            return;
        }

        let section_y = self.blocks.first().map(|b| b.y >> 4).unwrap_or_default() as i64;
        let section = ((self.section_x as i64 & 0x3FFFFF) << 42)
            | (section_y & 0xFFFFF)
            | ((self.section_z as i64 & 0x3FFFFF) << 20);
        buf.put_i64(section);
        if version < ProtocolVersion::V1_20 {
            // suppress light updates
            write_bool(buf, true);
        }
        write_var_int(buf, self.blocks.len() as i32);
        for block in &self.blocks {
            let id = block.block.id(version) as i64;
            write_var_long(buf, (id << 12) | block.section_position());
        }
    }

    pub fn decode<B: Buf>(buf: &mut B, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let block = |id: i32| {
            BlockType::from_id(id, version).ok_or(ProtocolError::DecodeUnsupported("block state"))
        };

        if version < ProtocolVersion::V1_16_2 {
            let section_x = read_i32(buf)?;
            let section_z = read_i32(buf)?;
            let count = if version < ProtocolVersion::V1_8 {
                let count = read_i16(buf)? as i32;
                read_i32(buf)?;
                count
            } else {
                read_var_int(buf)?
            };
            if count < 0 {
                return Err(ProtocolError::NegativeLength(count));
            }
            let mut blocks = Vec::with_capacity(count.min(4096) as usize);
            for _ in 0..count {
                let position = read_i16(buf)? as i32 & 0xFFFF;
                let id = if version >= ProtocolVersion::V1_13 {
                    read_var_int(buf)?
                } else if version < ProtocolVersion::V1_8 {
                    (read_i16(buf)? as i32 & 0xFFFF) >> 4
                } else {
                    read_var_int(buf)? >> 4
                };
                blocks.push(BlockUpdate {
                    x: (section_x << 4) | ((position >> 12) & 0xF),
                    y: position & 0xFF,
                    z: (section_z << 4) | ((position >> 8) & 0xF),
                    block: block(id)?,
                });
            }
            return Ok(Self {
                section_x,
                section_z,
                blocks,
            });
        }

        let section = read_i64(buf)?;
        let section_x = (section >> 42) as i32;
        let section_y = ((section << 44) >> 44) as i32;
        let section_z = ((section << 22) >> 42) as i32;
        if version < ProtocolVersion::V1_20 {
            read_bool(buf)?;
        }
        let count = read_var_int(buf)?;
        if count < 0 {
            return Err(ProtocolError::NegativeLength(count));
        }
        let mut blocks = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            let entry = read_var_long(buf)?;
            let position = (entry & 0xFFF) as i32;
            blocks.push(BlockUpdate {
                x: (section_x << 4) | (position >> 8),
                y: (section_y << 4) | (position & 0xF),
                z: (section_z << 4) | ((position >> 4) & 0xF),
                block: block((entry >> 12) as i32)?,
            });
        }
        Ok(Self {
            section_x,
            section_z,
            blocks,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetDefaultSpawnPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SetDefaultSpawnPosition {
    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        if version < ProtocolVersion::V1_8 {
            buf.put_i32(self.x);
            buf.put_i32(self.y);
            buf.put_i32(self.z);
            return;
        }
        if version >= ProtocolVersion::V1_21_9 {
            write_string(buf, OVERWORLD);
        }
        let (x, y, z) = (self.x as i64, self.y as i64, self.z as i64);
        let packed = if version < ProtocolVersion::V1_14 {
            ((x & 0x3FFFFFF) << 38) | ((y & 0xFFF) << 26) | (z & 0x3FFFFFF)
        } else {
            ((x & 0x3FFFFFF) << 38) | ((z & 0x3FFFFFF) << 12) | (y & 0xFFF)
        };
        buf.put_i64(packed);
        if version >= ProtocolVersion::V1_17 {
            // angle
            buf.put_f32(0.0);
            if version >= ProtocolVersion::V1_21_9 {
                // pitch
                buf.put_f32(0.0);
            }
        }
    }
}

pub const MAP_SIZE: usize = 128;

/// Map colours for map id 0. Before 1.8 a map is sent one column per
/// packet; later versions take the whole 128x128 image at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapData {
    pub x: u8,
    pub y: u8,
    pub colors: Bytes,
}

impl MapData {
    /// Splits a full 128x128 image into the packets `version` expects.
    pub fn from_image(image: &[u8], version: ProtocolVersion) -> Vec<MapData> {
        if version >= ProtocolVersion::V1_8 {
            return vec![MapData {
                x: 0,
                y: 0,
                colors: Bytes::copy_from_slice(image),
            }];
        }
        (0..MAP_SIZE)
            .map(|column| {
                let colors: Vec<u8> = (0..MAP_SIZE)
                    .map(|row| image.get(row * MAP_SIZE + column).copied().unwrap_or_default())
                    .collect();
                MapData {
                    x: column as u8,
                    y: 0,
                    colors: Bytes::from(colors),
                }
            })
            .collect()
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        // map id
        write_var_int(buf, 0);

        if version < ProtocolVersion::V1_8 {
            buf.put_u16(self.colors.len() as u16 + 3);
            buf.put_u8(0);
            buf.put_u8(self.x);
            buf.put_u8(self.y);
            buf.put_slice(&self.colors);
            return;
        }

        // scale
        buf.put_u8(0);
        if version >= ProtocolVersion::V1_9 && version < ProtocolVersion::V1_17 {
            // tracking position
            write_bool(buf, false);
        }
        if version >= ProtocolVersion::V1_14 {
            // locked
            write_bool(buf, false);
        }
        if version >= ProtocolVersion::V1_17 {
            // no icons
            write_bool(buf, false);
        } else {
            write_var_int(buf, 0);
        }
        buf.put_u8(MAP_SIZE as u8);
        buf.put_u8(MAP_SIZE as u8);
        buf.put_u8(self.x);
        buf.put_u8(self.y);
        write_var_int(buf, self.colors.len() as i32);
        buf.put_slice(&self.colors);
    }
}

/// Puts a filled map (map id 0) into an inventory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetContainerSlot {
    pub window_id: i32,
    pub slot: i16,
    pub count: i32,
}

impl SetContainerSlot {
    pub fn filled_map(slot: i16) -> Self {
        Self {
            window_id: 0,
            slot,
            count: 1,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        use ProtocolVersion::*;

        if version >= V1_21_2 {
            write_var_int(buf, self.window_id);
        } else {
            buf.put_u8(self.window_id as u8);
        }
        if version >= V1_17_1 {
            // state id
            write_var_int(buf, 0);
        }
        buf.put_i16(self.slot);
        if version.in_between(V1_13_2, V1_20_3) {
            // present
            write_bool(buf, true);
        }
        if version >= V1_20_5 {
            write_var_int(buf, self.count);
        }
        let item = filled_map_id(version);
        if version < V1_13_2 {
            buf.put_i16(item as i16);
        } else {
            write_var_int(buf, item);
        }
        if version < V1_20_5 {
            buf.put_u8(self.count as u8);
        }
        if version < V1_13 {
            // damage
            buf.put_i16(0);
        }
        if version < V1_17 {
            if version < V1_8 {
                buf.put_i16(-1);
            } else {
                buf.put_u8(0);
            }
        } else if version < V1_20_5 {
            nbt::write_root(buf, &Tag::compound([("map", Tag::Int(0))]), version);
        } else {
            // components: one added, none removed
            write_var_int(buf, 1);
            write_var_int(buf, 0);
            write_var_int(buf, map_id_component(version));
            write_var_int(buf, 0);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemChat {
    pub message: TextComponent,
}

impl SystemChat {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: TextComponent::new(message),
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B, version: ProtocolVersion) {
        self.message.write(buf, version);
        if version >= ProtocolVersion::V1_19_1 {
            // overlay
            write_bool(buf, false);
        } else if version >= ProtocolVersion::V1_19 {
            // system message type
            write_var_int(buf, 1);
        } else if version >= ProtocolVersion::V1_8 {
            buf.put_u8(1);
        }
        if version >= ProtocolVersion::V1_16 && version < ProtocolVersion::V1_19 {
            write_uuid(buf, &Uuid::nil());
        }
    }
}

/// Game event 13: start waiting for level chunks.
pub const START_WAITING_FOR_CHUNKS: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameEvent {
    pub event: u8,
    pub value: f32,
}

impl GameEvent {
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.event);
        buf.put_f32(self.value);
    }
}
