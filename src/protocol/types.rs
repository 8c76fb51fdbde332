//! Block, entity and item ids the verifier places into the world.
//!
//! Ids are version dependent in the same stepwise way packet ids are, so they
//! share [`VersionTable`]. The tables here are keyed by the first version an id
//! applies to.

use super::registry::VersionTable;
use super::version::ProtocolVersion::{self, *};

/// Blocks usable as the landing platform. Each has a collision height below a
/// full block, so landing on it produces a distinctive Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    EnchantingTable,
    Trapdoor,
    EndPortalFrame,
}

const ENCHANTING_TABLE: VersionTable<i32> = VersionTable(&[
    (V1_7_2, 116),
    (V1_13, 4612),
    (V1_13_2, 4613),
    (V1_14, 5116),
    (V1_16, 5132),
    (V1_16_2, 5136),
    (V1_17, 5333),
    (V1_19, 5719),
    (V1_19_3, 7159),
    (V1_19_4, 7385),
    (V1_20, 7389),
]);

const TRAPDOOR: VersionTable<i32> = VersionTable(&[
    (V1_7_2, 96),
    (V1_8, 167),
    (V1_13, 6509),
    (V1_13_2, 6510),
    (V1_14, 7016),
    (V1_16, 7552),
    (V1_16_2, 7556),
    (V1_17, 7802),
    (V1_19, 8293),
    (V1_19_3, 9937),
    (V1_19_4, 10269),
    (V1_20, 10273),
    (V1_20_2, 10414),
]);

const END_PORTAL_FRAME: VersionTable<i32> = VersionTable(&[
    (V1_7_2, 120),
    (V1_13, 4633),
    (V1_13_2, 4634),
    (V1_14, 5137),
    (V1_16, 5153),
    (V1_16_2, 5157),
    (V1_17, 5358),
    (V1_19, 5744),
    (V1_19_3, 7184),
    (V1_19_4, 7410),
    (V1_20, 7414),
]);

impl BlockType {
    pub const ALL: [BlockType; 3] = [BlockType::EnchantingTable, BlockType::Trapdoor, BlockType::EndPortalFrame];

    /// Block state id for `version`. Ids before 1.13 are legacy block ids
    /// without metadata.
    pub fn id(self, version: ProtocolVersion) -> i32 {
        let table = match self {
            BlockType::EnchantingTable => ENCHANTING_TABLE,
            BlockType::Trapdoor => TRAPDOOR,
            BlockType::EndPortalFrame => END_PORTAL_FRAME,
        };
        table.get(version).unwrap_or(0)
    }

    pub fn from_id(id: i32, version: ProtocolVersion) -> Option<BlockType> {
        BlockType::ALL.into_iter().find(|block| block.id(version) == id)
    }

    /// Collision box height.
    pub fn height(self) -> f64 {
        match self {
            BlockType::EnchantingTable => 0.75,
            BlockType::Trapdoor => 0.1875,
            BlockType::EndPortalFrame => 0.8125,
        }
    }

    pub fn random() -> BlockType {
        BlockType::ALL[rand::random_range(0..BlockType::ALL.len())]
    }
}

/// Entities the vehicle check spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Boat,
    Minecart,
}

// Before 1.14 these are object ids of the spawn-object packet.
const BOAT: VersionTable<i32> = VersionTable(&[
    (V1_7_2, 1),
    (V1_14, 5),
    (V1_15, 6),
    (V1_17, 7),
    (V1_19, 8),
    (V1_19_4, 9),
    (V1_20_5, 10),
]);

const MINECART: VersionTable<i32> = VersionTable(&[
    (V1_7_2, 10),
    (V1_14, 41),
    (V1_15, 42),
    (V1_16, 45),
    (V1_17, 50),
    (V1_19, 53),
    (V1_19_3, 54),
    (V1_19_4, 64),
    (V1_20_3, 65),
    (V1_20_5, 69),
]);

impl EntityType {
    pub fn id(self, version: ProtocolVersion) -> i32 {
        let table = match self {
            EntityType::Boat => BOAT,
            EntityType::Minecart => MINECART,
        };
        table.get(version).unwrap_or(0)
    }
}

const FILLED_MAP: VersionTable<i32> = VersionTable(&[
    (V1_7_2, 358),
    (V1_13, 608),
    (V1_13_2, 613),
    (V1_14, 671),
    (V1_16, 733),
    (V1_17, 847),
    (V1_19, 886),
    (V1_19_3, 914),
    (V1_19_4, 937),
    (V1_20, 941),
    (V1_20_3, 979),
    (V1_20_5, 982),
    (V1_21_2, 1022),
    (V1_21_4, 1031),
    (V1_21_5, 1042),
    (V1_21_6, 1059),
    (V1_21_9, 1104),
]);

// Data component id of `minecraft:map_id`, 1.20.5 and newer.
const MAP_ID_COMPONENT: VersionTable<i32> = VersionTable(&[(V1_20_5, 26), (V1_21_2, 36), (V1_21_5, 37)]);

/// Item id of a filled map.
pub fn filled_map_id(version: ProtocolVersion) -> i32 {
    FILLED_MAP.get(version).unwrap_or(358)
}

pub fn map_id_component(version: ProtocolVersion) -> i32 {
    MAP_ID_COMPONENT.get(version).unwrap_or(26)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ids() {
        assert_eq!(BlockType::EnchantingTable.id(V1_8), 116);
        assert_eq!(BlockType::EnchantingTable.id(V1_18_2), 5333);
        assert_eq!(BlockType::Trapdoor.id(V1_7_6), 96);
        assert_eq!(BlockType::Trapdoor.id(V1_20), 10273);
        assert_eq!(BlockType::Trapdoor.id(V1_21_9), 10414);
        assert_eq!(BlockType::EndPortalFrame.id(V1_21_9), 7414);
    }

    #[test]
    fn test_entity_ids() {
        assert_eq!(EntityType::Boat.id(V1_8), 1);
        assert_eq!(EntityType::Boat.id(V1_18_2), 7);
        assert_eq!(EntityType::Minecart.id(V1_20_2), 64);
        assert_eq!(EntityType::Minecart.id(V1_21_9), 69);
    }

    #[test]
    fn test_filled_map() {
        assert_eq!(filled_map_id(V1_12_2), 358);
        assert_eq!(filled_map_id(V1_18_2), 847);
        assert_eq!(filled_map_id(V1_21_7), 1059);
        assert_eq!(filled_map_id(V1_21_9), 1104);
        assert_eq!(map_id_component(V1_21), 26);
        assert_eq!(map_id_component(V1_21_4), 36);
        assert_eq!(map_id_component(V1_21_9), 37);
    }
}
