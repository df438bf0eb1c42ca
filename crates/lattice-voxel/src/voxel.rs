//! Packed 16-bit voxel records.
//!
//! The low 15 bits carry the block type id; the high bit caches whether that
//! type is solid so hot loops (face culling, AO) can skip the block table.
//! Only [`crate::BlockRegistry::voxel`] should build non-air records, which
//! keeps the cached bit in agreement with the table.

use serde::{Deserialize, Serialize};

/// Largest block type id that fits in a voxel record.
pub const MAX_BLOCK_ID: u16 = 0x7FFF;

/// Full light (open sky).
pub const MAX_LIGHT: u8 = 255;

const SOLID_BIT: u16 = 0x8000;

/// Block type identifier. Air is always `BlockId(0)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The empty block.
    pub const AIR: BlockId = BlockId(0);

    /// Returns `true` for air.
    pub fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// One grid cell: type id plus solid fast-path flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel(u16);

impl Voxel {
    /// Air, non-solid.
    pub const AIR: Voxel = Voxel(0);

    /// Packs a block id and solid flag. Ids above [`MAX_BLOCK_ID`] are masked.
    pub const fn new(id: BlockId, solid: bool) -> Self {
        let bits = id.0 & MAX_BLOCK_ID;
        Self(if solid { bits | SOLID_BIT } else { bits })
    }

    /// Reinterprets a raw record, e.g. one read from a save file.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw 16-bit record.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Block type id.
    pub const fn id(self) -> BlockId {
        BlockId(self.0 & MAX_BLOCK_ID)
    }

    /// Cached solid flag.
    pub const fn is_solid(self) -> bool {
        self.0 & SOLID_BIT != 0
    }

    /// Returns `true` if the type id is air.
    pub const fn is_air(self) -> bool {
        self.0 & MAX_BLOCK_ID == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let v = Voxel::new(BlockId(1234), true);
        assert_eq!(v.id(), BlockId(1234));
        assert!(v.is_solid());
        assert!(!v.is_air());

        let w = Voxel::new(BlockId(7), false);
        assert_eq!(w.id(), BlockId(7));
        assert!(!w.is_solid());
    }

    #[test]
    fn test_max_id_fits() {
        let v = Voxel::new(BlockId(MAX_BLOCK_ID), true);
        assert_eq!(v.id().0, MAX_BLOCK_ID);
        assert_eq!(v.raw(), 0xFFFF);
    }

    #[test]
    fn test_oversized_id_is_masked() {
        let v = Voxel::new(BlockId(0x8001), false);
        assert_eq!(v.id(), BlockId(1));
        assert!(!v.is_solid(), "id overflow must not leak into the solid bit");
    }

    #[test]
    fn test_default_is_air() {
        assert_eq!(Voxel::default(), Voxel::AIR);
        assert!(Voxel::AIR.is_air());
        assert!(Voxel::from_raw(0).id().is_air());
    }
}
