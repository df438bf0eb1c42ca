//! Block table used by the headless application.

use lattice_voxel::{BlockDef, BlockRegistry, RegistryError, TextureMode};

/// Texture slots available to the demo table, connected sheet included.
pub const TEXTURE_COUNT: u32 = 128;

/// Builds the demo block table: the terrain palette plus a few blocks that
/// exercise every texture mode, transparency and emission.
pub fn default_registry() -> Result<BlockRegistry, RegistryError> {
    let mut grass = BlockDef::opaque("grass", 0, 3);
    // side, side, top, bottom, side, side
    grass.texture = TextureMode::Directional([4, 4, 3, 2, 4, 4]);

    let mut stone = BlockDef::opaque("stone", 0, 1);
    stone.texture = TextureMode::Weighted(vec![(1, 6), (5, 3), (6, 1)]);

    let mut leaves = BlockDef::opaque("leaves", 1, 8);
    leaves.transparent = true;
    leaves.solid_towards_same_type = false;

    let mut glass = BlockDef::opaque("glass", 1, 64);
    glass.transparent = true;
    glass.texture = TextureMode::Connected { base: 64 };

    let mut water = BlockDef::opaque("water", 2, 9);
    water.solid = false;
    water.transparent = true;

    let mut lamp = BlockDef::opaque("lamp", 0, 10);
    lamp.light_emission = 224;

    BlockRegistry::from_defs(
        TEXTURE_COUNT,
        [
            stone,
            BlockDef::opaque("dirt", 0, 2),
            grass,
            BlockDef::opaque("log", 0, 7),
            leaves,
            glass,
            water,
            lamp,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_palette_names_resolve() {
        let reg = default_registry().unwrap();
        for name in ["stone", "dirt", "grass", "log", "leaves"] {
            assert!(reg.lookup(name).is_some(), "{name} missing");
        }
        let glass = reg.lookup("glass").unwrap();
        assert!(reg.is_transparent(reg.voxel(glass)));
        let water = reg.lookup("water").unwrap();
        assert!(!reg.voxel(water).is_solid());
        let lamp = reg.lookup("lamp").unwrap();
        assert_eq!(reg.emission(reg.voxel(lamp)), 224);
    }
}
