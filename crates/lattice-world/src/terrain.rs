//! Pluggable terrain.
//!
//! The engine treats terrain as an opaque height function plus an optional
//! per-column structure callback. Sources are looked up by key in a
//! [`TerrainRegistry`] once, when the world is built.

use std::sync::Arc;

use glam::{IVec2, IVec3};
use lattice_mesh::position_hash;
use lattice_voxel::{BlockId, BlockRegistry, Voxel};
use noise::{NoiseFn, Simplex};
use rustc_hash::FxHashMap;

use crate::error::TerrainError;

/// A terrain height function with optional structure placement.
///
/// Implementations are shared across generation workers.
pub trait TerrainSource: Send + Sync {
    /// Surface height at world column `(x, z)`. Cells below the height are
    /// ground, cells at or above it are air.
    fn height(&self, x: i32, z: i32, strength: f64) -> f64;

    /// Places structures rooted at one column. `surface` is the Y of the top
    /// ground voxel. Called once per column, by the chunk that owns the
    /// surface voxel. Writes may land in other chunks.
    fn place_structures(
        &self,
        _column: IVec2,
        _surface: i32,
        _writer: &mut StructureWriter<'_>,
    ) -> Result<(), TerrainError> {
        Ok(())
    }
}

/// Collects structure writes in world space.
pub struct StructureWriter<'a> {
    registry: &'a BlockRegistry,
    writes: Vec<(IVec3, Voxel)>,
}

impl<'a> StructureWriter<'a> {
    /// Empty writer resolving blocks through `registry`.
    pub fn new(registry: &'a BlockRegistry) -> Self {
        Self {
            registry,
            writes: Vec::new(),
        }
    }

    /// Queues a block at a world position.
    pub fn set(&mut self, pos: IVec3, block: BlockId) {
        self.writes.push((pos, self.registry.voxel(block)));
    }

    /// Queues a block by name.
    pub fn set_named(&mut self, pos: IVec3, name: &str) -> Result<(), TerrainError> {
        let id = self
            .registry
            .lookup(name)
            .ok_or_else(|| TerrainError::UnknownBlock(name.to_string()))?;
        self.set(pos, id);
        Ok(())
    }

    /// Writes queued so far.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// No writes queued.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Takes every queued write.
    pub fn take(&mut self) -> Vec<(IVec3, Voxel)> {
        std::mem::take(&mut self.writes)
    }
}

/// Blocks used to fill a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainPalette {
    /// Deep ground.
    pub deep: Voxel,
    /// Three layers under the surface.
    pub soil: Voxel,
    /// Top voxel.
    pub surface: Voxel,
}

impl TerrainPalette {
    /// Resolves `stone`, `dirt` and `grass`. Missing names fall back to air
    /// with a warning.
    pub fn resolve(registry: &BlockRegistry) -> Self {
        Self {
            deep: registry.voxel(registry.resolve("stone")),
            soil: registry.voxel(registry.resolve("dirt")),
            surface: registry.voxel(registry.resolve("grass")),
        }
    }

    /// Voxel at height `y` in a column whose surface height is `height`.
    pub fn voxel_at(&self, y: i32, height: f64) -> Voxel {
        let y = y as f64;
        if y < height - 4.0 {
            self.deep
        } else if y < height - 1.0 {
            self.soil
        } else if y < height {
            self.surface
        } else {
            Voxel::AIR
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in sources
// ---------------------------------------------------------------------------

/// Constant height everywhere.
#[derive(Clone, Copy, Debug)]
pub struct FlatTerrain {
    /// Surface height.
    pub level: f64,
}

impl Default for FlatTerrain {
    fn default() -> Self {
        Self { level: 0.0 }
    }
}

impl TerrainSource for FlatTerrain {
    fn height(&self, _x: i32, _z: i32, _strength: f64) -> f64 {
        self.level
    }
}

/// Simplex fBm hills with sparse log pillars.
pub struct NoiseTerrain {
    noise: Simplex,
    seed: u32,
    octaves: u32,
    base_frequency: f64,
    amplitude: f64,
}

impl NoiseTerrain {
    /// Creates a noise terrain for a world seed.
    pub fn new(seed: u32) -> Self {
        Self {
            noise: Simplex::new(seed),
            seed,
            octaves: 4,
            base_frequency: 0.02,
            amplitude: 16.0,
        }
    }
}

impl TerrainSource for NoiseTerrain {
    fn height(&self, x: i32, z: i32, strength: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.base_frequency;
        let mut amplitude = self.amplitude;
        for _ in 0..self.octaves {
            total += self.noise.get([x as f64 * frequency, z as f64 * frequency]) * amplitude;
            frequency *= 2.0;
            amplitude *= 0.5;
        }
        total * strength
    }

    fn place_structures(
        &self,
        column: IVec2,
        surface: i32,
        writer: &mut StructureWriter<'_>,
    ) -> Result<(), TerrainError> {
        let roll = position_hash(IVec3::new(column.x, self.seed as i32, column.y));
        if roll % 97 != 0 {
            return Ok(());
        }
        let base = IVec3::new(column.x, surface + 1, column.y);
        for dy in 0..4 {
            writer.set_named(base + IVec3::Y * dy, "log")?;
        }
        for dz in -1..=1 {
            for dx in -1..=1 {
                writer.set_named(base + IVec3::new(dx, 4, dz), "leaves")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Parameters handed to terrain factories.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TerrainParams {
    /// World seed.
    pub seed: u32,
}

/// Builds a terrain source.
pub type TerrainFactory = fn(&TerrainParams) -> Arc<dyn TerrainSource>;

/// Key used when a requested terrain is unknown.
pub const FALLBACK_TERRAIN: &str = "flat";

/// Maps terrain keys to factories.
pub struct TerrainRegistry {
    factories: FxHashMap<String, TerrainFactory>,
}

impl TerrainRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Registry holding `"flat"` and `"noise"`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(FALLBACK_TERRAIN, |_| Arc::new(FlatTerrain::default()));
        reg.register("noise", |p| Arc::new(NoiseTerrain::new(p.seed)));
        reg
    }

    /// Adds or replaces a factory.
    pub fn register(&mut self, key: &str, factory: TerrainFactory) {
        self.factories.insert(key.to_string(), factory);
    }

    /// Whether a key is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Builds the source for `key`. Unknown keys fall back to flat terrain
    /// with a warning.
    pub fn create(&self, key: &str, params: &TerrainParams) -> Arc<dyn TerrainSource> {
        if let Some(factory) = self.factories.get(key) {
            return factory(params);
        }
        tracing::warn!("unknown terrain '{}', using '{}'", key, FALLBACK_TERRAIN);
        match self.factories.get(FALLBACK_TERRAIN) {
            Some(factory) => factory(params),
            None => Arc::new(FlatTerrain::default()),
        }
    }
}

impl Default for TerrainRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_voxel::BlockDef;

    fn registry() -> BlockRegistry {
        let mut reg = BlockRegistry::new(8);
        for (i, name) in ["stone", "dirt", "grass", "log", "leaves"].iter().enumerate() {
            reg.register(BlockDef::opaque(name, 1, i as u32 + 1)).unwrap();
        }
        reg
    }

    #[test]
    fn test_palette_layers() {
        let reg = registry();
        let p = TerrainPalette::resolve(&reg);
        assert_eq!(p.voxel_at(0, 0.0), Voxel::AIR);
        assert_eq!(p.voxel_at(-1, 0.0), p.surface);
        assert_eq!(p.voxel_at(-2, 0.0), p.soil);
        assert_eq!(p.voxel_at(-4, 0.0), p.soil);
        assert_eq!(p.voxel_at(-5, 0.0), p.deep);
        assert!(p.deep.is_solid());
    }

    #[test]
    fn test_palette_missing_blocks_fall_back_to_air() {
        let p = TerrainPalette::resolve(&BlockRegistry::new(1));
        assert_eq!(p.deep, Voxel::AIR);
    }

    #[test]
    fn test_noise_is_deterministic_and_scaled() {
        let a = NoiseTerrain::new(7);
        let b = NoiseTerrain::new(7);
        assert_eq!(a.height(10, -20, 1.0), b.height(10, -20, 1.0));
        let h = a.height(33, 41, 1.0);
        assert!((a.height(33, 41, 2.0) - 2.0 * h).abs() < 1e-9);
        assert_eq!(a.height(33, 41, 0.0), 0.0);
    }

    #[test]
    fn test_registry_builtins_and_fallback() {
        let reg = TerrainRegistry::with_builtins();
        assert_eq!(reg.keys(), vec!["flat", "noise"]);
        let params = TerrainParams { seed: 1 };
        let flat = reg.create("does-not-exist", &params);
        assert_eq!(flat.height(5, 5, 3.0), 0.0);
    }

    #[test]
    fn test_custom_factory() {
        struct Shelf;
        impl TerrainSource for Shelf {
            fn height(&self, x: i32, _z: i32, _strength: f64) -> f64 {
                if x < 0 { 4.0 } else { 0.0 }
            }
        }
        let mut reg = TerrainRegistry::new();
        reg.register("shelf", |_| Arc::new(Shelf));
        let src = reg.create("shelf", &TerrainParams::default());
        assert_eq!(src.height(-1, 0, 1.0), 4.0);
    }

    #[test]
    fn test_structure_writer_unknown_name() {
        let reg = registry();
        let mut w = StructureWriter::new(&reg);
        assert!(w.set_named(IVec3::ZERO, "log").is_ok());
        assert!(matches!(
            w.set_named(IVec3::ONE, "obsidian"),
            Err(TerrainError::UnknownBlock(_))
        ));
        assert_eq!(w.take().len(), 1);
        assert!(w.is_empty());
    }

    #[test]
    fn test_noise_pillars_are_sparse() {
        let reg = registry();
        let terrain = NoiseTerrain::new(3);
        let mut w = StructureWriter::new(&reg);
        let mut placed = 0;
        for z in 0..64 {
            for x in 0..64 {
                let before = w.len();
                terrain.place_structures(IVec2::new(x, z), 0, &mut w).unwrap();
                if w.len() > before {
                    placed += 1;
                }
            }
        }
        assert!(placed > 0 && placed < 4096 / 20, "placed {placed}");
        assert_eq!(w.len(), placed * 13);
    }
}
