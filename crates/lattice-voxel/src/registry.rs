//! Block table: maps [`BlockId`] values to [`BlockDef`] metadata.
//!
//! The registry is built once at world initialisation and is read-only
//! afterwards, so worker threads share it through an `Arc` without locking.
//! Air is always id 0 so that zero-initialised grids represent empty space.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::voxel::{BlockId, MAX_BLOCK_ID, Voxel};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a block picks its texture for a given face.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureMode {
    /// One texture for every face.
    Single(u32),
    /// Deterministic weighted pick seeded by the voxel position.
    /// Entries are `(texture, weight)`.
    Weighted(Vec<(u32, u32)>),
    /// One texture per face, indexed by face direction
    /// (`+X, -X, +Y, -Y, +Z, -Z`).
    Directional([u32; 6]),
    /// Connected-texture sheet: the selected tile index is added to `base`.
    Connected {
        /// First texture of the 48-tile sheet.
        base: u32,
    },
}

impl TextureMode {
    fn refs_mut(&mut self) -> Vec<&mut u32> {
        match self {
            TextureMode::Single(t) => vec![t],
            TextureMode::Weighted(set) => set.iter_mut().map(|(t, _)| t).collect(),
            TextureMode::Directional(faces) => faces.iter_mut().collect(),
            TextureMode::Connected { base } => vec![base],
        }
    }

    /// Number of consecutive texture slots a reference occupies.
    fn span(&self) -> u32 {
        match self {
            TextureMode::Connected { .. } => 48,
            _ => 1,
        }
    }
}

/// Full descriptor for a block type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDef {
    /// Unique name (e.g. "stone", "glass").
    pub name: String,
    /// Occupies space: blocks faces and contributes to AO.
    pub solid: bool,
    /// Lets light through and exposes neighbouring faces even when solid.
    pub transparent: bool,
    /// Emitted light, 0..=255.
    pub light_emission: u8,
    /// Render batch this block's faces go into.
    pub material: u16,
    /// Texture selection mode.
    pub texture: TextureMode,
    /// When set, the face between two voxels of this type is culled even if
    /// the type is transparent.
    pub solid_towards_same_type: bool,
}

impl BlockDef {
    /// Opaque, solid, single-textured block.
    pub fn opaque(name: &str, material: u16, texture: u32) -> Self {
        Self {
            name: name.to_string(),
            solid: true,
            transparent: false,
            light_emission: 0,
            material,
            texture: TextureMode::Single(texture),
            solid_towards_same_type: true,
        }
    }

    fn air() -> Self {
        Self {
            name: "air".to_string(),
            solid: false,
            transparent: true,
            light_emission: 0,
            material: 0,
            texture: TextureMode::Single(0),
            solid_towards_same_type: false,
        }
    }
}

/// Errors that can occur during block registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A block with the same name has already been registered.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
    /// Every id up to the 15-bit limit is taken.
    #[error("block registry is full (max {} types)", MAX_BLOCK_ID as u32 + 1)]
    RegistryFull,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Dense block table with reverse name lookup.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    /// `index == BlockId.0`.
    defs: Vec<BlockDef>,
    by_name: FxHashMap<String, BlockId>,
    /// Number of textures available; refs at or beyond it fall back to 0.
    texture_count: u32,
}

impl BlockRegistry {
    /// Creates a registry holding only air, with `texture_count` available textures.
    pub fn new(texture_count: u32) -> Self {
        let mut by_name = FxHashMap::default();
        by_name.insert("air".to_string(), BlockId::AIR);
        Self {
            defs: vec![BlockDef::air()],
            by_name,
            texture_count: texture_count.max(1),
        }
    }

    /// Builds a registry from a list of definitions, registering them in order.
    pub fn from_defs(
        texture_count: u32,
        defs: impl IntoIterator<Item = BlockDef>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(texture_count);
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Registers a block and returns its id. Ids are assigned sequentially from 1.
    ///
    /// Texture references outside the available range are replaced by the
    /// blank texture (0) with a warning.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] if the name is taken,
    /// [`RegistryError::RegistryFull`] past the 15-bit id limit.
    pub fn register(&mut self, mut def: BlockDef) -> Result<BlockId, RegistryError> {
        if self.by_name.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.defs.len() > MAX_BLOCK_ID as usize {
            return Err(RegistryError::RegistryFull);
        }

        let span = def.texture.span();
        let limit = self.texture_count;
        for tex in def.texture.refs_mut() {
            if tex.saturating_add(span) > limit {
                tracing::warn!(
                    "block {:?}: texture {} out of range ({} textures), using blank",
                    def.name,
                    tex,
                    limit
                );
                *tex = 0;
            }
        }
        if let TextureMode::Weighted(set) = &mut def.texture
            && set.iter().all(|&(_, w)| w == 0)
        {
            tracing::warn!("block {:?}: weighted texture set is empty, using blank", def.name);
            def.texture = TextureMode::Single(0);
        }

        let id = BlockId(self.defs.len() as u16);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        Ok(id)
    }

    /// Definition for `id`. Unknown ids resolve to air.
    pub fn get(&self, id: BlockId) -> &BlockDef {
        match self.defs.get(id.0 as usize) {
            Some(def) => def,
            None => {
                tracing::warn!("unknown block id {}, treating as air", id.0);
                &self.defs[0]
            }
        }
    }

    /// Id for a name, or `None`.
    pub fn lookup(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// Id for a name, falling back to air with a warning.
    pub fn resolve(&self, name: &str) -> BlockId {
        self.lookup(name).unwrap_or_else(|| {
            tracing::warn!("unknown block name {:?}, using air", name);
            BlockId::AIR
        })
    }

    /// Voxel record for `id` with the solid bit taken from the table.
    pub fn voxel(&self, id: BlockId) -> Voxel {
        match self.defs.get(id.0 as usize) {
            Some(def) => Voxel::new(id, def.solid),
            None => Voxel::AIR,
        }
    }

    /// Light passes through this voxel.
    pub fn is_transparent(&self, voxel: Voxel) -> bool {
        self.defs
            .get(voxel.id().0 as usize)
            .is_none_or(|def| def.transparent)
    }

    /// Light emitted by this voxel.
    pub fn emission(&self, voxel: Voxel) -> u8 {
        self.defs
            .get(voxel.id().0 as usize)
            .map_or(0, |def| def.light_emission)
    }

    /// Number of registered types, air included.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.defs.len() <= 1
    }

    /// Number of available textures.
    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
