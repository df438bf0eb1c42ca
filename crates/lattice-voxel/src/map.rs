//! World map: the single owner of every loaded chunk.
//!
//! Reads and writes by world position are routed to the chunk that owns the
//! cell. Reads relative to a chunk stay inside its padded grid when they can
//! and fall back to the owning neighbour otherwise. Writes update the owner's
//! authoritative cell and mirror the value into every loaded neighbour whose
//! padding border covers it.

use glam::IVec3;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::chunk::Chunk;
use crate::coord::ChunkCoord;
use crate::voxel::{MAX_LIGHT, Voxel};

/// Vertical extent and chunk size of a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldBounds {
    /// Chunk edge length in voxels.
    pub edge: i32,
    /// Lowest Y (inclusive).
    pub min_y: i32,
    /// Highest Y (exclusive).
    pub max_y: i32,
}

impl WorldBounds {
    /// World position lies within the vertical bounds.
    pub fn contains(&self, pos: IVec3) -> bool {
        pos.y >= self.min_y && pos.y < self.max_y
    }

    /// Chunk lies within the vertical bounds.
    pub fn contains_chunk(&self, coord: ChunkCoord) -> bool {
        coord.y >= self.min_y && coord.y < self.max_y
    }
}

/// Errors returned by world edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// The position is above or below the world.
    #[error("position {0} is outside the world bounds")]
    OutOfWorld(IVec3),
    /// The owning chunk is not in the map.
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkCoord),
}

/// Owns all loaded chunks.
pub struct ChunkMap {
    bounds: WorldBounds,
    chunks: FxHashMap<ChunkCoord, Chunk>,
}

impl ChunkMap {
    /// Empty map for a world with the given bounds.
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            bounds,
            chunks: FxHashMap::default(),
        }
    }

    /// World bounds.
    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Chunk edge length.
    pub fn edge(&self) -> i32 {
        self.bounds.edge
    }

    /// Inserts a chunk, replacing and returning any previous one at its coordinate.
    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.coord(), chunk)
    }

    /// Removes and returns a chunk.
    pub fn remove(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.remove(&coord)
    }

    /// Immutable chunk access.
    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Mutable chunk access.
    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Whether a chunk is registered at `coord`.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// No chunks loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// All loaded coordinates, in arbitrary order.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// All `(coord, chunk)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
        self.chunks.iter()
    }

    /// Mutable iteration.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChunkCoord, &mut Chunk)> {
        self.chunks.iter_mut()
    }

    /// Coordinate of the chunk owning world voxel `pos`.
    pub fn owner(&self, pos: IVec3) -> ChunkCoord {
        ChunkCoord::containing(pos, self.bounds.edge)
    }

    // -----------------------------------------------------------------------
    // Voxels
    // -----------------------------------------------------------------------

    /// Voxel at a world position. Air when the owner is not loaded.
    pub fn voxel_at(&self, pos: IVec3) -> Voxel {
        let coord = self.owner(pos);
        match self.chunks.get(&coord) {
            Some(chunk) => chunk.store.get(coord.to_local(pos)),
            None => Voxel::AIR,
        }
    }

    /// Voxel at `local` relative to chunk `coord`.
    ///
    /// Positions inside the chunk's padded grid are read directly; anything
    /// further out is translated to world space and read from its owner.
    pub fn voxel_from(&self, coord: ChunkCoord, local: IVec3) -> Voxel {
        if let Some(chunk) = self.chunks.get(&coord)
            && chunk.store.contains(local)
        {
            return chunk.store.get(local);
        }
        self.voxel_at(coord.to_world(local))
    }

    /// Writes a voxel at a world position.
    ///
    /// The owner's interior cell is authoritative and is recorded as modified
    /// when `mark_modified` is set. Loaded neighbours whose padding covers the
    /// cell receive a mirror copy. Every touched chunk gets a version bump.
    ///
    /// Returns the chunks that observe the cell (owner first), so the caller
    /// can relight and request geometry updates. Nothing is remeshed here.
    pub fn set_voxel(
        &mut self,
        pos: IVec3,
        voxel: Voxel,
        mark_modified: bool,
    ) -> Result<Vec<ChunkCoord>, EditError> {
        if !self.bounds.contains(pos) {
            return Err(EditError::OutOfWorld(pos));
        }
        let owner = self.owner(pos);
        let chunk = self
            .chunks
            .get_mut(&owner)
            .ok_or(EditError::ChunkNotLoaded(owner))?;
        if chunk.store.set(owner.to_local(pos), voxel, mark_modified) {
            chunk.bump_version();
        }

        let observers = self.observers(pos);
        for &coord in observers.iter().skip(1) {
            if let Some(neighbor) = self.chunks.get_mut(&coord)
                && neighbor.store.set(coord.to_local(pos), voxel, false)
            {
                neighbor.bump_version();
            }
        }
        Ok(observers)
    }

    /// Chunks whose padded grid contains world voxel `pos`: the owner first,
    /// then up to seven neighbours across faces, edges and corners.
    pub fn observers(&self, pos: IVec3) -> Vec<ChunkCoord> {
        let edge = self.bounds.edge;
        let owner = self.owner(pos);
        let local = owner.to_local(pos);

        let axis = |l: i32| -> &'static [i32] {
            if edge == 1 {
                &[0, -1, 1]
            } else if l == 0 {
                &[0, -1]
            } else if l == edge - 1 {
                &[0, 1]
            } else {
                &[0]
            }
        };

        let mut out = Vec::with_capacity(8);
        for &dz in axis(local.z) {
            for &dy in axis(local.y) {
                for &dx in axis(local.x) {
                    out.push(owner.offset(dx, dy, dz, edge));
                }
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Light
    // -----------------------------------------------------------------------

    /// Light at a world position.
    ///
    /// Unloaded space above the world is fully lit; any other unloaded space
    /// is dark.
    pub fn light_at(&self, pos: IVec3) -> u8 {
        if pos.y >= self.bounds.max_y {
            return MAX_LIGHT;
        }
        let coord = self.owner(pos);
        match self.chunks.get(&coord) {
            Some(chunk) => chunk.store.light(coord.to_local(pos)),
            None => 0,
        }
    }

    /// Writes light into the owner's interior cell. Returns the owner if the
    /// value changed, `None` if unchanged or not loaded.
    pub fn set_light_at(&mut self, pos: IVec3, value: u8) -> Option<ChunkCoord> {
        let coord = self.owner(pos);
        let chunk = self.chunks.get_mut(&coord)?;
        if chunk.store.set_light(coord.to_local(pos), value) {
            chunk.bump_version();
            Some(coord)
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Padding
    // -----------------------------------------------------------------------

    /// Copies voxels and light from the 26 neighbours into `coord`'s padding
    /// border. Missing neighbours leave air behind, lit only above the world.
    ///
    /// Returns `false` if `coord` is not loaded.
    pub fn refresh_padding(&mut self, coord: ChunkCoord) -> bool {
        let Some(chunk) = self.chunks.get(&coord) else {
            return false;
        };
        let edge = self.bounds.edge;
        let mut border = Vec::with_capacity(padding_len(edge));
        for z in -1..=edge {
            for y in -1..=edge {
                for x in -1..=edge {
                    let local = IVec3::new(x, y, z);
                    if chunk.store.is_interior(local) {
                        continue;
                    }
                    let world = coord.to_world(local);
                    border.push((local, self.voxel_at(world), self.light_at(world)));
                }
            }
        }

        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        for (local, voxel, light) in border {
            chunk.store.set(local, voxel, false);
            chunk.store.set_light(local, light);
        }
        true
    }
}

fn padding_len(edge: i32) -> usize {
    let p = edge + 2;
    ((p * p * p) - edge * edge * edge) as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::BlockId;

    const EDGE: i32 = 8;

    fn bounds() -> WorldBounds {
        WorldBounds {
            edge: EDGE,
            min_y: -16,
            max_y: 16,
        }
    }

    fn stone() -> Voxel {
        Voxel::new(BlockId(1), true)
    }

    fn map_with_cube() -> ChunkMap {
        let mut map = ChunkMap::new(bounds());
        for z in -1..=1 {
            for y in -2..=0 {
                for x in -1..=1 {
                    let c = ChunkCoord::from_grid(IVec3::new(x, y, z), EDGE);
                    map.insert(Chunk::new(c, EDGE as u32));
                }
            }
        }
        map
    }

    #[test]
    fn test_set_get_across_chunk_boundaries() {
        let mut map = map_with_cube();
        let positions = [
            IVec3::new(0, 0, 0),
            IVec3::new(-1, 0, 0),
            IVec3::new(7, -1, 8),
            IVec3::new(-8, -16, -8),
            IVec3::new(15, 7, 15),
        ];
        for (i, &p) in positions.iter().enumerate() {
            let v = Voxel::new(BlockId(i as u16 + 1), true);
            map.set_voxel(p, v, true).unwrap();
            assert_eq!(map.voxel_at(p), v, "round trip at {p}");
        }
    }

    #[test]
    fn test_relative_read_delegates_to_neighbor() {
        let mut map = map_with_cube();
        let origin = ChunkCoord::new(0, 0, 0);
        map.set_voxel(IVec3::new(10, 2, 3), stone(), true).unwrap();
        // Two past the edge: outside the padded grid, must be delegated.
        assert_eq!(map.voxel_from(origin, IVec3::new(10, 2, 3)), stone());
    }

    #[test]
    fn test_write_mirrors_into_neighbor_padding() {
        let mut map = map_with_cube();
        map.set_voxel(IVec3::new(7, 0, 0), stone(), true).unwrap();
        let east = map.get(ChunkCoord::new(8, 0, 0)).unwrap();
        assert_eq!(east.store.get(IVec3::new(-1, 0, 0)), stone());
        assert_eq!(east.store.modified_count(), 0, "mirror is not an edit");

        let owner = map.get(ChunkCoord::new(0, 0, 0)).unwrap();
        assert!(owner.store.is_modified(IVec3::new(7, 0, 0)));
    }

    #[test]
    fn test_observers_for_corner_voxel() {
        let map = map_with_cube();
        let obs = map.observers(IVec3::new(0, 0, 0));
        assert_eq!(obs.len(), 8);
        assert_eq!(obs[0], ChunkCoord::new(0, 0, 0));
        assert!(obs.contains(&ChunkCoord::new(-8, -8, -8)));

        assert_eq!(map.observers(IVec3::new(3, 3, 3)).len(), 1);
        assert_eq!(map.observers(IVec3::new(7, 3, 3)).len(), 2);
        assert_eq!(map.observers(IVec3::new(7, 7, 3)).len(), 4);
    }

    #[test]
    fn test_edit_errors() {
        let mut map = map_with_cube();
        assert_eq!(
            map.set_voxel(IVec3::new(0, 16, 0), stone(), true),
            Err(EditError::OutOfWorld(IVec3::new(0, 16, 0)))
        );
        assert_eq!(
            map.set_voxel(IVec3::new(100, 0, 0), stone(), true),
            Err(EditError::ChunkNotLoaded(ChunkCoord::new(96, 0, 0)))
        );
    }

    #[test]
    fn test_refresh_padding_copies_voxels_and_light() {
        let mut map = map_with_cube();
        let origin = ChunkCoord::new(0, 0, 0);
        // Write straight into the neighbour so no mirror happens.
        let west = ChunkCoord::new(-8, 0, 0);
        map.get_mut(west).unwrap().store.set(IVec3::new(7, 1, 1), stone(), false);
        map.set_light_at(IVec3::new(-1, 2, 2), 99);

        assert!(map.refresh_padding(origin));
        let store = &map.get(origin).unwrap().store;
        assert_eq!(store.get(IVec3::new(-1, 1, 1)), stone());
        assert_eq!(store.light(IVec3::new(-1, 2, 2)), 99);
        // Above the loaded cube (y = 8 is in an unloaded chunk): air, dark.
        assert_eq!(store.light(IVec3::new(0, 8, 0)), 0);
    }

    #[test]
    fn test_light_above_world_is_full() {
        let map = map_with_cube();
        assert_eq!(map.light_at(IVec3::new(0, 16, 0)), MAX_LIGHT);
        assert_eq!(map.light_at(IVec3::new(500, 0, 0)), 0);
    }

    #[test]
    fn test_set_bumps_versions() {
        let mut map = map_with_cube();
        map.set_voxel(IVec3::new(0, 0, 0), stone(), false).unwrap();
        assert_eq!(map.get(ChunkCoord::new(0, 0, 0)).unwrap().version(), 1);
        assert_eq!(map.get(ChunkCoord::new(-8, 0, 0)).unwrap().version(), 1);
        // Same value again: nothing changes.
        map.set_voxel(IVec3::new(0, 0, 0), stone(), false).unwrap();
        assert_eq!(map.get(ChunkCoord::new(0, 0, 0)).unwrap().version(), 1);
    }
}
