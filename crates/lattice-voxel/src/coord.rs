//! Chunk coordinates.
//!
//! A [`ChunkCoord`] is the world-space position of a chunk's minimum corner,
//! always a multiple of the chunk edge length. The same value is used as the
//! map key and as the render anchor handed to the host.

use glam::IVec3;

/// World-space anchor of a chunk (multiple of the edge length on every axis).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Anchor X in voxels.
    pub x: i32,
    /// Anchor Y in voxels.
    pub y: i32,
    /// Anchor Z in voxels.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a coordinate from an anchor. The caller guarantees alignment.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing world voxel `pos`.
    pub fn containing(pos: IVec3, edge: i32) -> Self {
        Self {
            x: pos.x.div_euclid(edge) * edge,
            y: pos.y.div_euclid(edge) * edge,
            z: pos.z.div_euclid(edge) * edge,
        }
    }

    /// Builds a coordinate from chunk-grid indices.
    pub fn from_grid(grid: IVec3, edge: i32) -> Self {
        Self::new(grid.x * edge, grid.y * edge, grid.z * edge)
    }

    /// Chunk-grid indices (anchor divided by the edge).
    pub fn grid(self, edge: i32) -> IVec3 {
        IVec3::new(
            self.x.div_euclid(edge),
            self.y.div_euclid(edge),
            self.z.div_euclid(edge),
        )
    }

    /// Anchor as a vector.
    pub fn anchor(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Neighbour offset by whole chunks.
    pub fn offset(self, dx: i32, dy: i32, dz: i32, edge: i32) -> Self {
        Self::new(self.x + dx * edge, self.y + dy * edge, self.z + dz * edge)
    }

    /// The 26 chunks touching this one by face, edge or corner.
    pub fn neighbors(self, edge: i32) -> impl Iterator<Item = ChunkCoord> {
        (-1..=1).flat_map(move |dz| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dx| {
                    if dx == 0 && dy == 0 && dz == 0 {
                        None
                    } else {
                        Some(self.offset(dx, dy, dz, edge))
                    }
                })
            })
        })
    }

    /// World position to chunk-local position (may be negative or `>= edge`).
    pub fn to_local(self, world: IVec3) -> IVec3 {
        world - self.anchor()
    }

    /// Chunk-local position to world position.
    pub fn to_world(self, local: IVec3) -> IVec3 {
        self.anchor() + local
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containing_floors_negative() {
        assert_eq!(ChunkCoord::containing(IVec3::new(-1, 0, 15), 16), ChunkCoord::new(-16, 0, 0));
        assert_eq!(ChunkCoord::containing(IVec3::new(-16, -17, 16), 16), ChunkCoord::new(-16, -32, 16));
    }

    #[test]
    fn test_grid_roundtrip() {
        let c = ChunkCoord::new(-32, 48, 0);
        assert_eq!(c.grid(16), IVec3::new(-2, 3, 0));
        assert_eq!(ChunkCoord::from_grid(c.grid(16), 16), c);
    }

    #[test]
    fn test_neighbors_count_and_exclusion() {
        let c = ChunkCoord::new(0, 0, 0);
        let n: Vec<_> = c.neighbors(8).collect();
        assert_eq!(n.len(), 26);
        assert!(!n.contains(&c));
        assert!(n.contains(&ChunkCoord::new(-8, 8, 8)));
    }

    #[test]
    fn test_local_world_translation() {
        let c = ChunkCoord::new(16, 0, -16);
        let w = IVec3::new(17, 3, -1);
        assert_eq!(c.to_local(w), IVec3::new(1, 3, 15));
        assert_eq!(c.to_world(c.to_local(w)), w);
    }

    #[test]
    fn test_display_matches_save_name() {
        assert_eq!(ChunkCoord::new(-16, 0, 32).to_string(), "-16,0,32");
    }
}
