//! The calls the engine makes outward.

use glam::{Vec3, Vec4};
use lattice_mesh::{CollisionMesh, RenderMesh};
use lattice_voxel::ChunkCoord;
use rustc_hash::{FxHashMap, FxHashSet};

/// Host integration points.
///
/// Every method is called from the coordinating thread, inside
/// [`crate::VoxelWorld::tick`].
pub trait Host {
    /// Viewer position in world space.
    fn viewer_position(&self) -> Vec3;

    /// Six inward-facing frustum planes (left, right, bottom, top, near,
    /// far), or `None` to treat the whole load window as visible.
    fn frustum_planes(&self) -> Option<[Vec4; 6]> {
        None
    }

    /// Replaces the render geometry of the chunk anchored at `coord`.
    fn commit_geometry(&mut self, coord: ChunkCoord, mesh: &RenderMesh);

    /// Replaces the collision geometry of the chunk anchored at `coord`.
    fn commit_collision(&mut self, _coord: ChunkCoord, _mesh: &CollisionMesh) {}

    /// The chunk left the collision radius; drop its collision geometry.
    fn remove_collision(&mut self, _coord: ChunkCoord) {}

    /// The chunk was removed; drop anything attached to it.
    fn remove_geometry(&mut self, coord: ChunkCoord);

    /// Visibility or level of detail of a chunk changed.
    fn set_visibility(&mut self, _coord: ChunkCoord, _visible: bool, _lod: u8) {}
}

/// Summary of one committed render mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommittedMesh {
    /// Number of buffers.
    pub buffers: usize,
    /// Number of quads.
    pub quads: usize,
}

/// Headless host that records what the engine commits.
#[derive(Debug, Default)]
pub struct RecordingHost {
    /// Viewer position reported to the engine.
    pub viewer: Vec3,
    /// Frustum reported to the engine.
    pub frustum: Option<[Vec4; 6]>,
    /// Latest render geometry per chunk.
    pub geometry: FxHashMap<ChunkCoord, CommittedMesh>,
    /// Latest collision triangle count per chunk.
    pub collision: FxHashMap<ChunkCoord, usize>,
    /// Chunks currently flagged visible.
    pub visible: FxHashSet<ChunkCoord>,
    /// Render commits per chunk since creation of the host.
    pub commit_counts: FxHashMap<ChunkCoord, u32>,
    /// Every removal, in order.
    pub removed: Vec<ChunkCoord>,
}

impl RecordingHost {
    /// Host with the viewer at `viewer` and no frustum.
    pub fn at(viewer: Vec3) -> Self {
        Self {
            viewer,
            ..Self::default()
        }
    }

    /// Render commits received for `coord`.
    pub fn commits_for(&self, coord: ChunkCoord) -> u32 {
        self.commit_counts.get(&coord).copied().unwrap_or(0)
    }
}

impl Host for RecordingHost {
    fn viewer_position(&self) -> Vec3 {
        self.viewer
    }

    fn frustum_planes(&self) -> Option<[Vec4; 6]> {
        self.frustum
    }

    fn commit_geometry(&mut self, coord: ChunkCoord, mesh: &RenderMesh) {
        self.geometry.insert(
            coord,
            CommittedMesh {
                buffers: mesh.buffers.len(),
                quads: mesh.quad_count(),
            },
        );
        *self.commit_counts.entry(coord).or_insert(0) += 1;
    }

    fn commit_collision(&mut self, coord: ChunkCoord, mesh: &CollisionMesh) {
        self.collision.insert(coord, mesh.triangle_count());
    }

    fn remove_collision(&mut self, coord: ChunkCoord) {
        self.collision.remove(&coord);
    }

    fn remove_geometry(&mut self, coord: ChunkCoord) {
        self.geometry.remove(&coord);
        self.collision.remove(&coord);
        self.visible.remove(&coord);
        self.removed.push(coord);
    }

    fn set_visibility(&mut self, coord: ChunkCoord, visible: bool, _lod: u8) {
        if visible {
            self.visible.insert(coord);
        } else {
            self.visible.remove(&coord);
        }
    }
}
