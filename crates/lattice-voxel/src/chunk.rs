//! A chunk: padded block grid plus lifecycle bookkeeping.

use crate::coord::ChunkCoord;
use crate::state::ChunkState;
use crate::store::BlockStore;

/// One chunk of the world.
#[derive(Clone, Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    /// Voxels, light and modified set.
    pub store: BlockStore,
    state: ChunkState,
    /// Geometry must be rebuilt. Sticky until a mesh built from the current
    /// version is committed.
    pub update_requested: bool,
    /// Streaming wants geometry for this chunk. Chunks created only to satisfy
    /// a neighbour's dependency leave this unset.
    pub mesh_wanted: bool,
    /// Streaming wants collision geometry for this chunk.
    pub collision_wanted: bool,
    /// Currently visible according to the last frustum pass.
    pub visible: bool,
    /// Level of detail assigned by the clipmap.
    pub lod: u8,
    /// Ticket of the background job currently allowed to deliver results.
    pub job_ticket: u64,
    /// Bumped on every voxel or light change.
    version: u64,
    /// Streaming asked for removal; honoured once pending work settles.
    pub removal_requested: bool,
}

impl Chunk {
    /// New chunk in [`ChunkState::Created`] with an empty grid.
    pub fn new(coord: ChunkCoord, edge: u32) -> Self {
        Self {
            coord,
            store: BlockStore::new(edge),
            state: ChunkState::Created,
            update_requested: false,
            mesh_wanted: false,
            collision_wanted: false,
            visible: false,
            lod: 0,
            job_ticket: 0,
            version: 0,
            removal_requested: false,
        }
    }

    /// Anchor of this chunk.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Moves to `next` if the transition is legal.
    ///
    /// Illegal transitions are refused with a warning and leave the state
    /// unchanged.
    pub fn transition(&mut self, next: ChunkState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "chunk {}: refused transition {} -> {}",
                self.coord,
                self.state,
                next
            );
            return false;
        }
        tracing::trace!("chunk {}: {} -> {}", self.coord, self.state, next);
        self.state = next;
        true
    }

    /// Data version, used to discard mesh results built from stale data.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Records a data change.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_defaults() {
        let c = Chunk::new(ChunkCoord::new(16, 0, 0), 16);
        assert_eq!(c.state(), ChunkState::Created);
        assert_eq!(c.store.edge(), 16);
        assert!(!c.mesh_wanted);
        assert_eq!(c.version(), 0);
    }

    #[test]
    fn test_transition_refuses_illegal() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0), 8);
        assert!(c.transition(ChunkState::GeneratingTerrain));
        assert!(!c.transition(ChunkState::Created));
        assert_eq!(c.state(), ChunkState::GeneratingTerrain);
        assert!(!c.transition(ChunkState::PendingRemoval));
        assert!(c.transition(ChunkState::Saving));
        assert!(c.transition(ChunkState::PendingRemoval));
    }

    #[test]
    fn test_version_bumps() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0), 8);
        c.bump_version();
        c.bump_version();
        assert_eq!(c.version(), 2);
    }
}
