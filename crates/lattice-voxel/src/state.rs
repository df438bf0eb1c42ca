//! Chunk lifecycle states and their legal transitions.

/// Where a chunk is in its lifecycle.
///
/// States only move forward, with two exceptions: `Ready` may re-enter
/// `BuildingRenderGeometry` after an edit, and any state short of
/// `PendingRemoval` may jump to `Saving` when streaming drops the chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkState {
    /// Registered by streaming, nothing generated yet.
    Created,
    /// Terrain job in flight.
    GeneratingTerrain,
    /// Terrain done; structure placement running.
    GeneratingStructures,
    /// Generated; waiting for all 26 neighbours to finish terrain.
    AwaitingNeighbors,
    /// Collision mesh being built.
    BuildingCollisionGeometry,
    /// Render mesh being built.
    BuildingRenderGeometry,
    /// Geometry committed to the host.
    Ready,
    /// Modified voxels being written out.
    Saving,
    /// Saved; may be dropped from the map.
    PendingRemoval,
}

impl ChunkState {
    /// Terrain generation has finished, so the chunk's voxels can be read by
    /// neighbours.
    pub fn has_terrain(self) -> bool {
        matches!(
            self,
            ChunkState::GeneratingStructures
                | ChunkState::AwaitingNeighbors
                | ChunkState::BuildingCollisionGeometry
                | ChunkState::BuildingRenderGeometry
                | ChunkState::Ready
        )
    }

    /// The chunk is being torn down.
    pub fn is_leaving(self) -> bool {
        matches!(self, ChunkState::Saving | ChunkState::PendingRemoval)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ChunkState) -> bool {
        use ChunkState::*;
        match (self, next) {
            (PendingRemoval, _) => false,
            (Saving, PendingRemoval) => true,
            (Saving, _) => false,
            (_, Saving) => true,
            (Ready, BuildingRenderGeometry) => true,
            (_, PendingRemoval) => false,
            (from, to) => to > from,
        }
    }
}

impl std::fmt::Display for ChunkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkState::*;

    #[test]
    fn test_forward_path() {
        let path = [
            Created,
            GeneratingTerrain,
            GeneratingStructures,
            AwaitingNeighbors,
            BuildingCollisionGeometry,
            BuildingRenderGeometry,
            Ready,
            Saving,
            PendingRemoval,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_ready_reenters_render_build() {
        assert!(Ready.can_transition_to(BuildingRenderGeometry));
        assert!(BuildingRenderGeometry.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(AwaitingNeighbors));
    }

    #[test]
    fn test_any_live_state_can_save() {
        for s in [Created, GeneratingTerrain, GeneratingStructures, AwaitingNeighbors, Ready] {
            assert!(s.can_transition_to(Saving));
        }
        assert!(!PendingRemoval.can_transition_to(Saving));
    }

    #[test]
    fn test_removal_requires_save() {
        assert!(!Ready.can_transition_to(PendingRemoval));
        assert!(!Created.can_transition_to(PendingRemoval));
        assert!(Saving.can_transition_to(PendingRemoval));
        assert!(!Saving.can_transition_to(Ready));
    }

    #[test]
    fn test_no_backwards_moves() {
        assert!(!AwaitingNeighbors.can_transition_to(GeneratingTerrain));
        assert!(!GeneratingTerrain.can_transition_to(Created));
        assert!(!Ready.can_transition_to(Ready));
    }

    #[test]
    fn test_has_terrain() {
        assert!(!Created.has_terrain());
        assert!(!GeneratingTerrain.has_terrain());
        assert!(GeneratingStructures.has_terrain());
        assert!(Ready.has_terrain());
        assert!(!Saving.has_terrain());
    }
}
