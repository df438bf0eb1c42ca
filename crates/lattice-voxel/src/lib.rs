//! Block storage for the Lattice engine: packed voxel records, the block
//! table, padded per-chunk grids, the chunk lifecycle state and the world map
//! that ties chunks together across boundaries.

pub mod chunk;
pub mod coord;
pub mod map;
pub mod registry;
pub mod state;
pub mod store;
pub mod voxel;

pub use chunk::Chunk;
pub use coord::ChunkCoord;
pub use map::{ChunkMap, EditError, WorldBounds};
pub use registry::{BlockDef, BlockRegistry, RegistryError, TextureMode};
pub use state::ChunkState;
pub use store::BlockStore;
pub use voxel::{BlockId, MAX_BLOCK_ID, MAX_LIGHT, Voxel};
