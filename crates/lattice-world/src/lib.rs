//! The Lattice world: terrain sources, background generation, the chunk
//! lifecycle driver, the host interface and the tick loop.

pub mod error;
pub mod generation;
pub mod host;
pub mod scheduler;
pub mod stats;
pub mod terrain;
pub mod world;

pub use error::TerrainError;
pub use generation::{
    GeneratedChunk, GenerationContext, GenerationPipeline, GenerationTask, generate_chunk,
};
pub use host::{CommittedMesh, Host, RecordingHost};
pub use scheduler::{MAX_FRAME_TIME, Scheduler};
pub use stats::TickStats;
pub use terrain::{
    FALLBACK_TERRAIN, FlatTerrain, NoiseTerrain, StructureWriter, TerrainFactory, TerrainPalette,
    TerrainParams, TerrainRegistry, TerrainSource,
};
pub use world::VoxelWorld;
