//! Chunk geometry: face culling, per-vertex ambient occlusion, texture
//! selection (including connected textures), capped per-material batching,
//! collision meshes and the background meshing pipeline.

pub mod ambient_occlusion;
pub mod async_mesh;
pub mod batch;
pub mod connected;
pub mod face_direction;
pub mod mesher;
pub mod pool;
pub mod texture;

pub use ambient_occlusion::{corner_ao, should_flip_ao_diagonal, vertex_ao};
pub use async_mesh::{MeshingPipeline, MeshingResult, MeshingTask};
pub use batch::{CollisionMesh, MAX_VERTICES_PER_BUFFER, MeshBatcher, MeshBuffer, MeshVertex, RenderMesh};
pub use connected::{CONNECTED_TILE_COUNT, connected_tile, neighbor_mask};
pub use face_direction::FaceDirection;
pub use mesher::{build_collision_mesh, build_render_mesh};
pub use pool::{MeshScratch, ScratchGuard, ScratchPool};
pub use texture::{position_hash, select_texture};
