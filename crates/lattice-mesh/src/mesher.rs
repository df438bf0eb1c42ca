//! Face culling and quad emission for one chunk.
//!
//! Meshing reads only the chunk's own padded [`BlockStore`], so the padding
//! border must be refreshed from the neighbours (and lit) before a snapshot
//! is handed over. Every read lands at most one voxel outside the interior.

use glam::IVec3;
use lattice_voxel::{BlockRegistry, BlockStore, ChunkCoord, Voxel};

use crate::ambient_occlusion::{face_ao, ring};
use crate::batch::{CollisionMesh, MeshBatcher, RenderMesh};
use crate::face_direction::FaceDirection;
use crate::pool::MeshScratch;
use crate::texture::select_texture;

/// Whether the face of `voxel` towards `neighbor` is visible.
///
/// Non-solid neighbours always expose the face; solid neighbours expose it
/// only when transparent. Two voxels of the same type hide their shared face
/// when the type is marked solid towards itself.
pub fn face_visible(registry: &BlockRegistry, voxel: Voxel, neighbor: Voxel) -> bool {
    if neighbor.id() == voxel.id() && registry.get(voxel.id()).solid_towards_same_type {
        return false;
    }
    !neighbor.is_solid() || registry.is_transparent(neighbor)
}

fn in_plane(pos: IVec3, face: FaceDirection, layer: i32) -> [IVec3; 8] {
    let (u, v) = face.tangents();
    let base = pos + face.normal() * layer;
    ring::OFFSETS.map(|(du, dv)| base + u * du + v * dv)
}

/// Fills `scratch.face_masks` with a visible-face bitmask per interior voxel.
fn compute_face_masks(
    store: &BlockStore,
    registry: &BlockRegistry,
    scratch: &mut MeshScratch,
    visible: impl Fn(&BlockRegistry, Voxel, Voxel) -> bool,
) {
    let n = store.edge();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let pos = IVec3::new(x, y, z);
                let voxel = store.get(pos);
                let mut mask = 0u8;
                if !voxel.is_air() {
                    for face in FaceDirection::ALL {
                        if visible(registry, voxel, store.get(pos + face.normal())) {
                            mask |= 1 << face.index();
                        }
                    }
                }
                scratch.face_masks[store.interior_index(pos) as usize] = mask;
            }
        }
    }
}

/// Builds render geometry for a chunk.
///
/// `origin` is the chunk's anchor; it seeds position-hashed texture picks so
/// results do not depend on which chunk or thread meshed the voxel.
pub fn build_render_mesh(
    store: &BlockStore,
    registry: &BlockRegistry,
    origin: ChunkCoord,
    scratch: &mut MeshScratch,
) -> RenderMesh {
    compute_face_masks(store, registry, scratch, face_visible);

    let mut batcher = MeshBatcher::new();
    let n = store.edge();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let pos = IVec3::new(x, y, z);
                let mask = scratch.face_masks[store.interior_index(pos) as usize];
                if mask == 0 {
                    continue;
                }
                let voxel = store.get(pos);
                let def = registry.get(voxel.id());

                for face in FaceDirection::ALL {
                    if mask & (1 << face.index()) == 0 {
                        continue;
                    }
                    let occluders = in_plane(pos, face, 1).map(|p| store.get(p).is_solid());
                    let ao = face_ao(occluders);
                    let light = store.light(pos + face.normal());
                    let texture = select_texture(&def.texture, origin.to_world(pos), face, || {
                        in_plane(pos, face, 0).map(|p| store.get(p).id() == voxel.id())
                    });
                    batcher.push_quad(
                        def.material,
                        face.quad_corners(pos),
                        face,
                        texture,
                        ao,
                        light,
                    );
                }
            }
        }
    }
    batcher.finish()
}

/// Builds collision geometry: faces of solid voxels that border non-solid space.
pub fn build_collision_mesh(
    store: &BlockStore,
    registry: &BlockRegistry,
    scratch: &mut MeshScratch,
) -> CollisionMesh {
    compute_face_masks(store, registry, scratch, |_, voxel, neighbor| {
        voxel.is_solid() && !neighbor.is_solid()
    });

    let mut mesh = CollisionMesh::default();
    let n = store.edge();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let pos = IVec3::new(x, y, z);
                let mask = scratch.face_masks[store.interior_index(pos) as usize];
                for face in FaceDirection::ALL {
                    if mask & (1 << face.index()) != 0 {
                        mesh.push_quad(face.quad_corners(pos));
                    }
                }
            }
        }
    }
    mesh
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::MAX_VERTICES_PER_BUFFER;
    use crate::pool::ScratchPool;
    use lattice_voxel::{BlockDef, BlockId, TextureMode};

    struct Blocks {
        registry: BlockRegistry,
        stone: Voxel,
        glass: Voxel,
        leaves: Voxel,
        water: Voxel,
    }

    fn blocks() -> Blocks {
        let mut registry = BlockRegistry::new(128);
        let stone = registry.register(BlockDef::opaque("stone", 1, 1)).unwrap();
        let glass = registry
            .register(BlockDef {
                name: "glass".to_string(),
                solid: true,
                transparent: true,
                light_emission: 0,
                material: 2,
                texture: TextureMode::Connected { base: 64 },
                solid_towards_same_type: true,
            })
            .unwrap();
        let leaves = registry
            .register(BlockDef {
                name: "leaves".to_string(),
                solid: true,
                transparent: true,
                light_emission: 0,
                material: 3,
                texture: TextureMode::Single(5),
                solid_towards_same_type: false,
            })
            .unwrap();
        let water = registry
            .register(BlockDef {
                name: "water".to_string(),
                solid: false,
                transparent: true,
                light_emission: 0,
                material: 4,
                texture: TextureMode::Single(6),
                solid_towards_same_type: true,
            })
            .unwrap();
        Blocks {
            stone: registry.voxel(stone),
            glass: registry.voxel(glass),
            leaves: registry.voxel(leaves),
            water: registry.voxel(water),
            registry,
        }
    }

    fn mesh(store: &BlockStore, registry: &BlockRegistry) -> RenderMesh {
        let pool = ScratchPool::new(1);
        let mut scratch = pool.checkout(store.volume());
        build_render_mesh(store, registry, ChunkCoord::new(0, 0, 0), &mut scratch)
    }

    #[test]
    fn test_single_voxel_has_six_faces() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(3, 3, 3), b.stone, false);
        let m = mesh(&store, &b.registry);
        assert_eq!(m.quad_count(), 6);
        assert_eq!(m.vertex_count(), 24);
    }

    #[test]
    fn test_adjacent_opaque_voxels_cull_shared_face() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(3, 3, 3), b.stone, false);
        store.set(IVec3::new(4, 3, 3), b.stone, false);
        assert_eq!(mesh(&store, &b.registry).quad_count(), 10);
    }

    #[test]
    fn test_transparent_neighbor_exposes_face() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(3, 3, 3), b.stone, false);
        store.set(IVec3::new(4, 3, 3), b.glass, false);
        // Stone: 6 faces. Glass: 5 (its face towards stone is hidden).
        assert_eq!(mesh(&store, &b.registry).quad_count(), 11);
    }

    #[test]
    fn test_same_type_override() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(1, 1, 1), b.glass, false);
        store.set(IVec3::new(2, 1, 1), b.glass, false);
        assert_eq!(mesh(&store, &b.registry).quad_count(), 10, "glass joins");

        let mut store = BlockStore::new(8);
        store.set(IVec3::new(1, 1, 1), b.leaves, false);
        store.set(IVec3::new(2, 1, 1), b.leaves, false);
        assert_eq!(mesh(&store, &b.registry).quad_count(), 12, "leaves keep inner faces");

        let mut store = BlockStore::new(8);
        store.set(IVec3::new(1, 1, 1), b.water, false);
        store.set(IVec3::new(2, 1, 1), b.water, false);
        assert_eq!(mesh(&store, &b.registry).quad_count(), 10, "non-solid same type joins");
    }

    #[test]
    fn test_padding_hides_border_face() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(7, 0, 0), b.stone, false);
        store.set(IVec3::new(8, 0, 0), b.stone, false);
        // Padding voxel itself is never meshed and hides the +X face.
        assert_eq!(mesh(&store, &b.registry).quad_count(), 5);
    }

    #[test]
    fn test_ao_darkens_corner_next_to_wall() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(3, 3, 3), b.stone, false);
        // Block above-west of the top face.
        store.set(IVec3::new(2, 4, 3), b.stone, false);
        let m = mesh(&store, &b.registry);
        let top: Vec<_> = m
            .buffers
            .iter()
            .flat_map(|buf| buf.vertices.iter())
            .filter(|v| v.face_direction() == Some(FaceDirection::PosY) && v.position[1] == 4.0)
            .filter(|v| v.position[0] < 4.0 && v.position[2] >= 3.0 && v.position[2] <= 4.0)
            .collect();
        // The stone at (3,3,3) has a top face with two west corners at x = 3.
        let west: Vec<_> = top.iter().filter(|v| v.position[0] == 3.0).collect();
        assert_eq!(west.len(), 2);
        assert!(west.iter().all(|v| v.ao >= 1));
    }

    #[test]
    fn test_face_light_sampled_outside() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(3, 3, 3), b.stone, false);
        store.set_light(IVec3::new(3, 4, 3), 222);
        let m = mesh(&store, &b.registry);
        let top = m
            .buffers
            .iter()
            .flat_map(|buf| buf.vertices.iter())
            .find(|v| v.face_direction() == Some(FaceDirection::PosY))
            .unwrap();
        assert_eq!(top.light, 222);
    }

    #[test]
    fn test_connected_texture_uses_in_plane_neighbors() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        // A lone glass voxel: no same-type neighbours, tile 0.
        store.set(IVec3::new(3, 3, 3), b.glass, false);
        let m = mesh(&store, &b.registry);
        assert!(m.buffers_for(2).flat_map(|b| b.vertices.iter()).all(|v| v.texture == 64));

        // Surround it in the XZ plane: the top face sees all 8 neighbours.
        for dx in -1..=1 {
            for dz in -1..=1 {
                store.set(IVec3::new(3 + dx, 3, 3 + dz), b.glass, false);
            }
        }
        let m = mesh(&store, &b.registry);
        let centre_top = m
            .buffers_for(2)
            .flat_map(|b| b.vertices.iter())
            .find(|v| {
                v.face_direction() == Some(FaceDirection::PosY)
                    && v.position == [3.0, 4.0, 4.0]
                    && v.uv == [0.0, 0.0]
            })
            .unwrap();
        assert_eq!(centre_top.texture, 64 + 46);
    }

    #[test]
    fn test_full_exposed_chunk_splits_buffers() {
        let b = blocks();
        let edge = 16;
        let mut store = BlockStore::new(edge);
        for z in 0..edge as i32 {
            for y in 0..edge as i32 {
                for x in 0..edge as i32 {
                    store.set(IVec3::new(x, y, z), b.leaves, false);
                }
            }
        }
        let m = mesh(&store, &b.registry);
        let expected = (edge * edge * edge * 6 * 4) as usize;
        assert!(expected > MAX_VERTICES_PER_BUFFER);
        assert_eq!(m.vertex_count(), expected);

        let leaf_buffers: Vec<_> = m.buffers_for(3).collect();
        assert!(leaf_buffers.len() > 1, "one material must span several buffers");
        for buf in leaf_buffers {
            assert!(buf.vertices.len() <= MAX_VERTICES_PER_BUFFER);
            let max_index = buf.indices.iter().copied().max().unwrap() as usize;
            assert!(max_index < buf.vertices.len());
        }
    }

    #[test]
    fn test_collision_mesh_ignores_non_solid() {
        let b = blocks();
        let mut store = BlockStore::new(8);
        store.set(IVec3::new(1, 1, 1), b.stone, false);
        store.set(IVec3::new(5, 5, 5), b.water, false);
        let pool = ScratchPool::new(1);
        let mut scratch = pool.checkout(store.volume());
        let c = build_collision_mesh(&store, &b.registry, &mut scratch);
        assert_eq!(c.triangle_count(), 12);
    }

    #[test]
    fn test_empty_chunk_has_no_geometry() {
        let b = blocks();
        let store = BlockStore::new(8);
        assert!(mesh(&store, &b.registry).is_empty());
        assert_eq!(Voxel::AIR.id(), BlockId::AIR);
    }
}
