//! Per-material vertex/index buffers with a 16-bit index cap.
//!
//! A buffer never holds more than [`MAX_VERTICES_PER_BUFFER`] vertices so
//! every index fits in a `u16`. When a quad would overflow the open buffer
//! for its material, a fresh buffer is opened and indices restart at zero.
//! One chunk may therefore produce several buffers per material.

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::face_direction::FaceDirection;

/// Largest vertex count a single buffer may hold.
pub const MAX_VERTICES_PER_BUFFER: usize = 65_534;

/// Render vertex, 28 bytes, ready for upload.
///
/// Layout:
///   - `position` chunk-local, in voxels
///   - `uv` per-quad corner coordinates
///   - `texture` texture/atlas slot
///   - `normal` [`FaceDirection`] index
///   - `ao` ambient occlusion level (0..=3)
///   - `light` face light (0..=255)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    /// Chunk-local position.
    pub position: [f32; 3],
    /// Texture coordinates within the tile.
    pub uv: [f32; 2],
    /// Texture slot.
    pub texture: u32,
    /// Face direction index (0..=5).
    pub normal: u8,
    /// Ambient occlusion level (0..=3).
    pub ao: u8,
    /// Light value sampled outside the face.
    pub light: u8,
    /// Reserved, set to 0.
    pub _pad: u8,
}

static_assertions::assert_eq_size!(MeshVertex, [u8; 28]);

const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

impl MeshVertex {
    /// Decodes the face direction.
    pub fn face_direction(&self) -> Option<FaceDirection> {
        FaceDirection::from_u8(self.normal)
    }
}

/// One capped buffer of a single material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffer {
    /// Material id shared by every face in this buffer.
    pub material: u16,
    /// Vertex data.
    pub vertices: Vec<MeshVertex>,
    /// Triangle list, six indices per quad.
    pub indices: Vec<u16>,
}

impl MeshBuffer {
    fn new(material: u16) -> Self {
        Self {
            material,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Number of quads in this buffer.
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

/// Render geometry for one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderMesh {
    /// Every buffer, grouped by material in emission order.
    pub buffers: Vec<MeshBuffer>,
}

impl RenderMesh {
    /// Buffers holding `material`.
    pub fn buffers_for(&self, material: u16) -> impl Iterator<Item = &MeshBuffer> {
        self.buffers.iter().filter(move |b| b.material == material)
    }

    /// Total vertex count across buffers.
    pub fn vertex_count(&self) -> usize {
        self.buffers.iter().map(|b| b.vertices.len()).sum()
    }

    /// Total quad count across buffers.
    pub fn quad_count(&self) -> usize {
        self.buffers.iter().map(MeshBuffer::quad_count).sum()
    }

    /// No geometry at all.
    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(|b| b.vertices.is_empty())
    }
}

/// Collision geometry: positions and a triangle list, nothing else.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    /// Chunk-local vertex positions.
    pub positions: Vec<Vec3>,
    /// Triangle list.
    pub indices: Vec<u32>,
}

impl CollisionMesh {
    /// Appends one quad (counter-clockwise corners).
    pub fn push_quad(&mut self, corners: [Vec3; 4]) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&corners);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Accumulates quads into capped per-material buffers.
#[derive(Default)]
pub struct MeshBatcher {
    buffers: Vec<MeshBuffer>,
    /// Material -> index of its currently open buffer.
    open: FxHashMap<u16, usize>,
}

impl MeshBatcher {
    /// Creates an empty batcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a quad.
    ///
    /// `corners` are counter-clockwise seen from outside; `ao` is per corner.
    /// The split diagonal follows [`crate::should_flip_ao_diagonal`].
    #[allow(clippy::too_many_arguments)]
    pub fn push_quad(
        &mut self,
        material: u16,
        corners: [Vec3; 4],
        face: FaceDirection,
        texture: u32,
        ao: [u8; 4],
        light: u8,
    ) {
        let slot = match self.open.get(&material) {
            Some(&i) if self.buffers[i].vertices.len() + 4 <= MAX_VERTICES_PER_BUFFER => i,
            _ => {
                self.buffers.push(MeshBuffer::new(material));
                let i = self.buffers.len() - 1;
                self.open.insert(material, i);
                i
            }
        };
        let buffer = &mut self.buffers[slot];
        let base = buffer.vertices.len() as u16;

        for i in 0..4 {
            buffer.vertices.push(MeshVertex {
                position: corners[i].to_array(),
                uv: QUAD_UVS[i],
                texture,
                normal: face as u8,
                ao: ao[i],
                light,
                _pad: 0,
            });
        }

        if crate::ambient_occlusion::should_flip_ao_diagonal(ao) {
            buffer
                .indices
                .extend_from_slice(&[base + 1, base + 2, base + 3, base + 1, base + 3, base]);
        } else {
            buffer
                .indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    /// Finishes batching, dropping buffers that received nothing.
    pub fn finish(self) -> RenderMesh {
        let mut buffers = self.buffers;
        buffers.retain(|b| !b.vertices.is_empty());
        buffers.sort_by_key(|b| b.material);
        RenderMesh { buffers }
    }
}
