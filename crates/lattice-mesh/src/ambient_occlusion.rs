//! Per-vertex voxel ambient occlusion.
//!
//! Every face vertex looks at the layer of voxels just outside the face. Of
//! the eight voxels surrounding the face in that layer, each vertex samples
//! the two edge neighbours that touch it and the diagonal between them.

/// Index of each neighbour in an 8-entry ring.
///
/// The same order is used for connected-texture masks.
pub mod ring {
    /// +v.
    pub const N: usize = 0;
    /// +u.
    pub const E: usize = 1;
    /// −v.
    pub const S: usize = 2;
    /// −u.
    pub const W: usize = 3;
    /// +u +v.
    pub const NE: usize = 4;
    /// +u −v.
    pub const SE: usize = 5;
    /// −u −v.
    pub const SW: usize = 6;
    /// −u +v.
    pub const NW: usize = 7;

    /// `(du, dv)` offset of each ring slot.
    pub const OFFSETS: [(i32, i32); 8] = [
        (0, 1),
        (1, 0),
        (0, -1),
        (-1, 0),
        (1, 1),
        (1, -1),
        (-1, -1),
        (-1, 1),
    ];
}

/// Compute the ambient occlusion value for a single vertex.
///
/// Returns a value in `0..=3`:
/// - `0` = fully exposed (brightest)
/// - `3` = fully occluded (darkest)
///
/// Two solid edge neighbours occlude fully regardless of the diagonal.
pub fn vertex_ao(side1: bool, side2: bool, corner: bool) -> u8 {
    if side1 && side2 {
        3
    } else {
        (side1 as u8) + (side2 as u8) + (corner as u8)
    }
}

/// `(side1, side2, corner)` ring slots for each quad vertex, in the vertex
/// order of [`crate::FaceDirection::quad_corners`] (SW, SE, NE, NW).
const VERTEX_SLOTS: [(usize, usize, usize); 4] = [
    (ring::W, ring::S, ring::SW),
    (ring::S, ring::E, ring::SE),
    (ring::E, ring::N, ring::NE),
    (ring::N, ring::W, ring::NW),
];

/// AO for quad vertex `vertex` (0..4) given the solidity of the 8-neighbour ring.
pub fn corner_ao(solid: [bool; 8], vertex: usize) -> u8 {
    let (s1, s2, c) = VERTEX_SLOTS[vertex & 3];
    vertex_ao(solid[s1], solid[s2], solid[c])
}

/// AO for all four vertices of a face.
pub fn face_ao(solid: [bool; 8]) -> [u8; 4] {
    [
        corner_ao(solid, 0),
        corner_ao(solid, 1),
        corner_ao(solid, 2),
        corner_ao(solid, 3),
    ]
}

/// Whether to split the quad along the other diagonal so interpolation
/// follows the darker corners.
pub fn should_flip_ao_diagonal(ao: [u8; 4]) -> bool {
    ao[0] + ao[2] > ao[1] + ao[3]
}
