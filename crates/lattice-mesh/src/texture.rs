//! Texture selection per face.

use glam::IVec3;
use lattice_voxel::TextureMode;

use crate::connected::{connected_tile, neighbor_mask};
use crate::face_direction::FaceDirection;

/// Stable hash of a world position. Same input, same output, on every run
/// and in every generation order.
pub fn position_hash(pos: IVec3) -> u32 {
    let mut h = (pos.x as u32).wrapping_mul(0x8DA6_B343)
        ^ (pos.y as u32).wrapping_mul(0xD816_3841)
        ^ (pos.z as u32).wrapping_mul(0xCB1A_B31F);
    // murmur3 finaliser
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

/// Picks the texture for one face of the voxel at world position `pos`.
///
/// `same_type` is only evaluated for connected textures and must return the
/// in-plane 8-neighbour ring of "same block type" flags.
pub fn select_texture(
    mode: &TextureMode,
    pos: IVec3,
    face: FaceDirection,
    same_type: impl FnOnce() -> [bool; 8],
) -> u32 {
    match mode {
        TextureMode::Single(t) => *t,
        TextureMode::Directional(faces) => faces[face.index()],
        TextureMode::Weighted(set) => weighted_pick(set, position_hash(pos)),
        TextureMode::Connected { base } => base + connected_tile(neighbor_mask(same_type())) as u32,
    }
}

fn weighted_pick(set: &[(u32, u32)], hash: u32) -> u32 {
    let total: u64 = set.iter().map(|&(_, w)| w as u64).sum();
    if total == 0 {
        return 0;
    }
    let mut roll = hash as u64 % total;
    for &(tex, weight) in set {
        if roll < weight as u64 {
            return tex;
        }
        roll -= weight as u64;
    }
    0
}
