//! The six directions a voxel face can point, with the in-plane frame used
//! for AO sampling, connected-texture lookups and quad winding.

use glam::{IVec3, Vec3};

/// One of the six cardinal directions a voxel face can point.
///
/// The `repr(u8)` discriminant is the index used by directional textures and
/// the packed normal in [`crate::MeshVertex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaceDirection {
    /// +X direction.
    PosX = 0,
    /// −X direction.
    NegX = 1,
    /// +Y direction.
    PosY = 2,
    /// −Y direction.
    NegY = 3,
    /// +Z direction.
    PosZ = 4,
    /// −Z direction.
    NegZ = 5,
}

impl FaceDirection {
    /// All six directions in order.
    pub const ALL: [FaceDirection; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Unit normal.
    pub fn normal(self) -> IVec3 {
        match self {
            Self::PosX => IVec3::X,
            Self::NegX => IVec3::NEG_X,
            Self::PosY => IVec3::Y,
            Self::NegY => IVec3::NEG_Y,
            Self::PosZ => IVec3::Z,
            Self::NegZ => IVec3::NEG_Z,
        }
    }

    /// In-plane frame `(u, v)` with `u × v == normal`.
    ///
    /// `+u` is "east" and `+v` is "north" for the 8-neighbour ring used by
    /// AO and connected textures, and quad vertices are emitted
    /// counter-clockwise in this frame.
    pub fn tangents(self) -> (IVec3, IVec3) {
        match self {
            Self::PosX => (IVec3::NEG_Z, IVec3::Y),
            Self::NegX => (IVec3::Z, IVec3::Y),
            Self::PosY => (IVec3::X, IVec3::NEG_Z),
            Self::NegY => (IVec3::X, IVec3::Z),
            Self::PosZ => (IVec3::X, IVec3::Y),
            Self::NegZ => (IVec3::NEG_X, IVec3::Y),
        }
    }

    /// Returns the opposite face direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
            Self::PosZ => Self::NegZ,
            Self::NegZ => Self::PosZ,
        }
    }

    /// Direction index (0–5).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decodes a packed normal byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// The four quad corners of this face on the voxel at `pos`, in
    /// counter-clockwise order: (-u,-v), (+u,-v), (+u,+v), (-u,+v).
    pub fn quad_corners(self, pos: IVec3) -> [Vec3; 4] {
        let (u, v) = self.tangents();
        let (u, v) = (u.as_vec3() * 0.5, v.as_vec3() * 0.5);
        let center = pos.as_vec3() + Vec3::splat(0.5) + self.normal().as_vec3() * 0.5;
        [center - u - v, center + u - v, center + u + v, center - u + v]
    }
}
