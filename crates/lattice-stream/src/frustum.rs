//! View frustum and AABB classification.
//!
//! The host reports six planes (or a view-projection matrix); streaming uses
//! them to classify whole boxes of chunks as outside, inside or straddling
//! the frustum.

use glam::{Mat4, Vec3, Vec4};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Vec3,
    /// Maximum corner of the bounding box.
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the half-extents (half-size along each axis).
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

/// How a box relates to the frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    /// Entirely behind at least one plane.
    Outside,
    /// Entirely in front of every plane.
    Inside,
    /// Crosses at least one plane.
    Intersecting,
}

/// A view frustum defined by six inward-pointing planes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    /// Six planes: left, right, bottom, top, near, far.
    /// Each `Vec4(a, b, c, d)` where `(a,b,c)` is the normalized inward
    /// normal and `d` is the signed distance term.
    planes: [Vec4; 6],
}

impl Frustum {
    /// Builds a frustum from six inward-facing planes as reported by the host.
    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        let mut planes = planes;
        normalize(&mut planes);
        Self { planes }
    }

    /// Extract frustum planes from a combined view-projection matrix
    /// using the Griggs-Hartmann method, for a `[0, 1]` depth range.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];
        normalize(&mut planes);

        Self { planes }
    }

    /// The normalized planes.
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Classifies an AABB against all six planes.
    ///
    /// Uses the p-vertex/n-vertex method. Conservative: boxes near frustum
    /// corners may be reported `Intersecting` while actually outside, but
    /// a visible box is never reported `Outside`.
    pub fn classify(&self, aabb: &Aabb) -> Containment {
        let mut result = Containment::Inside;
        for plane in &self.planes {
            let normal = plane.truncate();
            let d = plane.w;

            // Positive vertex: the corner furthest along the plane normal.
            let p = Vec3::select(normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            if normal.dot(p) + d < 0.0 {
                return Containment::Outside;
            }
            let n = Vec3::select(normal.cmpge(Vec3::ZERO), aabb.min, aabb.max);
            if normal.dot(n) + d < 0.0 {
                result = Containment::Intersecting;
            }
        }
        result
    }

    /// Test whether an AABB is at least partially inside the frustum.
    pub fn is_visible(&self, aabb: &Aabb) -> bool {
        self.classify(aabb) != Containment::Outside
    }
}

fn normalize(planes: &mut [Vec4; 6]) {
    for plane in planes {
        let len = plane.truncate().length();
        if len > 0.0 {
            *plane /= len;
        }
    }
}
