//! Dense per-chunk voxel grid with a one-voxel padding border.
//!
//! The grid covers local coordinates `-1..=edge` on every axis. The interior
//! `0..edge` is authoritative; the border mirrors the neighbouring chunks so
//! meshing and AO can read one voxel past the chunk edge without a map
//! lookup. A parallel light grid uses the same layout.
//!
//! [`BlockStore`] never relights or remeshes on its own. Callers decide what
//! to do after a write.

use glam::IVec3;
use rustc_hash::FxHashSet;

use crate::voxel::Voxel;

/// Padded voxel and light grid for one chunk.
#[derive(Clone, Debug)]
pub struct BlockStore {
    edge: i32,
    /// `edge + 2`.
    padded: i32,
    voxels: Vec<Voxel>,
    light: Vec<u8>,
    /// Interior linear indices (see [`BlockStore::interior_index`]) edited
    /// since generation.
    modified: FxHashSet<u32>,
}

impl BlockStore {
    /// Creates an all-air, unlit grid for a chunk with the given edge length.
    pub fn new(edge: u32) -> Self {
        let edge = edge as i32;
        let padded = edge + 2;
        let len = (padded * padded * padded) as usize;
        Self {
            edge,
            padded,
            voxels: vec![Voxel::AIR; len],
            light: vec![0; len],
            modified: FxHashSet::default(),
        }
    }

    /// Edge length in voxels (without padding).
    pub fn edge(&self) -> i32 {
        self.edge
    }

    /// Number of interior voxels.
    pub fn volume(&self) -> usize {
        (self.edge * self.edge * self.edge) as usize
    }

    /// `local` lies in the interior or the padding border.
    #[inline]
    pub fn contains(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::splat(-1)).all() && local.cmple(IVec3::splat(self.edge)).all()
    }

    /// `local` lies in the interior.
    #[inline]
    pub fn is_interior(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::ZERO).all() && local.cmplt(IVec3::splat(self.edge)).all()
    }

    #[inline]
    fn index(&self, local: IVec3) -> usize {
        let p = self.padded;
        ((local.x + 1) + p * ((local.y + 1) + p * (local.z + 1))) as usize
    }

    /// Linear interior index, X fastest then Y then Z.
    #[inline]
    pub fn interior_index(&self, local: IVec3) -> u32 {
        let n = self.edge;
        (local.x + n * (local.y + n * local.z)) as u32
    }

    /// Inverse of [`BlockStore::interior_index`].
    #[inline]
    pub fn interior_local(&self, index: u32) -> IVec3 {
        let n = self.edge;
        let i = index as i32;
        IVec3::new(i % n, (i / n) % n, i / (n * n))
    }

    /// Voxel at `local`. Returns air (with a warning) outside the padded grid.
    #[inline]
    pub fn get(&self, local: IVec3) -> Voxel {
        if !self.contains(local) {
            tracing::warn!("BlockStore::get out of bounds: {}", local);
            return Voxel::AIR;
        }
        self.voxels[self.index(local)]
    }

    /// Writes a voxel. Returns `true` if the stored value changed.
    ///
    /// `mark_modified` records interior cells for persistence; padding cells
    /// are mirrors and are never recorded. Out-of-range writes are ignored
    /// with a warning.
    pub fn set(&mut self, local: IVec3, voxel: Voxel, mark_modified: bool) -> bool {
        if !self.contains(local) {
            tracing::warn!("BlockStore::set out of bounds: {}", local);
            return false;
        }
        if mark_modified && self.is_interior(local) {
            let i = self.interior_index(local);
            self.modified.insert(i);
        }
        let idx = self.index(local);
        let changed = self.voxels[idx] != voxel;
        self.voxels[idx] = voxel;
        changed
    }

    /// Light at `local`, 0 outside the padded grid.
    #[inline]
    pub fn light(&self, local: IVec3) -> u8 {
        if !self.contains(local) {
            return 0;
        }
        self.light[self.index(local)]
    }

    /// Writes a light value. Returns `true` if it changed.
    pub fn set_light(&mut self, local: IVec3, value: u8) -> bool {
        if !self.contains(local) {
            tracing::warn!("BlockStore::set_light out of bounds: {}", local);
            return false;
        }
        let idx = self.index(local);
        let changed = self.light[idx] != value;
        self.light[idx] = value;
        changed
    }

    /// Interior cells edited since generation, as local positions.
    pub fn modified(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.modified.iter().map(|&i| self.interior_local(i))
    }

    /// Sorted interior indices of edited cells.
    pub fn modified_indices(&self) -> Vec<u32> {
        let mut v: Vec<u32> = self.modified.iter().copied().collect();
        v.sort_unstable();
        v
    }

    /// Number of edited cells.
    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    /// Whether `local` has been edited since generation.
    pub fn is_modified(&self, local: IVec3) -> bool {
        self.is_interior(local) && self.modified.contains(&self.interior_index(local))
    }

    /// Forgets every edit (after a save or after applying a loaded save).
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    /// Interior voxels in interior-index order.
    pub fn interior_records(&self) -> Vec<Voxel> {
        let mut out = Vec::with_capacity(self.volume());
        for z in 0..self.edge {
            for y in 0..self.edge {
                for x in 0..self.edge {
                    out.push(self.voxels[self.index(IVec3::new(x, y, z))]);
                }
            }
        }
        out
    }

    /// Replaces the interior from records in interior-index order.
    ///
    /// Returns `false` and leaves the grid untouched on a length mismatch.
    pub fn load_interior(&mut self, records: &[Voxel]) -> bool {
        if records.len() != self.volume() {
            tracing::warn!(
                "BlockStore::load_interior: expected {} records, got {}",
                self.volume(),
                records.len()
            );
            return false;
        }
        for (i, &voxel) in records.iter().enumerate() {
            let idx = self.index(self.interior_local(i as u32));
            self.voxels[idx] = voxel;
        }
        true
    }

    /// Count of non-air interior voxels.
    pub fn non_air_count(&self) -> usize {
        let mut count = 0;
        for z in 0..self.edge {
            for y in 0..self.edge {
                for x in 0..self.edge {
                    if !self.voxels[self.index(IVec3::new(x, y, z))].is_air() {
                        count += 1;
                    }
                }
            }
        }
        count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
