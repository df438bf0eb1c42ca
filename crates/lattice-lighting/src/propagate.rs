//! Two-pass light recomputation around an edit.
//!
//! 1. **Reset**: every column in the region is rescanned from the top of the
//!    world. Transparent cells above the first non-transparent voxel get full
//!    light; everything else gets its own emission.
//! 2. **Flood**: every cell in the region (grown by one column on each side)
//!    that holds more than one attenuation step spreads `light - step` to its
//!    six face neighbours through a breadth-first work queue. A neighbour only
//!    accepts a strictly brighter value, and only if it is transparent.
//!
//! The whole region is recomputed rather than diffed from the edit. The
//! result is a set of chunks whose light actually changed (plus neighbours
//! whose padding observes those cells); the caller schedules remeshing.

use std::collections::VecDeque;

use glam::{IVec2, IVec3};
use lattice_voxel::{BlockRegistry, ChunkCoord, ChunkMap, MAX_LIGHT};
use rustc_hash::{FxHashMap, FxHashSet};

/// The six face-neighbour offsets.
const NEIGHBORS_6: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// Tunable light constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightSettings {
    /// Horizontal half-extent of the recomputed region around an edit.
    pub radius: i32,
    /// Light lost per hop.
    pub step: u8,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self { radius: 8, step: 32 }
    }
}

/// Recomputes light in bounded regions of a [`ChunkMap`].
pub struct LightPropagator<'a> {
    registry: &'a BlockRegistry,
    settings: LightSettings,
}

impl<'a> LightPropagator<'a> {
    /// Creates a propagator. A zero step is raised to one.
    pub fn new(registry: &'a BlockRegistry, settings: LightSettings) -> Self {
        Self {
            registry,
            settings: LightSettings {
                radius: settings.radius.max(0),
                step: settings.step.max(1),
            },
        }
    }

    /// Relights the columns within `radius` of `center` (horizontally).
    pub fn relight_around(&self, map: &mut ChunkMap, center: IVec3) -> FxHashSet<ChunkCoord> {
        let r = self.settings.radius;
        let c = IVec2::new(center.x, center.z);
        self.relight_region(map, c - IVec2::splat(r), c + IVec2::splat(r))
    }

    /// Relights a chunk's footprint plus `radius` columns around it, e.g.
    /// after generation. Light that leaked into neighbouring columns before
    /// the chunk had blocks is reset too.
    pub fn relight_chunk(&self, map: &mut ChunkMap, coord: ChunkCoord) -> FxHashSet<ChunkCoord> {
        let edge = map.edge();
        let r = IVec2::splat(self.settings.radius);
        let min = IVec2::new(coord.x, coord.z);
        self.relight_region(map, min - r, min + IVec2::splat(edge - 1) + r)
    }

    /// Relights the columns in `min..=max` (X, Z) and returns the chunks that
    /// must be remeshed.
    pub fn relight_region(
        &self,
        map: &mut ChunkMap,
        min: IVec2,
        max: IVec2,
    ) -> FxHashSet<ChunkCoord> {
        let mut originals: FxHashMap<IVec3, u8> = FxHashMap::default();

        self.reset_pass(map, min, max, &mut originals);
        self.flood_pass(map, min - IVec2::ONE, max + IVec2::ONE, &mut originals);

        let mut remesh = FxHashSet::default();
        for (&pos, &before) in &originals {
            if map.light_at(pos) != before {
                for coord in map.observers(pos) {
                    if map.contains(coord) {
                        remesh.insert(coord);
                    }
                }
            }
        }
        tracing::trace!(
            "relight {}..{}: {} cells touched, {} chunks to remesh",
            min,
            max,
            originals.len(),
            remesh.len()
        );
        remesh
    }

    /// Recomputes sunlight and emission from scratch for each column.
    fn reset_pass(
        &self,
        map: &mut ChunkMap,
        min: IVec2,
        max: IVec2,
        originals: &mut FxHashMap<IVec3, u8>,
    ) {
        let bounds = map.bounds();
        for z in min.y..=max.y {
            for x in min.x..=max.x {
                let mut obstructed = false;
                for y in (bounds.min_y..bounds.max_y).rev() {
                    let pos = IVec3::new(x, y, z);
                    if !map.contains(map.owner(pos)) {
                        // Unloaded space reads as air and keeps the column open.
                        continue;
                    }
                    let voxel = map.voxel_at(pos);
                    let value = if !self.registry.is_transparent(voxel) {
                        obstructed = true;
                        self.registry.emission(voxel)
                    } else if obstructed {
                        self.registry.emission(voxel)
                    } else {
                        MAX_LIGHT
                    };
                    write_light(map, pos, value, originals);
                }
            }
        }
    }

    /// Spreads light outward from every sufficiently bright cell in the region.
    fn flood_pass(
        &self,
        map: &mut ChunkMap,
        min: IVec2,
        max: IVec2,
        originals: &mut FxHashMap<IVec3, u8>,
    ) {
        let bounds = map.bounds();
        let step = self.settings.step;
        let mut queue: VecDeque<IVec3> = VecDeque::new();
        let mut queued: FxHashSet<IVec3> = FxHashSet::default();

        for z in min.y..=max.y {
            for x in min.x..=max.x {
                for y in bounds.min_y..bounds.max_y {
                    let pos = IVec3::new(x, y, z);
                    if map.light_at(pos) > step && queued.insert(pos) {
                        queue.push_back(pos);
                    }
                }
            }
        }

        while let Some(pos) = queue.pop_front() {
            queued.remove(&pos);
            let light = map.light_at(pos);
            if light <= step {
                continue;
            }
            let spread = light - step;
            for offset in NEIGHBORS_6 {
                let next = pos + offset;
                if !bounds.contains(next) || !map.contains(map.owner(next)) {
                    continue;
                }
                if !self.registry.is_transparent(map.voxel_at(next)) {
                    continue;
                }
                if spread <= map.light_at(next) {
                    continue;
                }
                write_light(map, next, spread, originals);
                if spread > step && queued.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
}

fn write_light(map: &mut ChunkMap, pos: IVec3, value: u8, originals: &mut FxHashMap<IVec3, u8>) {
    let before = map.light_at(pos);
    if before == value {
        return;
    }
    originals.entry(pos).or_insert(before);
    map.set_light_at(pos, value);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
