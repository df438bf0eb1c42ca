//! Per-tick streaming decisions.
//!
//! [`StreamingManager::tick`] compares the viewer's chunk against the world
//! map and produces a [`StreamPlan`]: chunks to create (nearest first),
//! dependency chunks to promote, chunks to save and remove, and the visible
//! set with levels of detail. It never mutates the map itself.

use glam::{IVec3, Vec3};
use lattice_voxel::{ChunkCoord, ChunkMap, WorldBounds};
use rustc_hash::FxHashMap;

use crate::clipmap::{Clipmap, ClipmapItem, StreamingSettings};
use crate::frustum::{Aabb, Containment, Frustum};

/// What the world should do this tick.
#[derive(Clone, Debug, Default)]
pub struct StreamPlan {
    /// Viewer chunk-grid position.
    pub center: IVec3,
    /// The viewer moved to a different chunk since the previous plan.
    pub moved: bool,
    /// Coordinates inside the load window with no chunk yet, nearest first.
    pub create: Vec<ChunkCoord>,
    /// Existing chunks inside the load window that were only created as
    /// dependencies and should now be meshed.
    pub promote: Vec<ChunkCoord>,
    /// Chunks that fell outside the cache window.
    pub remove: Vec<ChunkCoord>,
    /// Visible chunks and their level of detail. `None` when visibility did
    /// not need recomputing.
    pub visible: Option<FxHashMap<ChunkCoord, u8>>,
}

impl StreamPlan {
    fn new(center: IVec3) -> Self {
        Self {
            center,
            ..Self::default()
        }
    }

    /// Nothing to do.
    pub fn is_idle(&self) -> bool {
        self.create.is_empty()
            && self.promote.is_empty()
            && self.remove.is_empty()
            && self.visible.is_none()
    }
}

/// Drives chunk creation, removal and visibility from the viewer's position.
pub struct StreamingManager {
    clipmap: Clipmap,
    edge: i32,
    last_center: Option<IVec3>,
    last_frustum: Option<Frustum>,
    /// Every load-window coordinate was present and live after the last pass.
    settled: bool,
}

impl StreamingManager {
    /// Creates a manager for a world.
    pub fn new(settings: StreamingSettings, bounds: WorldBounds) -> Self {
        Self {
            clipmap: Clipmap::new(settings, bounds),
            edge: bounds.edge,
            last_center: None,
            last_frustum: None,
            settled: false,
        }
    }

    /// The underlying clipmap.
    pub fn clipmap(&self) -> &Clipmap {
        &self.clipmap
    }

    /// Viewer chunk-grid position from the last tick.
    pub fn last_center(&self) -> Option<IVec3> {
        self.last_center
    }

    /// Forces a full pass on the next tick.
    pub fn invalidate(&mut self) {
        self.settled = false;
    }

    /// Offset of `coord` from the last viewer chunk.
    pub fn offset_of(&self, coord: ChunkCoord) -> Option<IVec3> {
        self.last_center.map(|c| coord.grid(self.edge) - c)
    }

    /// Whether `coord` should get collision geometry.
    pub fn wants_collision(&self, coord: ChunkCoord) -> bool {
        self.offset_of(coord)
            .is_some_and(|o| self.clipmap.wants_collision(o))
    }

    /// Whether `coord` lies inside the load window.
    pub fn wants_mesh(&self, coord: ChunkCoord) -> bool {
        self.offset_of(coord)
            .is_some_and(|o| matches!(self.clipmap.classify(o), ClipmapItem::Visible { .. }))
    }

    /// Computes this tick's plan.
    ///
    /// Returns an idle plan when the viewer stayed in the same chunk, the
    /// window was already complete and the frustum did not change.
    pub fn tick(&mut self, viewer: Vec3, frustum: Option<&Frustum>, map: &ChunkMap) -> StreamPlan {
        let center = self.clipmap.center(viewer);
        let moved = self.last_center != Some(center);
        let frustum_changed = frustum != self.last_frustum.as_ref();

        let mut plan = StreamPlan::new(center);
        plan.moved = moved;
        if !moved && self.settled && !frustum_changed {
            return plan;
        }

        if moved || !self.settled {
            self.settled = self.plan_window(center, map, &mut plan);
            self.plan_removals(center, map, &mut plan);
            tracing::debug!(
                "streaming: center {center}, {} create, {} promote, {} remove",
                plan.create.len(),
                plan.promote.len(),
                plan.remove.len()
            );
        }

        plan.visible = Some(self.visible_set(center, frustum));
        self.last_center = Some(center);
        self.last_frustum = frustum.cloned();
        plan
    }

    /// Walks the template nearest first. Returns whether the window is
    /// complete once the plan is applied.
    fn plan_window(&self, center: IVec3, map: &ChunkMap, plan: &mut StreamPlan) -> bool {
        let mut settled = true;
        for &offset in self.clipmap.template() {
            let grid = center + offset;
            if !self.clipmap.in_world(grid) {
                continue;
            }
            let coord = ChunkCoord::from_grid(grid, self.edge);
            match map.get(coord) {
                None => plan.create.push(coord),
                // Still saving on its way out; recreate once it is gone.
                Some(chunk) if chunk.removal_requested || chunk.state().is_leaving() => {
                    settled = false;
                }
                Some(chunk) if !chunk.mesh_wanted => plan.promote.push(coord),
                Some(_) => {}
            }
        }
        settled
    }

    fn plan_removals(&self, center: IVec3, map: &ChunkMap, plan: &mut StreamPlan) {
        for (&coord, chunk) in map.iter() {
            if chunk.removal_requested || chunk.state().is_leaving() {
                continue;
            }
            let offset = coord.grid(self.edge) - center;
            if self.clipmap.classify(offset) == ClipmapItem::Outside {
                plan.remove.push(coord);
            }
        }
        plan.remove.sort();
    }

    fn visible_set(&self, center: IVec3, frustum: Option<&Frustum>) -> FxHashMap<ChunkCoord, u8> {
        let mut out = FxHashMap::default();
        let Some((min, max)) = self.clipmap.load_box(center) else {
            return out;
        };
        match frustum {
            Some(frustum) => self.mark_visible(frustum, center, min, max, &mut out),
            None => self.mark_all(center, min, max, &mut out),
        }
        out
    }

    /// Recursive box test: skip outside boxes, accept inside boxes whole,
    /// halve intersecting boxes down to single chunks.
    fn mark_visible(
        &self,
        frustum: &Frustum,
        center: IVec3,
        min: IVec3,
        max: IVec3,
        out: &mut FxHashMap<ChunkCoord, u8>,
    ) {
        let aabb = Aabb::new(
            (min * self.edge).as_vec3(),
            ((max + IVec3::ONE) * self.edge).as_vec3(),
        );
        match frustum.classify(&aabb) {
            Containment::Outside => {}
            Containment::Inside => self.mark_all(center, min, max, out),
            Containment::Intersecting if min == max => self.mark_all(center, min, max, out),
            Containment::Intersecting => {
                let mid = (min + max).div_euclid(IVec3::splat(2));
                let halves = |lo: i32, m: i32, hi: i32| -> Vec<(i32, i32)> {
                    if lo == hi { vec![(lo, hi)] } else { vec![(lo, m), (m + 1, hi)] }
                };
                for (z0, z1) in halves(min.z, mid.z, max.z) {
                    for (y0, y1) in halves(min.y, mid.y, max.y) {
                        for (x0, x1) in halves(min.x, mid.x, max.x) {
                            self.mark_visible(
                                frustum,
                                center,
                                IVec3::new(x0, y0, z0),
                                IVec3::new(x1, y1, z1),
                                out,
                            );
                        }
                    }
                }
            }
        }
    }

    fn mark_all(&self, center: IVec3, min: IVec3, max: IVec3, out: &mut FxHashMap<ChunkCoord, u8>) {
        for z in min.z..=max.z {
            for y in min.y..=max.y {
                for x in min.x..=max.x {
                    let grid = IVec3::new(x, y, z);
                    out.insert(
                        ChunkCoord::from_grid(grid, self.edge),
                        self.clipmap.lod(grid - center),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use lattice_voxel::Chunk;
    use rustc_hash::FxHashSet;

    const EDGE: i32 = 16;

    /// One chunk layer, so the window is a flat square.
    fn flat_world() -> WorldBounds {
        WorldBounds { edge: EDGE, min_y: 0, max_y: EDGE }
    }

    fn manager(load: i32, cache: i32) -> StreamingManager {
        StreamingManager::new(
            StreamingSettings {
                load_radius: load,
                cache_radius: cache,
                clamp_vertical: true,
                ..StreamingSettings::default()
            },
            flat_world(),
        )
    }

    fn apply(plan: &StreamPlan, map: &mut ChunkMap) {
        for &coord in &plan.create {
            let mut chunk = Chunk::new(coord, EDGE as u32);
            chunk.mesh_wanted = true;
            map.insert(chunk);
        }
        for &coord in &plan.remove {
            map.remove(coord);
        }
    }

    fn viewer_at_chunk(x: i32, z: i32) -> Vec3 {
        Vec3::new((x * EDGE) as f32 + 8.0, 8.0, (z * EDGE) as f32 + 8.0)
    }

    fn column(x: i32, zs: std::ops::RangeInclusive<i32>) -> FxHashSet<ChunkCoord> {
        zs.map(|z| ChunkCoord::from_grid(IVec3::new(x, 0, z), EDGE)).collect()
    }

    #[test]
    fn test_initial_window_nearest_first() {
        let mut mgr = manager(2, 3);
        let map = ChunkMap::new(flat_world());
        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);

        assert_eq!(plan.create.len(), 25);
        assert_eq!(plan.create[0], ChunkCoord::new(0, 0, 0));
        assert!(plan.remove.is_empty());
        let far = plan.create.iter().position(|&c| c == ChunkCoord::new(32, 0, 32)).unwrap();
        let near = plan.create.iter().position(|&c| c == ChunkCoord::new(16, 0, 0)).unwrap();
        assert!(near < far);
    }

    #[test]
    fn test_unchanged_viewer_is_idle() {
        let mut mgr = manager(2, 3);
        let mut map = ChunkMap::new(flat_world());
        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);
        apply(&plan, &mut map);
        let plan = mgr.tick(viewer_at_chunk(0, 0) + Vec3::new(3.0, 0.0, -2.0), None, &map);
        assert!(plan.is_idle(), "{plan:?}");
        assert!(!plan.moved);
    }

    #[test]
    fn test_one_chunk_move_creates_ring_and_removes_outside_cache() {
        let mut mgr = manager(2, 3);
        let mut map = ChunkMap::new(flat_world());
        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);
        apply(&plan, &mut map);

        // Column x = -2 stays within the cache radius.
        let plan = mgr.tick(viewer_at_chunk(1, 0), None, &map);
        let created: FxHashSet<_> = plan.create.iter().copied().collect();
        assert_eq!(created, column(3, -2..=2));
        assert!(plan.remove.is_empty());
        apply(&plan, &mut map);

        // Now column x = -2 is four chunks behind.
        let plan = mgr.tick(viewer_at_chunk(2, 0), None, &map);
        let created: FxHashSet<_> = plan.create.iter().copied().collect();
        let removed: FxHashSet<_> = plan.remove.iter().copied().collect();
        assert_eq!(created, column(4, -2..=2));
        assert_eq!(removed, column(-2, -2..=2));
    }

    #[test]
    fn test_dependency_chunks_are_promoted() {
        let mut mgr = manager(1, 2);
        let mut map = ChunkMap::new(flat_world());
        map.insert(Chunk::new(ChunkCoord::new(16, 0, 0), EDGE as u32));
        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);
        assert_eq!(plan.promote, vec![ChunkCoord::new(16, 0, 0)]);
        assert_eq!(plan.create.len(), 8);
    }

    #[test]
    fn test_leaving_chunk_keeps_window_unsettled() {
        let mut mgr = manager(1, 2);
        let mut map = ChunkMap::new(flat_world());
        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);
        apply(&plan, &mut map);
        map.get_mut(ChunkCoord::new(0, 0, 0)).unwrap().removal_requested = true;
        mgr.invalidate();

        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);
        assert!(plan.create.is_empty());
        // Next tick runs again because the window is still incomplete.
        map.remove(ChunkCoord::new(0, 0, 0));
        let plan = mgr.tick(viewer_at_chunk(0, 0), None, &map);
        assert_eq!(plan.create, vec![ChunkCoord::new(0, 0, 0)]);
    }

    #[test]
    fn test_frustum_limits_visibility() {
        let mut mgr = manager(2, 3);
        let map = ChunkMap::new(flat_world());
        let eye = viewer_at_chunk(0, 0);
        let view = Mat4::look_to_rh(eye, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 1000.0);
        let frustum = Frustum::from_view_projection(&(proj * view));

        let plan = mgr.tick(eye, Some(&frustum), &map);
        let visible = plan.visible.unwrap();
        assert!(visible.contains_key(&ChunkCoord::new(0, 0, 0)), "viewer's own chunk");
        assert!(visible.contains_key(&ChunkCoord::new(0, 0, -32)));
        assert!(!visible.contains_key(&ChunkCoord::new(0, 0, 32)), "behind the viewer");
        assert_eq!(visible.get(&ChunkCoord::new(0, 0, -32)), Some(&1));
    }

    #[test]
    fn test_frustum_change_recomputes_visibility_only() {
        let mut mgr = manager(1, 2);
        let mut map = ChunkMap::new(flat_world());
        let eye = viewer_at_chunk(0, 0);
        let plan = mgr.tick(eye, None, &map);
        assert_eq!(plan.visible.as_ref().map(|v| v.len()), Some(9));
        apply(&plan, &mut map);

        let view = Mat4::look_to_rh(eye, Vec3::X, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 1000.0);
        let frustum = Frustum::from_view_projection(&(proj * view));
        let plan = mgr.tick(eye, Some(&frustum), &map);
        assert!(plan.create.is_empty() && plan.remove.is_empty());
        let visible = plan.visible.unwrap();
        assert!(visible.contains_key(&ChunkCoord::new(16, 0, 0)));
        assert!(!visible.contains_key(&ChunkCoord::new(-16, 0, 0)));
    }

    #[test]
    fn test_collision_and_mesh_queries() {
        let mut mgr = manager(2, 3);
        let map = ChunkMap::new(flat_world());
        mgr.tick(viewer_at_chunk(0, 0), None, &map);
        assert!(mgr.wants_collision(ChunkCoord::new(16, 0, -16)));
        assert!(!mgr.wants_collision(ChunkCoord::new(32, 0, 0)));
        assert!(mgr.wants_mesh(ChunkCoord::new(32, 0, 32)));
        assert!(!mgr.wants_mesh(ChunkCoord::new(48, 0, 0)));
    }
}
