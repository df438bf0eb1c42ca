//! The chunk lifecycle driver.
//!
//! [`VoxelWorld`] owns the chunk map and both worker pools. One call to
//! [`VoxelWorld::tick`] runs these steps in order:
//!
//! 1. Streaming: create, promote and remove chunks, update visibility.
//! 2. Apply finished terrain (pending structure writes, save file, light).
//! 3. Save chunks on their way out and drop them from the map.
//! 4. Submit `Created` chunks for generation, nearest first.
//! 5. Move chunks whose 26 neighbours all have terrain towards meshing.
//! 6. Hand finished meshes to the host within the tick budget.
//! 7. Submit meshing jobs within the tick budget.
//!
//! Background results carry the ticket they were submitted with. A result
//! whose ticket no longer matches its chunk (removed, recreated or
//! resubmitted since) is dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{IVec2, IVec3};
use lattice_config::{Config, ConfigError, PersistenceMode};
use lattice_lighting::{LightPropagator, LightSettings};
use lattice_mesh::{MeshingPipeline, MeshingResult, MeshingTask};
use lattice_persist::{LoadOutcome, SaveMode, SaveOutcome, SaveStore};
use lattice_stream::{ClipmapItem, Frustum, StreamPlan, StreamingManager, StreamingSettings};
use lattice_voxel::{
    BlockId, BlockRegistry, Chunk, ChunkCoord, ChunkMap, ChunkState, EditError, Voxel, WorldBounds,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::generation::{GeneratedChunk, GenerationContext, GenerationPipeline, GenerationTask};
use crate::host::Host;
use crate::stats::TickStats;
use crate::terrain::{TerrainParams, TerrainPalette, TerrainRegistry};

/// A streamed, lit, meshed and persisted voxel world.
pub struct VoxelWorld {
    map: ChunkMap,
    registry: Arc<BlockRegistry>,
    streaming: StreamingManager,
    light: LightSettings,
    saves: Option<SaveStore>,
    generator: GenerationPipeline,
    mesher: MeshingPipeline,
    /// Structure writes waiting for their owner's terrain, in world space.
    pending_writes: FxHashMap<ChunkCoord, Vec<(IVec3, Voxel)>>,
    /// Finished meshes not yet handed to the host.
    pending_commits: VecDeque<MeshingResult>,
    /// Chunks with a meshing job in flight.
    mesh_jobs: FxHashSet<ChunkCoord>,
    next_ticket: u64,
    tick_budget: Duration,
    /// The last streaming plan had nothing to do.
    stream_idle: bool,
    uptime: Duration,
    ticks: u64,
}

impl VoxelWorld {
    /// Builds a world from a validated config.
    ///
    /// The block table is frozen here and shared with every worker. The
    /// terrain is looked up once in `terrains`.
    pub fn new(
        config: &Config,
        registry: BlockRegistry,
        terrains: &TerrainRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let w = &config.world;
        let bounds = WorldBounds {
            edge: w.chunk_edge as i32,
            min_y: w.min_y,
            max_y: w.max_y,
        };
        let s = &config.streaming;
        let settings = StreamingSettings {
            load_radius: s.load_radius as i32,
            cache_radius: s.cache_radius as i32,
            clamp_vertical: s.clamp_vertical,
            collision_radius: s.collision_radius as i32,
            lod_shell_width: s.lod_shell_width as i32,
        };

        let registry = Arc::new(registry);
        let ctx = Arc::new(GenerationContext {
            source: terrains.create(&w.terrain, &TerrainParams { seed: w.seed }),
            palette: TerrainPalette::resolve(&registry),
            registry: Arc::clone(&registry),
            edge: w.chunk_edge,
            strength: w.terrain_strength,
        });

        let workers = config.scheduler.resolved_worker_threads();
        let gen_workers = (workers / 2).max(1);
        let mesh_workers = workers.saturating_sub(gen_workers).max(1);
        let budget = config.scheduler.max_in_flight;

        let saves = config.persistence.enabled.then(|| {
            let mode = match config.persistence.mode {
                PersistenceMode::Full => SaveMode::Full,
                PersistenceMode::Differential => SaveMode::Differential,
            };
            SaveStore::new(&w.save_root, &w.name, mode)
        });

        tracing::info!(
            "world '{}': edge {}, y {}..{}, terrain '{}', {} generation + {} meshing workers, saves {}",
            w.name,
            w.chunk_edge,
            w.min_y,
            w.max_y,
            w.terrain,
            gen_workers,
            mesh_workers,
            saves
                .as_ref()
                .map_or_else(|| "off".to_string(), |s| s.dir().display().to_string())
        );

        Ok(Self {
            map: ChunkMap::new(bounds),
            streaming: StreamingManager::new(settings, bounds),
            light: LightSettings {
                radius: config.lighting.radius as i32,
                step: config.lighting.attenuation_step,
            },
            saves,
            generator: GenerationPipeline::new(gen_workers, budget, ctx),
            mesher: MeshingPipeline::new(mesh_workers, budget, Arc::clone(&registry)),
            registry,
            pending_writes: FxHashMap::default(),
            pending_commits: VecDeque::new(),
            mesh_jobs: FxHashSet::default(),
            next_ticket: 0,
            tick_budget: Duration::from_secs_f32(config.scheduler.tick_budget_ms / 1000.0),
            stream_idle: false,
            uptime: Duration::ZERO,
            ticks: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The chunk map.
    pub fn map(&self) -> &ChunkMap {
        &self.map
    }

    /// The block table.
    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// The streaming manager.
    pub fn streaming(&self) -> &StreamingManager {
        &self.streaming
    }

    /// Save store, when persistence is enabled.
    pub fn save_store(&self) -> Option<&SaveStore> {
        self.saves.as_ref()
    }

    /// A loaded chunk.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.map.get(coord)
    }

    /// Lifecycle state of a loaded chunk.
    pub fn chunk_state(&self, coord: ChunkCoord) -> Option<ChunkState> {
        self.map.get(coord).map(Chunk::state)
    }

    /// Voxel at a world position, or `None` if its chunk has no terrain yet.
    pub fn get_voxel(&self, pos: IVec3) -> Option<Voxel> {
        let owner = self.map.owner(pos);
        let chunk = self.map.get(owner)?;
        chunk
            .state()
            .has_terrain()
            .then(|| chunk.store.get(owner.to_local(pos)))
    }

    /// Block at a world position, or `None` if its chunk has no terrain yet.
    pub fn get_block(&self, pos: IVec3) -> Option<BlockId> {
        self.get_voxel(pos).map(Voxel::id)
    }

    /// Light at a world position.
    pub fn light_at(&self, pos: IVec3) -> u8 {
        self.map.light_at(pos)
    }

    /// Structure writes still waiting for their owner.
    pub fn pending_write_count(&self) -> usize {
        self.pending_writes.values().map(Vec::len).sum()
    }

    /// Simulated time accumulated from `tick` calls.
    pub fn uptime(&self) -> Duration {
        self.uptime
    }

    /// Number of ticks run.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Nothing is left to do until the viewer moves or the world is edited:
    /// streaming is idle, no job is in flight and every chunk in the load
    /// window is `Ready` with no pending update.
    pub fn is_settled(&self) -> bool {
        if !self.stream_idle || !self.pending_commits.is_empty() || !self.mesh_jobs.is_empty() {
            return false;
        }
        self.map.iter().all(|(&coord, chunk)| {
            let state = chunk.state();
            if !state.has_terrain() {
                return false;
            }
            if !(chunk.mesh_wanted && self.streaming.wants_mesh(coord)) {
                return true;
            }
            state == ChunkState::Ready && !chunk.update_requested
        })
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Places one block. See [`VoxelWorld::set_blocks`].
    pub fn set_block(&mut self, pos: IVec3, block: BlockId) -> Result<(), EditError> {
        self.set_blocks([(pos, block)]).map(|_| ())
    }

    /// Places a batch of blocks and relights once around all of them.
    ///
    /// Every position is checked before anything is written, so a failing
    /// batch leaves the world untouched. Edited cells are recorded as
    /// modified; the owning chunk and every chunk whose padding observes an
    /// edited cell is flagged for a geometry update.
    ///
    /// # Errors
    ///
    /// [`EditError::OutOfWorld`] outside the vertical bounds,
    /// [`EditError::ChunkNotLoaded`] when the owner is missing or has no
    /// terrain yet.
    pub fn set_blocks(
        &mut self,
        edits: impl IntoIterator<Item = (IVec3, BlockId)>,
    ) -> Result<usize, EditError> {
        let edits: Vec<(IVec3, BlockId)> = edits.into_iter().collect();
        let bounds = self.map.bounds();
        for &(pos, _) in &edits {
            if !bounds.contains(pos) {
                return Err(EditError::OutOfWorld(pos));
            }
            let owner = self.map.owner(pos);
            if !self
                .map
                .get(owner)
                .is_some_and(|c| c.state().has_terrain())
            {
                return Err(EditError::ChunkNotLoaded(owner));
            }
        }

        let Some(&(first, _)) = edits.first() else {
            return Ok(0);
        };
        let (mut min, mut max) = (first, first);
        for &(pos, block) in &edits {
            let voxel = self.registry.voxel(block);
            let observers = self.map.set_voxel(pos, voxel, true)?;
            request_updates(&mut self.map, observers);
            min = min.min(pos);
            max = max.max(pos);
        }

        let r = IVec2::splat(self.light.radius);
        let propagator = LightPropagator::new(&self.registry, self.light);
        let remesh = propagator.relight_region(
            &mut self.map,
            IVec2::new(min.x, min.z) - r,
            IVec2::new(max.x, max.z) + r,
        );
        request_updates(&mut self.map, remesh);
        tracing::debug!("applied {} edits in {}..{}", edits.len(), min, max);
        Ok(edits.len())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Runs one cooperative tick.
    pub fn tick<H: Host + ?Sized>(&mut self, dt: Duration, host: &mut H) -> TickStats {
        let start = Instant::now();
        self.uptime += dt;
        self.ticks += 1;
        let mut stats = TickStats::default();

        let frustum = host.frustum_planes().map(Frustum::from_planes);
        let plan = self
            .streaming
            .tick(host.viewer_position(), frustum.as_ref(), &self.map);
        self.apply_stream_plan(plan, host, &mut stats);
        self.apply_generated(&mut stats);
        self.finish_removals(host, &mut stats);
        self.submit_generation();
        self.advance_awaiting(&mut stats);
        self.commit_meshes(host, start, &mut stats);
        self.submit_meshes(start, &mut stats);

        if !stats.is_quiet() {
            tracing::debug!("tick {}: {}", self.ticks, stats);
        }
        stats
    }

    fn apply_stream_plan<H: Host + ?Sized>(
        &mut self,
        plan: StreamPlan,
        host: &mut H,
        stats: &mut TickStats,
    ) {
        self.stream_idle = plan.is_idle();
        let edge = self.map.edge() as u32;

        for &coord in &plan.create {
            let mut chunk = Chunk::new(coord, edge);
            chunk.mesh_wanted = true;
            self.map.insert(chunk);
            stats.created += 1;
        }
        for &coord in &plan.promote {
            if let Some(chunk) = self.map.get_mut(coord) {
                chunk.mesh_wanted = true;
            }
        }

        if plan.moved || !plan.create.is_empty() || !plan.promote.is_empty() {
            let streaming = &self.streaming;
            for (&coord, chunk) in self.map.iter_mut() {
                let want = chunk.mesh_wanted && streaming.wants_collision(coord);
                if want && !chunk.collision_wanted && chunk.state() == ChunkState::Ready {
                    chunk.update_requested = true;
                }
                if !want && chunk.collision_wanted {
                    host.remove_collision(coord);
                }
                chunk.collision_wanted = want;
            }
        }
        if plan.moved {
            let streaming = &self.streaming;
            self.pending_writes.retain(|&coord, _| {
                streaming
                    .offset_of(coord)
                    .is_some_and(|o| streaming.clipmap().classify(o) != ClipmapItem::Outside)
            });
        }

        for &coord in &plan.remove {
            self.request_removal(coord);
        }

        if let Some(visible) = plan.visible {
            for (&coord, chunk) in self.map.iter_mut() {
                let (now, lod) = match visible.get(&coord) {
                    Some(&lod) => (true, lod),
                    None => (false, chunk.lod),
                };
                if chunk.visible != now || chunk.lod != lod {
                    chunk.visible = now;
                    chunk.lod = lod;
                    host.set_visibility(coord, now, lod);
                }
            }
        }
    }

    /// Starts tearing a chunk down. Jobs in flight for it are orphaned by
    /// moving its ticket.
    fn request_removal(&mut self, coord: ChunkCoord) {
        let ticket = self.take_ticket();
        if let Some(chunk) = self.map.get_mut(coord) {
            chunk.removal_requested = true;
            chunk.job_ticket = ticket;
            chunk.transition(ChunkState::Saving);
        }
    }

    fn apply_generated(&mut self, stats: &mut TickStats) {
        for generated in self.generator.drain_results() {
            let live = self.map.get(generated.coord).is_some_and(|c| {
                c.job_ticket == generated.ticket
                    && c.state() == ChunkState::GeneratingTerrain
                    && !c.removal_requested
            });
            if !live {
                tracing::trace!("chunk {}: discarding stale terrain", generated.coord);
                stats.discarded += 1;
                continue;
            }
            if generated.failures > 0 {
                tracing::warn!(
                    "chunk {}: {} columns failed, keeping partial terrain",
                    generated.coord,
                    generated.failures
                );
            }
            tracing::trace!(
                "chunk {}: terrain in {}us",
                generated.coord,
                generated.generation_time_us
            );
            self.install_terrain(generated, stats);
            stats.generated += 1;
        }
    }

    fn install_terrain(&mut self, generated: GeneratedChunk, stats: &mut TickStats) {
        let GeneratedChunk {
            coord,
            store,
            outside_writes,
            ..
        } = generated;
        let pending = self.pending_writes.remove(&coord).unwrap_or_default();
        let Some(chunk) = self.map.get_mut(coord) else {
            return;
        };

        chunk.store = store;
        chunk.transition(ChunkState::GeneratingStructures);
        // Same rule as `route_structure_write`: structures only fill air.
        for (pos, voxel) in pending {
            let local = coord.to_local(pos);
            if chunk.store.get(local).is_air() {
                chunk.store.set(local, voxel, false);
            }
        }
        if let Some(saves) = &self.saves {
            match saves.load(coord, &mut chunk.store, &self.registry) {
                Ok(LoadOutcome::Applied { records }) => {
                    tracing::debug!("chunk {}: applied {} saved records", coord, records);
                }
                Ok(LoadOutcome::NotFound) => {}
                Err(err) => {
                    tracing::warn!("chunk {}: save rejected, keeping generated terrain: {}", coord, err);
                    stats.load_failures += 1;
                }
            }
        }
        chunk.bump_version();
        chunk.transition(ChunkState::AwaitingNeighbors);

        let mut relight = FxHashSet::default();
        relight.insert(coord);
        for (pos, voxel) in outside_writes {
            if let Some(owner) = self.route_structure_write(pos, voxel) {
                relight.insert(owner);
            }
        }

        let propagator = LightPropagator::new(&self.registry, self.light);
        let mut dirty = FxHashSet::default();
        for target in relight {
            dirty.extend(propagator.relight_chunk(&mut self.map, target));
        }
        dirty.extend(coord.neighbors(self.map.edge()));
        request_updates(&mut self.map, dirty);
    }

    /// Writes a structure voxel owned by another chunk. Owners with terrain
    /// take it immediately, into air cells only; anything else is queued and
    /// applied under the same rule in `install_terrain`.
    ///
    /// Returns the owner when it was written so the caller can relight it.
    fn route_structure_write(&mut self, pos: IVec3, voxel: Voxel) -> Option<ChunkCoord> {
        if !self.map.bounds().contains(pos) {
            return None;
        }
        let owner = self.map.owner(pos);
        let has_terrain = self
            .map
            .get(owner)
            .is_some_and(|c| c.state().has_terrain());
        if !has_terrain {
            self.pending_writes.entry(owner).or_default().push((pos, voxel));
            return None;
        }
        if !self.map.voxel_at(pos).is_air() {
            return None;
        }
        match self.map.set_voxel(pos, voxel, false) {
            Ok(observers) => {
                request_updates(&mut self.map, observers);
                Some(owner)
            }
            Err(err) => {
                tracing::warn!("structure write at {} dropped: {}", pos, err);
                None
            }
        }
    }

    fn finish_removals<H: Host + ?Sized>(&mut self, host: &mut H, stats: &mut TickStats) {
        let leaving: Vec<ChunkCoord> = self
            .map
            .iter()
            .filter(|(_, c)| c.state() == ChunkState::Saving)
            .map(|(&coord, _)| coord)
            .collect();

        for coord in leaving {
            let Some(chunk) = self.map.get_mut(coord) else {
                continue;
            };
            if let Some(saves) = &self.saves {
                match saves.save(coord, &chunk.store) {
                    Ok(SaveOutcome::Written { bytes }) => {
                        tracing::trace!("chunk {}: saved {} bytes", coord, bytes);
                        stats.saved += 1;
                    }
                    Ok(SaveOutcome::Skipped | SaveOutcome::Unchanged) => {}
                    Err(err) => {
                        tracing::error!("chunk {}: save failed, edits lost: {}", coord, err);
                        stats.save_failures += 1;
                    }
                }
            }
            chunk.transition(ChunkState::PendingRemoval);
            self.map.remove(coord);
            host.remove_geometry(coord);
            stats.removed += 1;
        }
    }

    fn submit_generation(&mut self) {
        let mut queue: Vec<ChunkCoord> = self
            .map
            .iter()
            .filter(|(_, c)| c.state() == ChunkState::Created && !c.removal_requested)
            .map(|(&coord, _)| coord)
            .collect();
        self.sort_nearest(&mut queue);

        for coord in queue {
            let ticket = self.take_ticket();
            if self.generator.submit(GenerationTask { coord, ticket }).is_err() {
                break;
            }
            if let Some(chunk) = self.map.get_mut(coord) {
                chunk.job_ticket = ticket;
                chunk.transition(ChunkState::GeneratingTerrain);
            }
        }
    }

    fn advance_awaiting(&mut self, stats: &mut TickStats) {
        let mut waiting: Vec<ChunkCoord> = self
            .map
            .iter()
            .filter(|&(&coord, c)| {
                c.state() == ChunkState::AwaitingNeighbors
                    && c.mesh_wanted
                    && self.streaming.wants_mesh(coord)
            })
            .map(|(&coord, _)| coord)
            .collect();
        self.sort_nearest(&mut waiting);

        for coord in waiting {
            if !self.neighbors_ready(coord, stats) {
                continue;
            }
            if let Some(chunk) = self.map.get_mut(coord) {
                let next = if chunk.collision_wanted {
                    ChunkState::BuildingCollisionGeometry
                } else {
                    ChunkState::BuildingRenderGeometry
                };
                chunk.transition(next);
                chunk.update_requested = true;
            }
        }
    }

    /// Creates missing in-world neighbours as dependency chunks (generated
    /// but not meshed) and reports whether all neighbours have terrain.
    fn neighbors_ready(&mut self, coord: ChunkCoord, stats: &mut TickStats) -> bool {
        let bounds = self.map.bounds();
        let edge = self.map.edge();
        let mut ready = true;
        for neighbor in coord.neighbors(edge) {
            if !bounds.contains_chunk(neighbor) {
                continue;
            }
            match self.map.get(neighbor) {
                Some(chunk) => ready &= chunk.state().has_terrain(),
                None => {
                    tracing::trace!("chunk {}: creating dependency {}", coord, neighbor);
                    self.map.insert(Chunk::new(neighbor, edge as u32));
                    stats.created += 1;
                    ready = false;
                }
            }
        }
        ready
    }

    fn commit_meshes<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        start: Instant,
        stats: &mut TickStats,
    ) {
        for result in self.mesher.drain_results() {
            self.mesh_jobs.remove(&result.coord);
            self.pending_commits.push_back(result);
        }

        let mut committed = 0;
        while committed == 0 || start.elapsed() < self.tick_budget {
            let Some(result) = self.pending_commits.pop_front() else {
                break;
            };
            if self.commit_one(result, host) {
                committed += 1;
                stats.committed += 1;
            } else {
                stats.discarded += 1;
            }
        }
    }

    fn commit_one<H: Host + ?Sized>(&mut self, result: MeshingResult, host: &mut H) -> bool {
        let coord = result.coord;
        let Some(chunk) = self.map.get_mut(coord) else {
            return false;
        };
        if chunk.job_ticket != result.ticket
            || chunk.removal_requested
            || chunk.state().is_leaving()
        {
            return false;
        }
        if chunk.version() != result.data_version {
            tracing::trace!(
                "chunk {}: mesh built from version {}, now {}",
                coord,
                result.data_version,
                chunk.version()
            );
            chunk.update_requested = true;
            return false;
        }

        // A job submitted before the chunk left the collision radius.
        if let Some(collision) = &result.collision
            && chunk.collision_wanted
        {
            host.commit_collision(coord, collision);
        }
        host.commit_geometry(coord, &result.render);
        if chunk.state() == ChunkState::BuildingCollisionGeometry {
            chunk.transition(ChunkState::BuildingRenderGeometry);
        }
        if chunk.state() == ChunkState::BuildingRenderGeometry {
            chunk.transition(ChunkState::Ready);
        }
        true
    }

    fn submit_meshes(&mut self, start: Instant, stats: &mut TickStats) {
        let mut candidates: Vec<ChunkCoord> = self
            .map
            .iter()
            .filter(|&(coord, c)| {
                c.update_requested
                    && c.mesh_wanted
                    && !c.removal_requested
                    && matches!(
                        c.state(),
                        ChunkState::BuildingCollisionGeometry
                            | ChunkState::BuildingRenderGeometry
                            | ChunkState::Ready
                    )
                    && !self.mesh_jobs.contains(coord)
                    && self.streaming.wants_mesh(*coord)
            })
            .map(|(&coord, _)| coord)
            .collect();
        self.sort_nearest(&mut candidates);

        let mut submitted = 0;
        for coord in candidates {
            if submitted > 0 && start.elapsed() >= self.tick_budget {
                break;
            }
            if !self.mesher.has_capacity() {
                break;
            }
            if !self.neighbors_ready(coord, stats) {
                continue;
            }
            self.map.refresh_padding(coord);
            let ticket = self.take_ticket();
            let Some(chunk) = self.map.get_mut(coord) else {
                continue;
            };
            if chunk.state() == ChunkState::Ready {
                chunk.transition(ChunkState::BuildingRenderGeometry);
            }
            chunk.update_requested = false;
            chunk.job_ticket = ticket;
            let task = MeshingTask {
                coord,
                data_version: chunk.version(),
                ticket,
                store: chunk.store.clone(),
                collision: chunk.collision_wanted,
            };
            if self.mesher.submit(task).is_err() {
                chunk.update_requested = true;
                break;
            }
            self.mesh_jobs.insert(coord);
            submitted += 1;
            stats.meshed += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Saves every chunk holding unsaved edits and stops the workers.
    /// Returns the number of files written.
    pub fn shutdown(&mut self) -> usize {
        let mut written = 0;
        if let Some(saves) = &self.saves {
            for (&coord, chunk) in self.map.iter_mut() {
                if chunk.store.modified_count() == 0 {
                    continue;
                }
                match saves.save(coord, &chunk.store) {
                    Ok(outcome) => {
                        if matches!(outcome, SaveOutcome::Written { .. }) {
                            written += 1;
                        }
                        chunk.store.clear_modified();
                    }
                    Err(err) => tracing::error!("chunk {}: save failed on shutdown: {}", coord, err),
                }
            }
        }
        self.generator.shutdown();
        self.mesher.shutdown();
        tracing::info!(
            "world stopped after {} ticks ({:.1}s), {} chunks saved",
            self.ticks,
            self.uptime.as_secs_f64(),
            written
        );
        written
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn take_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Sorts by distance to the viewer's chunk, nearest first.
    fn sort_nearest(&self, coords: &mut [ChunkCoord]) {
        let edge = self.map.edge();
        let center = self.streaming.last_center().unwrap_or(IVec3::ZERO);
        coords.sort_by_key(|c| ((c.grid(edge) - center).length_squared(), *c));
    }
}

fn request_updates(map: &mut ChunkMap, coords: impl IntoIterator<Item = ChunkCoord>) {
    for coord in coords {
        if let Some(chunk) = map.get_mut(coord) {
            chunk.update_requested = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use glam::Vec3;
    use lattice_voxel::{BlockDef, BlockStore};

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.world.name = "unit".into();
        config.world.save_root = dir.to_path_buf();
        config.world.chunk_edge = 8;
        config.world.min_y = -8;
        config.world.max_y = 8;
        config.world.terrain = "flat".into();
        config.streaming.load_radius = 1;
        config.streaming.cache_radius = 2;
        config.streaming.clamp_vertical = true;
        config.scheduler.worker_threads = 2;
        config
    }

    fn registry() -> BlockRegistry {
        let mut reg = BlockRegistry::new(8);
        for name in ["stone", "dirt", "grass", "log"] {
            reg.register(BlockDef::opaque(name, 1, 1)).unwrap();
        }
        reg
    }

    fn settle(world: &mut VoxelWorld, host: &mut RecordingHost) {
        let start = Instant::now();
        while !world.is_settled() {
            assert!(start.elapsed() < Duration::from_secs(30), "world never settled");
            world.tick(Duration::from_millis(16), host);
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.streaming.cache_radius = 1;
        let result = VoxelWorld::new(&cfg, registry(), &TerrainRegistry::default());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_first_tick_creates_window_nearest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = VoxelWorld::new(&config(dir.path()), registry(), &TerrainRegistry::default()).unwrap();
        let mut host = RecordingHost::at(Vec3::new(4.0, 0.0, 4.0));
        let stats = world.tick(Duration::ZERO, &mut host);
        // 3x3 columns, two layers.
        assert_eq!(stats.created, 18);
        assert_eq!(world.map().len(), 18);
        assert!(world.map().iter().all(|(_, c)| c.mesh_wanted));
        world.shutdown();
    }

    #[test]
    fn test_settles_and_commits_every_wanted_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = VoxelWorld::new(&config(dir.path()), registry(), &TerrainRegistry::default()).unwrap();
        let mut host = RecordingHost::at(Vec3::new(4.0, 0.0, 4.0));
        settle(&mut world, &mut host);

        for (&coord, chunk) in world.map().iter() {
            if chunk.mesh_wanted {
                assert_eq!(chunk.state(), ChunkState::Ready, "chunk {coord}");
                assert!(host.geometry.contains_key(&coord), "chunk {coord} has no geometry");
            }
        }
        // Surface chunk below the viewer is the one with faces.
        let below = ChunkCoord::new(0, -8, 0);
        assert!(host.geometry[&below].quads > 0);
        assert!(host.collision.contains_key(&below));
        world.shutdown();
    }

    /// Installs a stone chunk and an empty neighbour whose structure pokes
    /// one `log` into the stone, in the given order. Returns the block that
    /// ends up in the shared cell.
    fn install_pair(stone_first: bool) -> BlockId {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.persistence.enabled = false;
        let mut world = VoxelWorld::new(&cfg, registry(), &TerrainRegistry::default()).unwrap();
        let stone = world.registry().voxel(world.registry().resolve("stone"));
        let log = world.registry().voxel(world.registry().resolve("log"));

        let solid = ChunkCoord::new(0, -8, 0);
        let empty = ChunkCoord::new(8, -8, 0);
        let cell = IVec3::new(7, -4, 3);

        let mut solid_store = BlockStore::new(8);
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    solid_store.set(IVec3::new(x, y, z), stone, false);
                }
            }
        }
        let solid_chunk = GeneratedChunk {
            coord: solid,
            ticket: 0,
            store: solid_store,
            outside_writes: Vec::new(),
            failures: 0,
            generation_time_us: 0,
        };
        let empty_chunk = GeneratedChunk {
            coord: empty,
            ticket: 0,
            store: BlockStore::new(8),
            outside_writes: vec![(cell, log)],
            failures: 0,
            generation_time_us: 0,
        };

        for coord in [solid, empty] {
            let mut chunk = Chunk::new(coord, 8);
            chunk.transition(ChunkState::GeneratingTerrain);
            world.map.insert(chunk);
        }
        let mut stats = TickStats::default();
        let order = if stone_first {
            [solid_chunk, empty_chunk]
        } else {
            [empty_chunk, solid_chunk]
        };
        for generated in order {
            world.install_terrain(generated, &mut stats);
        }
        assert_eq!(world.pending_write_count(), 0);
        let block = world.get_block(cell).unwrap();
        world.shutdown();
        block
    }

    #[test]
    fn test_cross_chunk_structure_independent_of_install_order() {
        let stone_first = install_pair(true);
        let structure_first = install_pair(false);
        assert_eq!(stone_first, structure_first);
        assert_eq!(stone_first, registry().resolve("stone"));
    }

    #[test]
    fn test_leaving_collision_radius_drops_collision_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = VoxelWorld::new(&config(dir.path()), registry(), &TerrainRegistry::default()).unwrap();
        let mut host = RecordingHost::at(Vec3::new(4.0, 0.0, 4.0));
        settle(&mut world, &mut host);
        let below = ChunkCoord::new(0, -8, 0);
        assert!(host.collision.contains_key(&below));

        // Two chunks east: `below` is only cached now.
        host.viewer.x += 16.0;
        world.tick(Duration::from_millis(16), &mut host);
        assert!(!world.chunk(below).unwrap().collision_wanted);
        assert!(!host.collision.contains_key(&below), "stale collision kept");
        assert!(host.geometry.contains_key(&below), "render geometry stays while cached");
        assert!(host.collision.contains_key(&ChunkCoord::new(8, -8, 0)));
        world.shutdown();
    }

    #[test]
    fn test_edit_requires_terrain() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = VoxelWorld::new(&config(dir.path()), registry(), &TerrainRegistry::default()).unwrap();
        let stone = world.registry().lookup("stone").unwrap();
        assert_eq!(
            world.set_block(IVec3::new(0, -1, 0), stone),
            Err(EditError::ChunkNotLoaded(ChunkCoord::new(0, -8, 0)))
        );
        assert_eq!(
            world.set_block(IVec3::new(0, 8, 0), stone),
            Err(EditError::OutOfWorld(IVec3::new(0, 8, 0)))
        );
        assert_eq!(world.set_blocks(std::iter::empty()), Ok(0));
        world.shutdown();
    }
}
