//! Asynchronous terrain generation with a configurable thread pool.
//!
//! Each task fills a fresh [`BlockStore`] from the terrain source, runs the
//! structure callback for columns whose surface lies in the chunk, and
//! returns writes that landed outside the chunk so the coordinating thread
//! can route them. Results carry the ticket they were submitted with; the
//! world drops results whose ticket no longer matches the chunk.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use glam::{IVec2, IVec3};
use lattice_voxel::{BlockRegistry, BlockStore, ChunkCoord, Voxel};

use crate::error::TerrainError;
use crate::terrain::{StructureWriter, TerrainPalette, TerrainSource};

/// Read-only inputs shared by every generation worker.
pub struct GenerationContext {
    /// Terrain source.
    pub source: Arc<dyn TerrainSource>,
    /// Block table.
    pub registry: Arc<BlockRegistry>,
    /// Column fill blocks.
    pub palette: TerrainPalette,
    /// Chunk edge length.
    pub edge: u32,
    /// Height multiplier passed to the source.
    pub strength: f64,
}

/// A request to generate a single chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTask {
    /// Chunk to generate.
    pub coord: ChunkCoord,
    /// Job ticket; the result is applied only if the chunk still holds it.
    pub ticket: u64,
}

/// A generated chunk ready for the coordinating thread.
#[derive(Debug)]
pub struct GeneratedChunk {
    /// Chunk the data belongs to.
    pub coord: ChunkCoord,
    /// Ticket copied from the task.
    pub ticket: u64,
    /// Terrain plus structure writes that landed inside the chunk.
    pub store: BlockStore,
    /// Structure writes owned by other chunks, in world space.
    pub outside_writes: Vec<(IVec3, Voxel)>,
    /// Columns whose terrain or structures failed.
    pub failures: usize,
    /// Generation time in microseconds (for profiling).
    pub generation_time_us: u64,
}

/// Generates one chunk synchronously. Runs on worker threads.
///
/// Failures are logged and skipped; the chunk keeps everything written
/// before the failing column.
pub fn generate_chunk(ctx: &GenerationContext, task: GenerationTask) -> GeneratedChunk {
    let start = std::time::Instant::now();
    let coord = task.coord;
    let edge = ctx.edge as i32;
    let mut store = BlockStore::new(ctx.edge);
    let mut writer = StructureWriter::new(&ctx.registry);
    let mut failures = 0;

    for z in 0..edge {
        for x in 0..edge {
            let world = coord.to_world(IVec3::new(x, 0, z));
            let height = ctx.source.height(world.x, world.z, ctx.strength);
            if !height.is_finite() {
                let err = TerrainError::NonFiniteHeight { x: world.x, z: world.z };
                tracing::warn!("chunk {}: {}", coord, err);
                failures += 1;
                continue;
            }
            for y in 0..edge {
                let voxel = ctx.palette.voxel_at(coord.y + y, height);
                if !voxel.is_air() {
                    store.set(IVec3::new(x, y, z), voxel, false);
                }
            }

            let surface = height.ceil() as i32 - 1;
            if surface >= coord.y && surface < coord.y + edge {
                let column = IVec2::new(world.x, world.z);
                if let Err(err) = ctx.source.place_structures(column, surface, &mut writer) {
                    tracing::warn!("chunk {}: structure at {}: {}", coord, column, err);
                    failures += 1;
                }
            }
        }
    }

    let mut outside_writes = Vec::new();
    for (pos, voxel) in writer.take() {
        let local = coord.to_local(pos);
        if store.is_interior(local) {
            store.set(local, voxel, false);
        } else {
            outside_writes.push((pos, voxel));
        }
    }

    GeneratedChunk {
        coord,
        ticket: task.ticket,
        store,
        outside_writes,
        failures,
        generation_time_us: start.elapsed().as_micros() as u64,
    }
}

/// Manages asynchronous chunk generation across a thread pool.
pub struct GenerationPipeline {
    /// Sender for submitting generation tasks.
    task_sender: Option<Sender<GenerationTask>>,
    /// Receiver for collecting completed chunks on the coordinating thread.
    result_receiver: Receiver<GeneratedChunk>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Maximum in-flight tasks. Excess submissions are rejected.
    budget: usize,
    /// Current number of in-flight tasks.
    in_flight: Arc<AtomicUsize>,
}

impl GenerationPipeline {
    /// Create a generator with `thread_count` workers and an in-flight budget.
    pub fn new(thread_count: usize, budget: usize, ctx: Arc<GenerationContext>) -> Self {
        let budget = budget.max(1);
        let (task_sender, task_receiver) = bounded::<GenerationTask>(budget);
        let (result_sender, result_receiver) = unbounded::<GeneratedChunk>();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(thread_count.max(1));
        for i in 0..thread_count.max(1) {
            let receiver = task_receiver.clone();
            let sender = result_sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let ctx = Arc::clone(&ctx);

            let handle = std::thread::Builder::new()
                .name(format!("lattice-gen-{i}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        let chunk = generate_chunk(&ctx, task);
                        let _ = sender.send(chunk);
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                })
                .expect("Failed to spawn chunk generation worker thread");
            handles.push(handle);
        }

        Self {
            task_sender: Some(task_sender),
            result_receiver,
            worker_handles: handles,
            budget,
            in_flight,
        }
    }

    /// Create a generator with a thread count based on CPU cores.
    pub fn with_defaults(ctx: Arc<GenerationContext>) -> Self {
        let cpus = num_cpus::get().max(2);
        Self::new((cpus - 1).max(1), 64, ctx)
    }

    /// Submit a chunk for background generation.
    ///
    /// Returns `Err(task)` if the budget is exhausted or the pipeline has
    /// been shut down.
    pub fn submit(&self, task: GenerationTask) -> Result<(), GenerationTask> {
        let Some(sender) = &self.task_sender else {
            return Err(task);
        };
        if self.in_flight.load(Ordering::Relaxed) >= self.budget {
            return Err(task);
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        sender.try_send(task).map_err(|e| {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            e.into_inner()
        })
    }

    /// Drain all completed chunks. Call once per tick.
    pub fn drain_results(&self) -> Vec<GeneratedChunk> {
        self.result_receiver.try_iter().collect()
    }

    /// Number of tasks currently in flight (queued or executing).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Stops accepting tasks and joins the workers. Queued tasks still run.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for GenerationPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
