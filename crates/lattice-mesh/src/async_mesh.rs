//! Asynchronous meshing pipeline: offloads chunk meshing to a thread pool
//! using snapshot-based tasks and channels for result delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use lattice_voxel::{BlockRegistry, BlockStore, ChunkCoord};

use crate::batch::{CollisionMesh, RenderMesh};
use crate::mesher::{build_collision_mesh, build_render_mesh};
use crate::pool::ScratchPool;

/// A self-contained meshing task that can run on any thread.
///
/// Carries an owned snapshot of the chunk's padded store (already lit and
/// with its border refreshed), so workers never touch the world map.
pub struct MeshingTask {
    /// Chunk the geometry belongs to.
    pub coord: ChunkCoord,
    /// Chunk data version at snapshot time.
    pub data_version: u64,
    /// Job ticket; results with a stale ticket are discarded.
    pub ticket: u64,
    /// Snapshot of the padded grid.
    pub store: BlockStore,
    /// Also build collision geometry.
    pub collision: bool,
}

/// The result of a completed meshing task.
pub struct MeshingResult {
    /// Chunk the geometry belongs to.
    pub coord: ChunkCoord,
    /// Chunk data version at snapshot time.
    pub data_version: u64,
    /// Ticket copied from the task.
    pub ticket: u64,
    /// Render buffers.
    pub render: RenderMesh,
    /// Collision geometry, when requested.
    pub collision: Option<CollisionMesh>,
}

/// Asynchronous meshing pipeline backed by a thread pool.
///
/// The coordinating thread submits [`MeshingTask`]s via
/// [`submit`](Self::submit) and collects [`MeshingResult`]s each tick via
/// [`drain_results`](Self::drain_results). Meshing never blocks the tick.
pub struct MeshingPipeline {
    /// Channel sender for submitting tasks to workers.
    task_sender: Option<crossbeam_channel::Sender<MeshingTask>>,
    /// Channel receiver for collecting completed results.
    result_receiver: crossbeam_channel::Receiver<MeshingResult>,
    /// Handles to the worker threads (for shutdown).
    worker_handles: Vec<JoinHandle<()>>,
    /// Maximum number of tasks that can be in flight simultaneously.
    budget: usize,
    /// Current number of in-flight tasks.
    in_flight: Arc<AtomicUsize>,
}

impl MeshingPipeline {
    /// Creates a pipeline with `worker_count` threads and an in-flight `budget`.
    ///
    /// The block table is shared read-only by all workers.
    pub fn new(worker_count: usize, budget: usize, registry: Arc<BlockRegistry>) -> Self {
        let budget = budget.max(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded(budget);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let scratch = ScratchPool::new(worker_count.max(1));

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count.max(1) {
            let rx: crossbeam_channel::Receiver<MeshingTask> = task_rx.clone();
            let tx = result_tx.clone();
            let reg = Arc::clone(&registry);
            let flight = Arc::clone(&in_flight);
            let pool = Arc::clone(&scratch);

            handles.push(std::thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let mut guard = pool.checkout(task.store.volume());
                    let render = build_render_mesh(&task.store, &reg, task.coord, &mut guard);
                    let collision = task
                        .collision
                        .then(|| build_collision_mesh(&task.store, &reg, &mut guard));
                    drop(guard);

                    let _ = tx.send(MeshingResult {
                        coord: task.coord,
                        data_version: task.data_version,
                        ticket: task.ticket,
                        render,
                        collision,
                    });
                    flight.fetch_sub(1, Ordering::Relaxed);
                }
            }));
        }

        Self {
            task_sender: Some(task_tx),
            result_receiver: result_rx,
            worker_handles: handles,
            budget,
            in_flight,
        }
    }

    /// Submit a meshing task. Returns the task back if the budget is
    /// exhausted or the pipeline has been shut down.
    pub fn submit(&self, task: MeshingTask) -> Result<(), MeshingTask> {
        let Some(sender) = &self.task_sender else {
            return Err(task);
        };
        if self.in_flight.load(Ordering::Relaxed) >= self.budget {
            return Err(task);
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = sender.send(task) {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            return Err(err.into_inner());
        }
        Ok(())
    }

    /// Whether another task would be accepted right now.
    pub fn has_capacity(&self) -> bool {
        self.task_sender.is_some() && self.in_flight.load(Ordering::Relaxed) < self.budget
    }

    /// Drain all completed results. Called once per tick.
    pub fn drain_results(&self) -> Vec<MeshingResult> {
        self.result_receiver.try_iter().collect()
    }

    /// Number of tasks currently being processed or queued by workers.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Shut down all worker threads gracefully.
    ///
    /// Drops the task sender to signal workers to exit, then joins all threads.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for MeshingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use lattice_voxel::BlockDef;
    use std::time::{Duration, Instant};

    fn test_registry() -> Arc<BlockRegistry> {
        let mut reg = BlockRegistry::new(8);
        reg.register(BlockDef::opaque("stone", 1, 1)).unwrap();
        Arc::new(reg)
    }

    fn task(coord: ChunkCoord, filled: bool, collision: bool, version: u64) -> MeshingTask {
        let reg = test_registry();
        let mut store = BlockStore::new(8);
        if filled {
            store.set(IVec3::new(4, 4, 4), reg.voxel(reg.resolve("stone")), false);
        }
        MeshingTask {
            coord,
            data_version: version,
            ticket: 7,
            store,
            collision,
        }
    }

    fn wait_for(pipeline: &MeshingPipeline, count: usize) -> Vec<MeshingResult> {
        let mut received = Vec::new();
        let start = Instant::now();
        while received.len() < count {
            received.extend(pipeline.drain_results());
            assert!(start.elapsed() < Duration::from_secs(10), "Timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
        received
    }

    #[test]
    fn test_meshing_task_produces_mesh() {
        let pipeline = MeshingPipeline::new(2, 8, test_registry());
        assert!(pipeline.submit(task(ChunkCoord::new(0, 0, 0), true, true, 3)).is_ok());

        let results = wait_for(&pipeline, 1);
        assert_eq!(results[0].coord, ChunkCoord::new(0, 0, 0));
        assert_eq!(results[0].render.quad_count(), 6);
        assert_eq!(results[0].data_version, 3);
        assert_eq!(results[0].ticket, 7);
        assert_eq!(results[0].collision.as_ref().unwrap().triangle_count(), 12);
    }

    #[test]
    fn test_concurrent_tasks_do_not_interfere() {
        let pipeline = MeshingPipeline::new(4, 16, test_registry());
        let coords: Vec<ChunkCoord> = (0..8).map(|i| ChunkCoord::new(i * 8, 0, 0)).collect();
        for &c in &coords {
            assert!(pipeline.submit(task(c, true, false, 1)).is_ok());
        }

        let received = wait_for(&pipeline, 8);
        let mut got: Vec<_> = received.iter().map(|r| r.coord).collect();
        got.sort();
        assert_eq!(got, coords);
        assert!(received.iter().all(|r| r.collision.is_none()));
    }

    #[test]
    fn test_budget_limits_in_flight() {
        let pipeline = MeshingPipeline::new(1, 1, test_registry());
        let mut accepted = 0;
        for i in 0..10 {
            if pipeline.submit(task(ChunkCoord::new(i * 8, 0, 0), false, false, 1)).is_ok() {
                accepted += 1;
            }
        }
        assert!(accepted >= 1 && accepted <= 10);
        assert!(pipeline.in_flight_count() <= 1);
    }

    #[test]
    fn test_shutdown_rejects_new_tasks() {
        let mut pipeline = MeshingPipeline::new(2, 4, test_registry());
        pipeline.shutdown();
        assert!(!pipeline.has_capacity());
        let rejected = pipeline.submit(task(ChunkCoord::new(0, 0, 0), false, false, 1));
        assert!(rejected.is_err());
    }
}
