#![allow(dead_code)]

use std::path::Path;
use std::time::{Duration, Instant};

use lattice_config::Config;
use lattice_voxel::{BlockDef, BlockRegistry};
use lattice_world::{RecordingHost, TickStats, VoxelWorld};

/// Chunk edge used by every test world.
pub const EDGE: i32 = 8;

/// Four chunk layers (-16..16), a 3x3 load window and flat terrain.
pub fn config(save_root: &Path) -> Config {
    let mut config = Config::default();
    config.world.name = "test".into();
    config.world.save_root = save_root.to_path_buf();
    config.world.chunk_edge = EDGE as u32;
    config.world.min_y = -16;
    config.world.max_y = 16;
    config.world.terrain = "flat".into();
    config.streaming.load_radius = 1;
    config.streaming.cache_radius = 2;
    config.streaming.clamp_vertical = true;
    config.scheduler.worker_threads = 2;
    config
}

pub fn registry() -> BlockRegistry {
    let mut reg = BlockRegistry::new(16);
    for (i, name) in ["stone", "dirt", "grass", "log", "leaves"].iter().enumerate() {
        reg.register(BlockDef::opaque(name, 1, i as u32 + 1)).unwrap();
    }
    let mut glass = BlockDef::opaque("glass", 2, 6);
    glass.transparent = true;
    reg.register(glass).unwrap();
    reg
}

/// Ticks until `done` holds, panicking after a generous timeout.
pub fn tick_until(
    world: &mut VoxelWorld,
    host: &mut RecordingHost,
    mut done: impl FnMut(&VoxelWorld, &TickStats) -> bool,
) -> TickStats {
    let start = Instant::now();
    let mut total = TickStats::default();
    while !done(world, &total) {
        assert!(start.elapsed() < Duration::from_secs(60), "timed out after {total}");
        total += world.tick(Duration::from_millis(16), host);
        std::thread::sleep(Duration::from_millis(1));
    }
    total
}

/// Ticks until the world has nothing left to do.
pub fn settle(world: &mut VoxelWorld, host: &mut RecordingHost) -> TickStats {
    tick_until(world, host, |w, _| w.is_settled())
}
