//! Headless Lattice runner.
//!
//! Loads the config, starts logging, then flies a recording host across the
//! world for the requested number of ticks, editing a little along the way,
//! and prints what the engine did.

mod blocks;

use clap::Parser;
use glam::{IVec3, Vec3};
use lattice_config::{CliArgs, Config, default_config_dir};
use lattice_voxel::BlockId;
use lattice_world::{RecordingHost, Scheduler, TerrainRegistry, VoxelWorld};
use tracing::{error, info, warn};

/// Viewer speed along +X, in voxels per tick.
const FLY_SPEED: f32 = 0.5;

/// Tick interval between scripted edits.
const EDIT_INTERVAL: u64 = 120;

/// Viewer position for a tick of the scripted fly-through.
fn viewer_at(tick: u64, altitude: f32) -> Vec3 {
    Vec3::new(tick as f32 * FLY_SPEED, altitude, 0.5)
}

/// Topmost non-air voxel of the column under `at`, if its chunks are loaded.
fn surface_under(world: &VoxelWorld, at: Vec3) -> Option<IVec3> {
    let bounds = world.map().bounds();
    let (x, z) = (at.x.floor() as i32, at.z.floor() as i32);
    (bounds.min_y..bounds.max_y)
        .rev()
        .map(|y| IVec3::new(x, y, z))
        .find(|&pos| world.get_voxel(pos).is_some_and(|v| !v.is_air()))
}

/// Digs a 3x3 pit under the viewer and puts a lamp at its bottom.
fn dig_pit(world: &mut VoxelWorld, at: Vec3) {
    let Some(surface) = surface_under(world, at) else {
        warn!("no ground under {} yet, skipping pit", at);
        return;
    };
    let lamp = world.registry().resolve("lamp");
    let mut edits = Vec::with_capacity(10);
    for dz in -1..=1 {
        for dx in -1..=1 {
            edits.push((surface + IVec3::new(dx, 0, dz), BlockId::AIR));
        }
    }
    edits.push((surface + IVec3::NEG_Y, lamp));
    match world.set_blocks(edits) {
        Ok(n) => info!("dug pit at {} ({} edits)", surface, n),
        Err(e) => warn!("pit at {} skipped: {}", surface, e),
    }
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    lattice_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let registry = match blocks::default_registry() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to build block table: {e}");
            std::process::exit(1);
        }
    };
    let terrains = TerrainRegistry::with_builtins();
    let mut world = match VoxelWorld::new(&config, registry, &terrains) {
        Ok(world) => world,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let altitude = 8.0;
    let mut host = RecordingHost::at(viewer_at(0, altitude));
    let mut scheduler = Scheduler::from_config(&config.scheduler);
    info!(
        "Lattice running world '{}' with terrain '{}' ({})",
        config.world.name,
        config.world.terrain,
        args.ticks
            .map_or_else(|| "until interrupted".to_string(), |t| format!("{t} ticks"))
    );

    let stats = scheduler.run_with(&mut world, &mut host, args.ticks, |tick, world, host| {
        host.viewer = viewer_at(tick, altitude);
        if tick > 0 && tick % EDIT_INTERVAL == 0 {
            dig_pit(world, host.viewer);
            info!(
                "tick {}: {} chunks loaded, {} with geometry, {} visible",
                tick,
                world.map().len(),
                host.geometry.len(),
                host.visible.len()
            );
        }
        true
    });

    let saved = world.shutdown();
    let quads: usize = host.geometry.values().map(|m| m.quads).sum();
    println!("Lattice headless run");
    println!("  ticks:     {}", scheduler.tick_count());
    println!("  totals:    {stats}");
    println!("  chunks:    {} loaded, {} meshed", world.map().len(), host.geometry.len());
    println!("  quads:     {quads}");
    println!("  removed:   {}", host.removed.len());
    println!("  saved:     {saved} chunk files on shutdown");
}
