//! Command-line argument parsing for the Lattice engine.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{Config, PersistenceMode};

/// Save encoding accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliPersistence {
    /// Compressed full snapshots.
    Full,
    /// Modified voxels only.
    Differential,
    /// Do not read or write saves.
    Off,
}

/// Lattice command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "lattice", about = "Lattice voxel engine")]
pub struct CliArgs {
    /// World name.
    #[arg(long)]
    pub world: Option<String>,

    /// Directory holding world save folders.
    #[arg(long)]
    pub save_root: Option<PathBuf>,

    /// Creation radius in chunks.
    #[arg(long)]
    pub load_radius: Option<u32>,

    /// Retention radius in chunks.
    #[arg(long)]
    pub cache_radius: Option<u32>,

    /// Save encoding.
    #[arg(long, value_enum)]
    pub persistence: Option<CliPersistence>,

    /// Background worker threads (0 = auto).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many ticks (runs until interrupted when absent).
    #[arg(long)]
    pub ticks: Option<u64>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    ///
    /// Call [`Config::validate`] afterwards; overrides are not checked here.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref name) = args.world {
            self.world.name = name.clone();
        }
        if let Some(ref root) = args.save_root {
            self.world.save_root = root.clone();
        }
        if let Some(r) = args.load_radius {
            self.streaming.load_radius = r;
        }
        if let Some(r) = args.cache_radius {
            self.streaming.cache_radius = r;
        }
        match args.persistence {
            Some(CliPersistence::Full) => {
                self.persistence.enabled = true;
                self.persistence.mode = PersistenceMode::Full;
            }
            Some(CliPersistence::Differential) => {
                self.persistence.enabled = true;
                self.persistence.mode = PersistenceMode::Differential;
            }
            Some(CliPersistence::Off) => self.persistence.enabled = false,
            None => {}
        }
        if let Some(w) = args.workers {
            self.scheduler.worker_threads = w;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
