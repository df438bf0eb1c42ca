//! Configuration structs with explicit defaults, validation and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World identity, bounds and terrain source.
    pub world: WorldConfig,
    /// Viewer-relative streaming radii.
    pub streaming: StreamingConfig,
    /// Light propagation constants.
    pub lighting: LightingConfig,
    /// Save-file settings.
    pub persistence: PersistenceConfig,
    /// Worker pool and tick budget.
    pub scheduler: SchedulerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World identity and bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World name; also the directory name under `save_root`.
    pub name: String,
    /// Directory that holds one sub-directory per world.
    pub save_root: PathBuf,
    /// Chunk edge length in voxels. Must be a power of two.
    pub chunk_edge: u32,
    /// Lowest world Y (inclusive). Must be a multiple of `chunk_edge`.
    pub min_y: i32,
    /// Highest world Y (exclusive). Must be a multiple of `chunk_edge`.
    pub max_y: i32,
    /// Seed handed to the terrain source.
    pub seed: u32,
    /// Registry key of the terrain source (`"flat"`, `"noise"`, ...).
    pub terrain: String,
    /// Strength argument passed to the terrain height function.
    pub terrain_strength: f64,
}

/// Streaming radii, all measured in chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chunks within this radius are created.
    pub load_radius: u32,
    /// Chunks beyond this radius are saved and removed. Must exceed `load_radius`.
    pub cache_radius: u32,
    /// Ignore vertical viewer motion when computing the viewer chunk.
    pub clamp_vertical: bool,
    /// Chunks within this radius also receive collision geometry.
    pub collision_radius: u32,
    /// Width of each level-of-detail shell. Zero disables LOD tagging.
    pub lod_shell_width: u32,
}

/// Light propagation constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingConfig {
    /// Horizontal radius (voxels) recomputed around an edit.
    pub radius: u32,
    /// Light lost per hop during the flood pass.
    pub attenuation_step: u8,
}

/// On-disk encoding of chunk saves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Compressed snapshot of the whole voxel grid.
    Full,
    /// Only voxels modified since generation, merged with prior saves.
    Differential,
}

/// Save-file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Disable to run without touching the disk.
    pub enabled: bool,
    /// Encoding used when writing saves.
    pub mode: PersistenceMode,
}

/// Worker pool sizing and per-tick work limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Background worker count. Zero picks `cores - 1` (at least one).
    pub worker_threads: usize,
    /// Maximum number of generation/meshing jobs in flight.
    pub max_in_flight: usize,
    /// Coordinating-thread work budget per tick in milliseconds.
    pub tick_budget_ms: f32,
    /// Tick rate of the owned scheduler loop.
    pub target_tick_hz: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            save_root: dirs::data_dir()
                .map(|d| d.join("lattice").join("saves"))
                .unwrap_or_else(|| PathBuf::from("saves")),
            chunk_edge: 16,
            min_y: -64,
            max_y: 192,
            seed: 0,
            terrain: "noise".to_string(),
            terrain_strength: 1.0,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 4,
            cache_radius: 6,
            clamp_vertical: true,
            collision_radius: 1,
            lod_shell_width: 2,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            radius: 8,
            attenuation_step: 32,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: PersistenceMode::Differential,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_in_flight: 64,
            tick_budget_ms: 4.0,
            target_tick_hz: 60,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Worker count with the `0 = auto` rule applied.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        }
    }
}

/// Platform config directory for Lattice, falling back to the working directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("lattice"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Validation ---

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl Config {
    /// Check every cross-field constraint. Called once by [`Config::load_or_create`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.world;
        if w.name.is_empty() || w.name.contains(['/', '\\']) {
            return Err(invalid(
                "world.name",
                format!("{:?} is not a valid directory name", w.name),
            ));
        }
        if !w.chunk_edge.is_power_of_two() || !(4..=64).contains(&w.chunk_edge) {
            return Err(invalid(
                "world.chunk_edge",
                format!("{} is not a power of two in 4..=64", w.chunk_edge),
            ));
        }
        if w.min_y >= w.max_y {
            return Err(invalid(
                "world.min_y",
                format!("min_y {} must be below max_y {}", w.min_y, w.max_y),
            ));
        }
        let edge = w.chunk_edge as i32;
        if w.min_y.rem_euclid(edge) != 0 || w.max_y.rem_euclid(edge) != 0 {
            return Err(invalid(
                "world.max_y",
                format!("min_y and max_y must be multiples of chunk_edge {edge}"),
            ));
        }

        let s = &self.streaming;
        if s.load_radius >= s.cache_radius {
            return Err(invalid(
                "streaming.load_radius",
                format!(
                    "load_radius {} must be below cache_radius {}",
                    s.load_radius, s.cache_radius
                ),
            ));
        }

        if self.lighting.attenuation_step == 0 {
            return Err(invalid("lighting.attenuation_step", "must be non-zero"));
        }

        let sch = &self.scheduler;
        if !(sch.tick_budget_ms.is_finite() && sch.tick_budget_ms > 0.0) {
            return Err(invalid("scheduler.tick_budget_ms", "must be positive"));
        }
        if sch.max_in_flight == 0 {
            return Err(invalid("scheduler.max_in_flight", "must be non-zero"));
        }
        if sch.target_tick_hz == 0 {
            return Err(invalid("scheduler.target_tick_hz", "must be non-zero"));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    ///
    /// The loaded config is validated before it is returned.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    ///
    /// A changed file that fails validation is reported as an error and the
    /// caller keeps running on the current config.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            new_config.validate()?;
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
