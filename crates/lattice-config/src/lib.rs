//! Configuration system for the Lattice voxel engine.
//!
//! World bounds, streaming radii, lighting constants, persistence mode and
//! scheduler limits live in strongly typed structs that persist to disk as
//! RON. Every section has named defaults, the whole tree is validated once at
//! load time, and command-line arguments can override individual values.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, CliPersistence};
pub use config::{
    Config, DebugConfig, LightingConfig, PersistenceConfig, PersistenceMode, SchedulerConfig,
    StreamingConfig, WorldConfig, default_config_dir,
};
pub use error::ConfigError;
