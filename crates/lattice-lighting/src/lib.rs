//! Radius-bounded sunlight and block-light recomputation over the world map.

pub mod propagate;

pub use propagate::{LightPropagator, LightSettings};
