//! Viewer-relative streaming: which chunks should exist, which are visible,
//! and which should leave.

pub mod clipmap;
pub mod frustum;
pub mod manager;

pub use clipmap::{Clipmap, ClipmapItem, StreamingSettings};
pub use frustum::{Aabb, Containment, Frustum};
pub use manager::{StreamPlan, StreamingManager};
