//! Viewer-centred classification of chunk offsets.
//!
//! The clipmap knows nothing about which chunks exist. It maps an offset
//! (in whole chunks, relative to the viewer's chunk) to a [`ClipmapItem`]
//! and holds a distance-sorted template of every offset inside the load
//! window, nearest first.

use glam::{IVec3, Vec3};
use lattice_voxel::WorldBounds;

/// Radii and switches that shape the streaming window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamingSettings {
    /// Chunks within this Chebyshev distance are loaded and meshed.
    pub load_radius: i32,
    /// Chunks beyond this distance are saved and removed.
    pub cache_radius: i32,
    /// Ignore the viewer's vertical position and keep every layer loaded.
    pub clamp_vertical: bool,
    /// Chunks within this distance also get collision geometry.
    pub collision_radius: i32,
    /// Width of each level-of-detail shell in chunks; 0 disables LOD.
    pub lod_shell_width: i32,
}

impl Default for StreamingSettings {
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

/// Classification of one chunk offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipmapItem {
    /// Beyond the cache window; should not be retained.
    Outside,
    /// Retained but not requested.
    Cached,
    /// Inside the load window.
    Visible {
        /// Level of detail, 0 nearest.
        lod: u8,
    },
}

/// Precomputed streaming window for one world.
#[derive(Clone, Debug)]
pub struct Clipmap {
    settings: StreamingSettings,
    edge: i32,
    /// Lowest and highest chunk layer inside the world.
    layers: (i32, i32),
    /// Pinned viewer layer when vertical motion is ignored.
    pinned_layer: Option<i32>,
    vertical_load: i32,
    vertical_cache: i32,
    template: Vec<IVec3>,
}

impl Clipmap {
    /// Builds the clipmap and its offset template.
    pub fn new(settings: StreamingSettings, bounds: WorldBounds) -> Self {
        let edge = bounds.edge;
        let low = bounds.min_y.div_euclid(edge);
        let high = (bounds.max_y - 1).div_euclid(edge).max(low);

        let (pinned_layer, vertical_load, vertical_cache) = if settings.clamp_vertical {
            let mid = low + (high - low) / 2;
            let reach = (mid - low).max(high - mid);
            (Some(mid), reach, reach)
        } else {
            (None, settings.load_radius, settings.cache_radius)
        };

        let r = settings.load_radius;
        let mut template = Vec::new();
        for dz in -r..=r {
            for dy in -vertical_load..=vertical_load {
                for dx in -r..=r {
                    template.push(IVec3::new(dx, dy, dz));
                }
            }
        }
        template.sort_by_key(|o| (o.length_squared(), o.y, o.z, o.x));

        Self {
            settings,
            edge,
            layers: (low, high),
            pinned_layer,
            vertical_load,
            vertical_cache,
            template,
        }
    }

    /// Settings the clipmap was built from.
    pub fn settings(&self) -> &StreamingSettings {
        &self.settings
    }

    /// Offsets inside the load window, nearest first.
    pub fn template(&self) -> &[IVec3] {
        &self.template
    }

    /// Chunk-grid position of the viewer, with vertical clamping applied.
    pub fn center(&self, viewer: Vec3) -> IVec3 {
        let mut grid = viewer.floor().as_ivec3().div_euclid(IVec3::splat(self.edge));
        if let Some(layer) = self.pinned_layer {
            grid.y = layer;
        }
        grid
    }

    /// Chunk layer lies inside the world.
    pub fn in_world(&self, grid: IVec3) -> bool {
        grid.y >= self.layers.0 && grid.y <= self.layers.1
    }

    /// Inclusive load window around `center`, clipped to the world layers.
    /// `None` when the clipped window is empty.
    pub fn load_box(&self, center: IVec3) -> Option<(IVec3, IVec3)> {
        let reach = IVec3::new(self.settings.load_radius, self.vertical_load, self.settings.load_radius);
        let mut min = center - reach;
        let mut max = center + reach;
        min.y = min.y.max(self.layers.0);
        max.y = max.y.min(self.layers.1);
        (min.y <= max.y).then_some((min, max))
    }

    /// Classifies an offset from the viewer's chunk.
    pub fn classify(&self, offset: IVec3) -> ClipmapItem {
        let horizontal = offset.x.abs().max(offset.z.abs());
        let vertical = offset.y.abs();
        if horizontal <= self.settings.load_radius && vertical <= self.vertical_load {
            ClipmapItem::Visible {
                lod: self.lod(offset),
            }
        } else if horizontal <= self.settings.cache_radius && vertical <= self.vertical_cache {
            ClipmapItem::Cached
        } else {
            ClipmapItem::Outside
        }
    }

    /// Level of detail for an offset: one level per shell of
    /// `lod_shell_width` chunks.
    pub fn lod(&self, offset: IVec3) -> u8 {
        let width = self.settings.lod_shell_width;
        if width <= 0 {
            return 0;
        }
        let dist = offset.abs().max_element();
        (dist / width).min(u8::MAX as i32) as u8
    }

    /// Offset lies within the collision radius.
    pub fn wants_collision(&self, offset: IVec3) -> bool {
        let r = self.settings.collision_radius;
        let vertical = if self.pinned_layer.is_some() { 0 } else { offset.y.abs() };
        offset.x.abs() <= r && offset.z.abs() <= r && vertical <= r
    }
}
