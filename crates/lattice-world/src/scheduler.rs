//! Owned tick loop.
//!
//! Drives [`VoxelWorld::tick`] at a target rate, measuring the real time
//! between ticks and sleeping off whatever is left of each frame.

use std::time::{Duration, Instant};

use lattice_config::SchedulerConfig;

use crate::host::Host;
use crate::stats::TickStats;
use crate::world::VoxelWorld;

/// Longest `dt` handed to a single tick. Slower frames are clamped and the
/// world simply falls behind.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(250);

/// Fixed-rate tick loop.
pub struct Scheduler {
    /// Target period, `None` to run flat out.
    period: Option<Duration>,
    tick_count: u64,
    total: TickStats,
}

impl Scheduler {
    /// Scheduler targeting `target_hz` ticks per second. Zero runs without
    /// sleeping.
    pub fn new(target_hz: u32) -> Self {
        Self {
            period: (target_hz > 0).then(|| Duration::from_secs_f64(1.0 / target_hz as f64)),
            tick_count: 0,
            total: TickStats::default(),
        }
    }

    /// Scheduler using the configured tick rate.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.target_tick_hz)
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Counters summed over every tick run so far.
    pub fn total(&self) -> TickStats {
        self.total
    }

    /// Runs until `max_ticks` ticks have run (forever when `None`).
    pub fn run<H: Host + ?Sized>(
        &mut self,
        world: &mut VoxelWorld,
        host: &mut H,
        max_ticks: Option<u64>,
    ) -> TickStats {
        self.run_with(world, host, max_ticks, |_, _, _| true)
    }

    /// Like [`Scheduler::run`], calling `on_tick(index, world, host)` before
    /// every tick. Returning `false` stops the loop.
    pub fn run_with<H, F>(
        &mut self,
        world: &mut VoxelWorld,
        host: &mut H,
        max_ticks: Option<u64>,
        mut on_tick: F,
    ) -> TickStats
    where
        H: Host + ?Sized,
        F: FnMut(u64, &mut VoxelWorld, &mut H) -> bool,
    {
        let mut run = TickStats::default();
        let mut previous = Instant::now();
        let mut index = 0;

        while max_ticks.is_none_or(|max| index < max) {
            if !on_tick(index, world, host) {
                break;
            }
            let frame_start = Instant::now();
            let mut dt = frame_start.duration_since(previous);
            previous = frame_start;
            if dt > MAX_FRAME_TIME {
                tracing::warn!(
                    "frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                    dt.as_secs_f64() * 1000.0,
                    MAX_FRAME_TIME.as_secs_f64() * 1000.0
                );
                dt = MAX_FRAME_TIME;
            }

            let stats = world.tick(dt, host);
            run += stats;
            self.total += stats;
            self.tick_count += 1;
            index += 1;

            if let Some(period) = self.period {
                let spent = frame_start.elapsed();
                if spent < period {
                    std::thread::sleep(period - spent);
                }
            }
        }
        run
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}
