//! Per-tick counters.

use std::fmt;
use std::ops::AddAssign;

/// What one tick (or a run of ticks) did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Chunks created, by streaming or as neighbour dependencies.
    pub created: u32,
    /// Chunks removed after saving.
    pub removed: u32,
    /// Generation results applied.
    pub generated: u32,
    /// Meshing jobs submitted.
    pub meshed: u32,
    /// Render meshes handed to the host.
    pub committed: u32,
    /// Background results dropped as stale.
    pub discarded: u32,
    /// Save files written.
    pub saved: u32,
    /// Save files that failed to decode; the chunk kept its generated state.
    pub load_failures: u32,
    /// Save files that could not be written.
    pub save_failures: u32,
}

impl TickStats {
    /// Nothing happened.
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for TickStats {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.removed += rhs.removed;
        self.generated += rhs.generated;
        self.meshed += rhs.meshed;
        self.committed += rhs.committed;
        self.discarded += rhs.discarded;
        self.saved += rhs.saved;
        self.load_failures += rhs.load_failures;
        self.save_failures += rhs.save_failures;
    }
}

impl fmt::Display for TickStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {} removed {} generated {} meshed {} committed {} discarded {} saved {} load failures {} save failures {}",
            self.created,
            self.removed,
            self.generated,
            self.meshed,
            self.committed,
            self.discarded,
            self.saved,
            self.load_failures,
            self.save_failures
        )
    }
}
