//! Reusable scratch memory for meshing jobs.
//!
//! A job checks out a [`MeshScratch`] through [`ScratchPool::checkout`] and
//! gets a [`ScratchGuard`]. The guard hands the scratch back to the pool when
//! it is dropped, whether the job finished, bailed out early or was
//! cancelled, so two jobs never share live scratch memory.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Per-job working memory.
#[derive(Debug, Default)]
pub struct MeshScratch {
    /// Visible-face bitmask per interior voxel (bit = [`crate::FaceDirection`] index).
    pub face_masks: Vec<u8>,
}

impl MeshScratch {
    fn reset(&mut self, volume: usize) {
        self.face_masks.clear();
        self.face_masks.resize(volume, 0);
    }
}

/// Free list of scratch buffers shared by all meshing workers.
#[derive(Debug, Default)]
pub struct ScratchPool {
    free: Mutex<Vec<MeshScratch>>,
    /// Upper bound on retained free entries.
    capacity: usize,
}

impl ScratchPool {
    /// Creates a pool retaining at most `capacity` idle scratch buffers.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        })
    }

    /// Checks out a scratch buffer sized for `volume` voxels.
    pub fn checkout(self: &Arc<Self>, volume: usize) -> ScratchGuard {
        let mut scratch = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop())
            .unwrap_or_default();
        scratch.reset(volume);
        ScratchGuard {
            scratch,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|f| f.len()).unwrap_or(0)
    }

    fn give_back(&self, scratch: MeshScratch) {
        if let Ok(mut free) = self.free.lock()
            && free.len() < self.capacity
        {
            free.push(scratch);
        }
    }
}

/// Scoped checkout; returns the scratch to its pool on drop.
pub struct ScratchGuard {
    scratch: MeshScratch,
    pool: Arc<ScratchPool>,
}

impl Deref for ScratchGuard {
    type Target = MeshScratch;

    fn deref(&self) -> &MeshScratch {
        &self.scratch
    }
}

impl DerefMut for ScratchGuard {
    fn deref_mut(&mut self) -> &mut MeshScratch {
        &mut self.scratch
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.scratch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_returns_on_drop() {
        let pool = ScratchPool::new(4);
        {
            let mut s = pool.checkout(64);
            assert_eq!(s.face_masks.len(), 64);
            s.face_masks[3] = 0b11;
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_reused_scratch_is_cleared() {
        let pool = ScratchPool::new(4);
        {
            let mut s = pool.checkout(8);
            s.face_masks.fill(0xFF);
        }
        let s = pool.checkout(8);
        assert!(s.face_masks.iter().all(|&m| m == 0));
    }

    #[test]
    fn test_concurrent_checkouts_are_distinct() {
        let pool = ScratchPool::new(4);
        let mut a = pool.checkout(4);
        let b = pool.checkout(4);
        a.face_masks[0] = 1;
        assert_eq!(b.face_masks[0], 0);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_capacity_limits_retained() {
        let pool = ScratchPool::new(1);
        let a = pool.checkout(4);
        let b = pool.checkout(4);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_returned_on_unwind() {
        let pool = ScratchPool::new(2);
        let p = Arc::clone(&pool);
        let result = std::thread::spawn(move || {
            let _s = p.checkout(16);
            panic!("job cancelled");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }
}
