//! Virtual-bounds table coordinating parallel workers.
//!
//! Workers advertise the sub-goals they are searching by installing virtual
//! bounds here. Other workers descending through the same node see the
//! inflated bounds and are deflected into different branches. Entries are
//! advisory only: they steer workers apart but never affect correctness,
//! and nothing here is persisted.

use std::sync::Mutex;

use crate::bounds::Bounds;

/// Maximum number of concurrent workers (bitmask width).
pub const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Entry {
    hash: u64,
    workers: u64,
    bounds: Bounds,
}

/// Per-depth table of worker claims.
pub struct VirtualBounds {
    depths: Vec<Mutex<Vec<Entry>>>,
}

impl VirtualBounds {
    /// Create a table covering descents up to `max_depth` moves deep.
    pub fn new(max_depth: usize) -> VirtualBounds {
        let mut depths = Vec::new();
        depths.resize_with(max_depth + 1, || Mutex::new(Vec::new()));
        VirtualBounds { depths }
    }

    /// Claim a position for a worker, advertising the given bounds.
    ///
    /// If other workers already claimed it, the bitmasks merge and the more
    /// deflecting (component-wise larger) bounds win.
    pub fn claim(&self, depth: usize, hash: u64, worker: usize, bounds: Bounds) {
        debug_assert!(worker < MAX_WORKERS);
        let mut entries = self.depths[depth].lock().expect("vtt lock poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.hash == hash) {
            entry.workers |= 1 << worker;
            entry.bounds.phi = entry.bounds.phi.max(bounds.phi);
            entry.bounds.delta = entry.bounds.delta.max(bounds.delta);
        } else {
            entries.push(Entry {
                hash,
                workers: 1 << worker,
                bounds,
            });
        }
    }

    /// The advertised bounds for a position, if any worker claims it.
    pub fn read(&self, depth: usize, hash: u64) -> Option<Bounds> {
        let entries = self.depths[depth].lock().expect("vtt lock poisoned");
        entries.iter().find(|e| e.hash == hash).map(|e| e.bounds)
    }

    /// Remove a worker's claim, installing the freshly computed real bounds
    /// for any remaining claimants.
    ///
    /// Returns the bitmask of other workers that still hold the entry when
    /// the position resolved — those workers have the solved position on
    /// their current path and should abandon their descent.
    pub fn release(
        &self,
        depth: usize,
        hash: u64,
        worker: usize,
        bounds: Bounds,
        solved: bool,
    ) -> u64 {
        debug_assert!(worker < MAX_WORKERS);
        let mut entries = self.depths[depth].lock().expect("vtt lock poisoned");
        let Some(index) = entries.iter().position(|e| e.hash == hash) else {
            return 0;
        };
        entries[index].workers &= !(1 << worker);
        let remaining = entries[index].workers;
        if remaining == 0 {
            entries.swap_remove(index);
        } else {
            entries[index].bounds = bounds;
        }
        if solved { remaining } else { 0 }
    }
}

impl std::fmt::Debug for VirtualBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualBounds")
            .field("max_depth", &(self.depths.len() - 1))
            .finish()
    }
}
