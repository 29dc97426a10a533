//! Bounded-associative in-memory transposition table.
//!
//! The table probes `WAYS` consecutive slots per hash. A new entry always
//! lands in the probed block, displacing the least valuable occupant when
//! the block is full (the `replaces` criterion — work-based for search
//! records). Readers take the shared lock, the mutator takes the exclusive
//! lock briefly.

use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;
use crate::store::StoreEntry;

/// Associativity of the probe block.
const WAYS: usize = 4;

#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct Slot<T> {
    hash: u64,
    data: T,
}

/// Counters for table traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct TtStats {
    /// Lookup attempts.
    pub lookups: u64,
    /// Successful lookups.
    pub hits: u64,
    /// Store attempts.
    pub stores: u64,
    /// Stores into a full block.
    pub collisions: u64,
}

#[derive(Default)]
struct AtomicTtStats {
    lookups: AtomicU64,
    hits: AtomicU64,
    stores: AtomicU64,
    collisions: AtomicU64,
}

/// Fixed-capacity transposition table.
///
/// The slot array is `capacity + WAYS - 1` long so a probe block never
/// wraps, avoiding a modulo in the scan.
pub struct TranspositionTable<T> {
    slots: RwLock<Vec<Option<Slot<T>>>>,
    capacity: usize,
    stats: AtomicTtStats,
}

impl<T: StoreEntry> TranspositionTable<T> {
    /// Create a table with room for `capacity` entries.
    pub fn new(capacity: usize) -> TranspositionTable<T> {
        let capacity = capacity.max(1);
        let mut slots = Vec::new();
        slots.resize_with(capacity + WAYS - 1, || None);
        TranspositionTable {
            slots: RwLock::new(slots),
            capacity,
            stats: AtomicTtStats::default(),
        }
    }

    /// Nominal capacity in entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up the record stored under a hash.
    pub fn lookup(&self, hash: u64) -> Option<T> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);
        let slots = self.slots.read().expect("tt lock poisoned");
        let start = (hash % self.capacity as u64) as usize;
        for slot in slots[start..start + WAYS].iter() {
            match slot {
                Some(entry) if entry.hash == hash => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.data.clone());
                }
                Some(_) => continue,
                // Blocks fill front to back: an empty slot ends the probe
                None => return None,
            }
        }
        None
    }

    /// Store a record, displacing the least valuable block occupant if the
    /// block is full.
    pub fn store(&self, hash: u64, data: T) {
        self.stats.stores.fetch_add(1, Ordering::Relaxed);
        let mut slots = self.slots.write().expect("tt lock poisoned");
        let start = (hash % self.capacity as u64) as usize;
        let mut victim = start;
        let mut collision = true;
        for i in start..start + WAYS {
            match &slots[i] {
                None => {
                    victim = i;
                    collision = false;
                    break;
                }
                Some(entry) if entry.hash == hash => {
                    victim = i;
                    collision = false;
                    break;
                }
                Some(entry) => {
                    if let Some(best) = &slots[victim]
                        && best.data.replaces(&entry.data)
                    {
                        victim = i;
                    }
                }
            }
        }
        if collision {
            self.stats.collisions.fetch_add(1, Ordering::Relaxed);
        }
        slots[victim] = Some(Slot { hash, data });
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&self) {
        let mut slots = self.slots.write().expect("tt lock poisoned");
        for slot in slots.iter_mut() {
            *slot = None;
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        let slots = self.slots.read().expect("tt lock poisoned");
        slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no slots are occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Traffic counters.
    pub fn stats(&self) -> TtStats {
        TtStats {
            lookups: self.stats.lookups.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            stores: self.stats.stores.load(Ordering::Relaxed),
            collisions: self.stats.collisions.load(Ordering::Relaxed),
        }
    }

    /// Write a snapshot of the occupied slots to a file.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let slots = self.slots.read().expect("tt lock poisoned");
        let entries: Vec<(u64, T)> = slots
            .iter()
            .flatten()
            .map(|slot| (slot.hash, slot.data.clone()))
            .collect();
        drop(slots);
        let bytes = bincode::serialize(&entries)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Restore entries from a snapshot written by [`save`](Self::save).
    pub fn load(&self, path: &Path) -> Result<usize, StoreError> {
        let bytes = std::fs::read(path)?;
        let entries: Vec<(u64, T)> = bincode::deserialize(&bytes)?;
        let count = entries.len();
        for (hash, data) in entries {
            self.store(hash, data);
        }
        Ok(count)
    }
}

impl<T> std::fmt::Debug for TranspositionTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        work: u64,
    }

    impl StoreEntry for Rec {
        fn rotate(&mut self, _size: u8) {}

        fn replaces(&self, other: &Rec) -> bool {
            self.work > other.work
        }
    }

    #[test]
    fn store_lookup_roundtrip() {
        let tt = TranspositionTable::new(64);
        tt.store(5, Rec { work: 1 });
        assert_eq!(tt.lookup(5), Some(Rec { work: 1 }));
        assert_eq!(tt.lookup(6), None);
    }

    #[test]
    fn same_hash_overwrites_in_place() {
        let tt = TranspositionTable::new(64);
        tt.store(5, Rec { work: 1 });
        tt.store(5, Rec { work: 9 });
        assert_eq!(tt.lookup(5), Some(Rec { work: 9 }));
        assert_eq!(tt.len(), 1);
    }

    #[test]
    fn full_block_displaces_least_work() {
        // Capacity 1: every hash probes the same block of WAYS slots
        let tt = TranspositionTable::new(1);
        tt.store(10, Rec { work: 10 });
        tt.store(20, Rec { work: 20 });
        tt.store(30, Rec { work: 5 });
        tt.store(40, Rec { work: 40 });
        assert_eq!(tt.len(), 4);
        // Block is full; work 5 is the victim
        tt.store(50, Rec { work: 50 });
        assert_eq!(tt.lookup(30), None, "least-work entry should be displaced");
        assert!(tt.lookup(10).is_some());
        assert!(tt.lookup(50).is_some());
        assert_eq!(tt.stats().collisions, 1);
    }

    #[test]
    fn clear_keeps_capacity() {
        let tt = TranspositionTable::new(8);
        tt.store(1, Rec { work: 1 });
        tt.clear();
        assert!(tt.is_empty());
        assert_eq!(tt.capacity(), 8);
        assert_eq!(tt.lookup(1), None);
    }

    #[test]
    fn stats_track_traffic() {
        let tt = TranspositionTable::new(8);
        tt.store(1, Rec { work: 1 });
        let _ = tt.lookup(1);
        let _ = tt.lookup(2);
        let stats = tt.stats();
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tt.bak");
        let tt = TranspositionTable::new(64);
        tt.store(1, Rec { work: 1 });
        tt.store(2, Rec { work: 2 });
        tt.save(&path).unwrap();

        let restored: TranspositionTable<Rec> = TranspositionTable::new(64);
        assert_eq!(restored.load(&path).unwrap(), 2);
        assert_eq!(restored.lookup(1), Some(Rec { work: 1 }));
        assert_eq!(restored.lookup(2), Some(Rec { work: 2 }));
    }
}
