//! Persistent, rotation-aware position storage.
//!
//! One logical map from canonical position keys to records, layered over two
//! physical backends: a bounded in-memory transposition table and an
//! unbounded on-disk database. Shallow positions (few stones) persist in the
//! database across runs; deep positions cycle through the table.

pub mod disk;
pub mod state_db;
pub mod tt;

use std::collections::HashSet;

use hexel_core::{Cell, State};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
pub use state_db::{DbStats, StateDb};
pub use tt::{TranspositionTable, TtStats};

/// A record storable under a position.
pub trait StoreEntry:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Map every orientation-dependent field to its 180-degree image.
    /// Orientation-independent fields are left alone.
    fn rotate(&mut self, size: u8);

    /// Whether this record is more valuable to keep than `other` when a
    /// transposition-table block is full.
    fn replaces(&self, other: &Self) -> bool;

    /// Best move stored in the record, if it has one. Used to walk stored
    /// variations.
    fn stored_move(&self) -> Option<Cell> {
        None
    }
}

/// The canonical key of a position: the lesser of its own hash and its
/// rotation's hash.
pub fn canonical_key(state: &State) -> u64 {
    state.hash().min(state.rotated().hash())
}

/// Data is stored for the orientation of the minimum hash; the other
/// orientation must rotate payloads on the way in and out.
pub fn needs_rotation(state: &State, key: u64) -> bool {
    state.hash() != key
}

/// A set of positions, canonical under rotation.
#[derive(Debug, Default, Clone)]
pub struct PositionSet {
    set: HashSet<u64>,
}

impl PositionSet {
    /// Empty set.
    pub fn new() -> PositionSet {
        PositionSet::default()
    }

    /// Insert a position.
    pub fn insert(&mut self, state: &State) {
        self.set.insert(canonical_key(state));
    }

    /// Whether the position (in either orientation) is present.
    pub fn contains(&self, state: &State) -> bool {
        self.set.contains(&canonical_key(state))
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Drop every position.
    pub fn clear(&mut self) {
        self.set.clear();
    }
}

/// Storage policy: positions with at most this many stones go to the
/// database, the rest to the transposition table.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Stone-count threshold for the database split.
    pub max_stones: u32,
    /// Transposition-table capacity in entries.
    pub tt_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> StoreConfig {
        StoreConfig {
            max_stones: 10,
            tt_capacity: 1 << 16,
        }
    }
}

/// Combined transposition table and position database.
///
/// Both paths are canonical under rotation: records are held in the
/// orientation of the minimum hash and rotated at the boundary, so callers
/// always see their own orientation.
pub struct PositionStore<T> {
    tt: TranspositionTable<T>,
    db: Option<StateDb<T>>,
    max_stones: u32,
}

impl<T: StoreEntry> PositionStore<T> {
    /// Create a store with a transposition table only.
    pub fn new(config: StoreConfig) -> PositionStore<T> {
        PositionStore {
            tt: TranspositionTable::new(config.tt_capacity),
            db: None,
            max_stones: config.max_stones,
        }
    }

    /// Attach a database for shallow positions.
    pub fn set_db(&mut self, db: StateDb<T>) {
        self.db = Some(db);
    }

    /// Detach and return the database, if one was attached.
    pub fn take_db(&mut self) -> Option<StateDb<T>> {
        self.db.take()
    }

    /// The attached database, if any.
    pub fn db(&self) -> Option<&StateDb<T>> {
        self.db.as_ref()
    }

    /// The transposition table.
    pub fn tt(&self) -> &TranspositionTable<T> {
        &self.tt
    }

    /// The stone-count split threshold.
    pub fn max_stones(&self) -> u32 {
        self.max_stones
    }

    /// Change the stone-count split threshold.
    pub fn set_max_stones(&mut self, max_stones: u32) {
        self.max_stones = max_stones;
    }

    fn uses_db(&self, state: &State) -> bool {
        self.db.is_some() && state.num_stones() <= self.max_stones
    }

    /// Read the record for a position in the position's own orientation.
    pub fn get(&self, state: &State) -> Result<Option<T>, StoreError> {
        if self.uses_db(state) {
            return self.db.as_ref().expect("checked by uses_db").get(state);
        }
        let key = canonical_key(state);
        let Some(mut data) = self.tt.lookup(key) else {
            return Ok(None);
        };
        if needs_rotation(state, key) {
            data.rotate(state.board().size());
        }
        Ok(Some(data))
    }

    /// Write the record for a position given in the position's orientation.
    pub fn put(&self, state: &State, data: &T) -> Result<(), StoreError> {
        if self.uses_db(state) {
            return self.db.as_ref().expect("checked by uses_db").put(state, data);
        }
        let key = canonical_key(state);
        if needs_rotation(state, key) {
            let mut rotated = data.clone();
            rotated.rotate(state.board().size());
            self.tt.store(key, rotated);
        } else {
            self.tt.store(key, data.clone());
        }
        Ok(())
    }

    /// Force database writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        if let Some(db) = &self.db {
            db.flush()?;
        }
        Ok(())
    }

    /// Drop every transposition-table entry.
    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Follow stored best moves from a position to build a variation.
    ///
    /// The walk ends at the first position without a record or without a
    /// stored move.
    pub fn variation(&self, state: &State) -> Result<Vec<Cell>, StoreError> {
        let mut current = *state;
        let mut line = Vec::new();
        while let Some(record) = self.get(&current)? {
            let Some(best) = record.stored_move() else {
                break;
            };
            line.push(best);
            if current.play(best).is_err() {
                break;
            }
        }
        Ok(line)
    }
}

impl<T> std::fmt::Debug for PositionStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore")
            .field("max_stones", &self.max_stones)
            .field("has_db", &self.db.is_some())
            .finish()
    }
}
