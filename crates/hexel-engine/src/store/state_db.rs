//! Rotation-aware position database.
//!
//! Positions are stored under their canonical key — the lesser of the
//! position's own hash and its 180-degree rotation's hash. Data always lives
//! in the canonical orientation; when the queried orientation is the other
//! one, payloads are rotated on the way in and out. Callers never see
//! anything but their own orientation.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use hexel_core::State;

use crate::error::StoreError;
use crate::store::disk::DiskDb;
use crate::store::{StoreEntry, canonical_key, needs_rotation};

/// Counters for database traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbStats {
    /// Read attempts.
    pub gets: u64,
    /// Successful reads.
    pub hits: u64,
    /// Writes.
    pub puts: u64,
    /// Payload rotations performed on either path.
    pub rotations: u64,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "reads {} hits {} writes {} rotations {}",
            self.gets, self.hits, self.puts, self.rotations
        )
    }
}

#[derive(Default)]
struct AtomicDbStats {
    gets: AtomicU64,
    hits: AtomicU64,
    puts: AtomicU64,
    rotations: AtomicU64,
}

/// A position database handling rotations.
pub struct StateDb<T> {
    db: DiskDb<T>,
    stats: AtomicDbStats,
}

impl<T: StoreEntry> StateDb<T> {
    /// Open a database, creating it if necessary.
    pub fn open(path: &Path, tag: &str) -> Result<StateDb<T>, StoreError> {
        Ok(StateDb {
            db: DiskDb::open(path, tag)?,
            stats: AtomicDbStats::default(),
        })
    }

    /// Whether the position (in either orientation) exists.
    pub fn exists(&self, state: &State) -> Result<bool, StoreError> {
        self.db.exists(canonical_key(state))
    }

    /// Read the record for a position, in the position's own orientation.
    pub fn get(&self, state: &State) -> Result<Option<T>, StoreError> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        let key = canonical_key(state);
        let Some(mut data) = self.db.get(key)? else {
            return Ok(None);
        };
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        if needs_rotation(state, key) {
            self.stats.rotations.fetch_add(1, Ordering::Relaxed);
            data.rotate(state.board().size());
        }
        Ok(Some(data))
    }

    /// Write the record for a position given in the position's orientation.
    pub fn put(&self, state: &State, data: &T) -> Result<(), StoreError> {
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        let key = canonical_key(state);
        if needs_rotation(state, key) {
            self.stats.rotations.fetch_add(1, Ordering::Relaxed);
            let mut rotated = data.clone();
            rotated.rotate(state.board().size());
            self.db.put(key, &rotated)
        } else {
            self.db.put(key, data)
        }
    }

    /// Force buffered writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()
    }

    /// Number of stored positions.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Whether the database holds no positions.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// The path this database was opened at.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Snapshot the database to a sibling path.
    pub fn backup_to(&self, dest: &Path) -> Result<(), StoreError> {
        self.db.backup_to(dest)
    }

    /// Traffic counters.
    pub fn stats(&self) -> DbStats {
        DbStats {
            gets: self.stats.gets.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            puts: self.stats.puts.load(Ordering::Relaxed),
            rotations: self.stats.rotations.load(Ordering::Relaxed),
        }
    }
}

impl<T: StoreEntry> std::fmt::Debug for StateDb<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb").field("path", &self.path()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexel_core::{Cell, Color};
    use serde::{Deserialize, Serialize};

    /// A record whose only payload is an orientation-dependent cell.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        best: Cell,
    }

    impl StoreEntry for Rec {
        fn rotate(&mut self, size: u8) {
            self.best = self.best.rotated(size);
        }

        fn replaces(&self, _other: &Rec) -> bool {
            true
        }
    }

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    /// An asymmetric 5x5 position (distinct from its rotation).
    fn asymmetric_state() -> State {
        let mut state = State::new(5).unwrap();
        state.play(cell("a1")).unwrap();
        state.play(cell("b3")).unwrap();
        state
    }

    #[test]
    fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db: StateDb<Rec> = StateDb::open(&dir.path().join("db"), "T").unwrap();
        let state = asymmetric_state();
        let rec = Rec { best: cell("c2") };
        db.put(&state, &rec).unwrap();
        assert_eq!(db.get(&state).unwrap(), Some(rec));
    }

    #[test]
    fn rotated_query_sees_rotated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let db: StateDb<Rec> = StateDb::open(&dir.path().join("db"), "T").unwrap();
        let state = asymmetric_state();
        db.put(&state, &Rec { best: cell("c2") }).unwrap();

        let rotated = state.rotated();
        assert!(db.exists(&rotated).unwrap());
        let fetched = db.get(&rotated).unwrap().unwrap();
        assert_eq!(fetched.best, cell("c2").rotated(5), "payload must follow orientation");
    }

    #[test]
    fn put_in_either_orientation_is_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let db: StateDb<Rec> = StateDb::open(&dir.path().join("db"), "T").unwrap();
        let state = asymmetric_state();
        let rotated = state.rotated();

        db.put(&state, &Rec { best: cell("c2") }).unwrap();
        let mut rotated_rec = Rec { best: cell("c2") };
        rotated_rec.rotate(5);
        db.put(&rotated, &rotated_rec).unwrap();

        assert_eq!(db.len(), 1, "both orientations share one canonical record");
        assert_eq!(db.get(&state).unwrap(), Some(Rec { best: cell("c2") }));
    }

    #[test]
    fn stats_count_rotations() {
        let dir = tempfile::tempdir().unwrap();
        let db: StateDb<Rec> = StateDb::open(&dir.path().join("db"), "T").unwrap();
        let state = asymmetric_state();
        db.put(&state, &Rec { best: cell("c2") }).unwrap();
        let _ = db.get(&state).unwrap();
        let _ = db.get(&state.rotated()).unwrap();
        let stats = db.stats();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hits, 2);
        // Exactly one of the two orientations rotates on read; the write
        // contributes one more if the queried orientation was non-canonical.
        assert!(stats.rotations >= 1);
    }

    #[test]
    fn missing_position_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let db: StateDb<Rec> = StateDb::open(&dir.path().join("db"), "T").unwrap();
        let state = State::new(5).unwrap();
        assert_eq!(db.get(&state).unwrap(), None);
        assert!(!db.exists(&state).unwrap());
    }

    #[test]
    fn different_movers_are_different_positions() {
        let dir = tempfile::tempdir().unwrap();
        let db: StateDb<Rec> = StateDb::open(&dir.path().join("db"), "T").unwrap();
        let state = asymmetric_state();
        let other = State::from_board(*state.board(), Color::White);
        db.put(&state, &Rec { best: cell("c2") }).unwrap();
        assert_eq!(db.get(&other).unwrap(), None);
    }
}
