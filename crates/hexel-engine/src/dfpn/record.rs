//! Per-position payload of the DFPN search.

use hexel_core::{Cell, CellSet};
use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::children::Children;
use crate::store::StoreEntry;

/// Version tag of the DFPN database schema. Bump when [`SearchRecord`]
/// changes in a way that invalidates old databases.
pub const DFPN_DB_VERSION: &str = "HEXEL_DFPN_VER_0001";

/// Everything the search remembers about one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Current proof/disproof bounds.
    pub bounds: Bounds,

    /// Consider moves, best-first by static score.
    pub children: Children,

    /// Move realizing the proven outcome, once solved.
    pub best_move: Option<Cell>,

    /// Node expansions that contributed to the bounds. Replacement
    /// criterion in the bounded table, widening clock for the live window.
    pub work: u64,

    /// Cells that must remain empty in any proof this record witnesses.
    /// Enables pruning of siblings that cannot disturb the proof.
    pub max_proof: CellSet,

    /// Static evaluation of the position, kept for reporting.
    pub eval: f32,
}

impl SearchRecord {
    /// A record holding only ordered children, bounds still fresh.
    pub fn with_children(children: Children, eval: f32) -> SearchRecord {
        SearchRecord {
            bounds: Bounds::default(),
            children,
            best_move: None,
            work: 0,
            max_proof: CellSet::EMPTY,
            eval,
        }
    }

    /// A solved record for a rule-terminal position.
    pub fn terminal(bounds: Bounds, eval: f32) -> SearchRecord {
        SearchRecord {
            bounds,
            children: Children::default(),
            best_move: None,
            work: 0,
            max_proof: CellSet::EMPTY,
            eval,
        }
    }

    /// Whether the search has not expanded this position yet.
    pub fn is_fresh(&self) -> bool {
        self.children.is_empty() && !self.bounds.is_solved()
    }
}

impl Default for SearchRecord {
    fn default() -> SearchRecord {
        SearchRecord::with_children(Children::default(), 0.0)
    }
}

impl StoreEntry for SearchRecord {
    fn rotate(&mut self, size: u8) {
        let rotated: Vec<Cell> = self
            .children
            .moves()
            .iter()
            .map(|c| c.rotated(size))
            .collect();
        self.children = Children::new(rotated);
        self.best_move = self.best_move.map(|c| c.rotated(size));
        self.max_proof = self.max_proof.rotated(size);
    }

    fn replaces(&self, other: &SearchRecord) -> bool {
        self.work > other.work
    }

    fn stored_move(&self) -> Option<Cell> {
        self.best_move
    }
}

impl std::fmt::Display for SearchRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[bounds={} children={} bestmove={} work={} eval={:.2}]",
            self.bounds,
            self.children.len(),
            self.best_move
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
            self.work,
            self.eval
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    #[test]
    fn rotation_maps_every_oriented_field() {
        let mut record = SearchRecord::with_children(
            Children::new(vec![cell("a1"), cell("b2")]),
            0.5,
        );
        record.best_move = Some(cell("a1"));
        record.max_proof.insert(cell("c3"));
        record.work = 7;

        record.rotate(5);
        assert_eq!(record.children.moves(), &[cell("e5"), cell("d4")]);
        assert_eq!(record.best_move, Some(cell("e5")));
        assert!(record.max_proof.contains(cell("c3").rotated(5)));
        // Orientation-independent fields pass through unchanged
        assert_eq!(record.work, 7);
        assert_eq!(record.bounds, Bounds::default());
    }

    #[test]
    fn double_rotation_is_identity() {
        let mut record = SearchRecord::with_children(
            Children::new(vec![cell("a1"), cell("c2")]),
            -1.0,
        );
        record.best_move = Some(cell("c2"));
        let original = record.clone();
        record.rotate(5);
        record.rotate(5);
        assert_eq!(record, original);
    }

    #[test]
    fn replacement_is_work_based() {
        let mut cheap = SearchRecord::default();
        cheap.work = 5;
        let mut costly = SearchRecord::default();
        costly.work = 500;
        assert!(costly.replaces(&cheap));
        assert!(!cheap.replaces(&costly));
    }

    #[test]
    fn freshness_predicate() {
        assert!(SearchRecord::default().is_fresh());
        let expanded = SearchRecord::with_children(Children::new(vec![cell("a1")]), 0.0);
        assert!(!expanded.is_fresh());
        assert!(!SearchRecord::terminal(Bounds::winning(), 0.0).is_fresh());
    }
}
