//! Persistent opening book.
//!
//! A book is a rotation-aware database of [`BookNode`]s plus the read-side
//! utilities to value positions (swap-aware), pick moves, and import
//! externally solved lines. The [`builder`] module grows a book with
//! best-first expansion.

pub mod builder;
pub mod node;

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use hexel_core::{Cell, Color, State};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::{DbStats, StateDb, canonical_key};
pub use builder::{BookBuilder, BookConfig};
pub use node::{BOOK_DB_VERSION, BookNode, LOSS_VALUE, WIN_VALUE, inverse, is_loss, is_win};

/// A database of book nodes.
pub struct Book {
    db: StateDb<BookNode>,
}

impl Book {
    /// Open a book, creating it if necessary.
    pub fn open(path: &Path) -> Result<Book, StoreError> {
        Ok(Book {
            db: StateDb::open(path, BOOK_DB_VERSION)?,
        })
    }

    /// Read the node for a position.
    pub fn get(&self, state: &State) -> Result<Option<BookNode>, StoreError> {
        self.db.get(state)
    }

    /// Write the node for a position.
    pub fn put(&self, state: &State, node: &BookNode) -> Result<(), StoreError> {
        self.db.put(state, node)
    }

    /// Whether the position is in the book.
    pub fn exists(&self, state: &State) -> Result<bool, StoreError> {
        self.db.exists(state)
    }

    /// Force buffered writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()
    }

    /// Number of stored positions.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Whether the book holds no positions.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// The path this book was opened at.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Database traffic counters.
    pub fn stats(&self) -> DbStats {
        self.db.stats()
    }

    /// The node's value as seen by the position's side to move, taking the
    /// swap rule into account: where swap is legal the mover keeps the
    /// better of the two sides.
    pub fn node_value(node: &BookNode, state: &State) -> f32 {
        if state.swap_is_legal() {
            node.value.max(inverse(node.value))
        } else {
            node.value
        }
    }

    /// Score of a child node for the player moving *into* it: the inverted
    /// value plus an exploration bonus for well-visited nodes.
    pub fn node_score(node: &BookNode, state: &State, count_weight: f32) -> f32 {
        let mut score = inverse(Book::node_value(node, state));
        if !node.is_terminal() {
            score += ((node.count + 1) as f32).ln() * count_weight;
        }
        score
    }

    /// The best book move from a position, or `None` when the position is
    /// unknown or has fewer than `min_count` visits.
    pub fn best_move(
        &self,
        state: &State,
        min_count: u32,
        count_weight: f32,
    ) -> Result<Option<Cell>, StoreError> {
        let Some(node) = self.get(state)? else {
            return Ok(None);
        };
        if node.count < min_count {
            return Ok(None);
        }
        let mut scratch = *state;
        let mut best: Option<(Cell, f32)> = None;
        for cell in state.legal_moves().iter() {
            scratch.play(cell).expect("legal move must play");
            if let Some(child) = self.get(&scratch)? {
                let score = Book::node_score(&child, &scratch, count_weight);
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((cell, score));
                }
            }
            scratch.undo(cell).expect("played move must undo");
        }
        Ok(best.map(|(cell, _)| cell))
    }

    /// Length of the best-value line from a position.
    pub fn main_line_depth(&self, state: &State) -> Result<usize, StoreError> {
        let mut state = *state;
        let mut depth = 0;
        while self.get(&state)?.is_some() {
            let mut best: Option<(Cell, f32)> = None;
            let mut scratch = state;
            for cell in state.legal_moves().iter() {
                scratch.play(cell).expect("legal move must play");
                if let Some(child) = self.get(&scratch)? {
                    let value = inverse(Book::node_value(&child, &scratch));
                    if best.is_none_or(|(_, v)| value > v) {
                        best = Some((cell, value));
                    }
                }
                scratch.undo(cell).expect("played move must undo");
            }
            let Some((cell, _)) = best else {
                break;
            };
            state.play(cell).expect("legal move must play");
            depth += 1;
        }
        Ok(depth)
    }

    /// Number of book positions reachable from a position.
    pub fn tree_size(&self, state: &State) -> Result<usize, StoreError> {
        let mut memo: HashMap<u64, usize> = HashMap::new();
        let mut state = *state;
        self.tree_size_rec(&mut state, &mut memo)
    }

    fn tree_size_rec(
        &self,
        state: &mut State,
        memo: &mut HashMap<u64, usize>,
    ) -> Result<usize, StoreError> {
        let key = canonical_key(state);
        if let Some(&size) = memo.get(&key) {
            return Ok(size);
        }
        if self.get(state)?.is_none() {
            return Ok(0);
        }
        let mut size = 1;
        for cell in state.legal_moves().iter() {
            state.play(cell).expect("legal move must play");
            size += self.tree_size_rec(state, memo)?;
            state.undo(cell).expect("played move must undo");
        }
        memo.insert(key, size);
        Ok(size)
    }

    /// Import externally solved lines.
    ///
    /// Each line is a space-separated move sequence from the empty board
    /// followed by the winner (`black` or `white`). Lines starting with `#`
    /// are comments. Importing the same stream twice leaves the book
    /// unchanged.
    pub fn import_solved(
        &self,
        reader: impl BufRead,
        size: u8,
    ) -> Result<ImportStats, StoreError> {
        let mut stats = ImportStats::default();
        for line in reader.lines() {
            let line = line?;
            stats.lines += 1;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let Some((moves, winner)) = parse_solved_line(text) else {
                warn!(line = stats.lines, "skipping badly formed line");
                continue;
            };
            let mut state = State::new(size).expect("board size already validated");
            let mut ok = true;
            for cell in &moves {
                if state.play(*cell).is_err() {
                    ok = false;
                    break;
                }
            }
            if !ok {
                warn!(line = stats.lines, "skipping unplayable line");
                continue;
            }
            stats.parsed += 1;
            let value = if state.to_play() == winner {
                WIN_VALUE
            } else {
                LOSS_VALUE
            };
            match self.get(&state)? {
                Some(mut node) => {
                    node.value = value;
                    self.put(&state, &node)?;
                    stats.replaced += 1;
                }
                None => {
                    self.put(&state, &BookNode::new(value))?;
                    stats.new += 1;
                }
            }
        }
        self.flush()?;
        info!(
            lines = stats.lines,
            parsed = stats.parsed,
            replaced = stats.replaced,
            new = stats.new,
            "imported solved states"
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book").field("path", &self.path()).finish()
    }
}

/// Counters from one import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    /// Input lines seen.
    pub lines: usize,
    /// Lines successfully parsed.
    pub parsed: usize,
    /// Existing nodes overwritten.
    pub replaced: usize,
    /// Nodes created.
    pub new: usize,
}

/// Parse `"a1 b2 c3 black"` into moves and a winner.
fn parse_solved_line(text: &str) -> Option<(Vec<Cell>, Color)> {
    let mut moves = Vec::new();
    for token in text.split_whitespace() {
        match token {
            "black" => return Some((moves, Color::Black)),
            "white" => return Some((moves, Color::White)),
            _ => moves.push(token.parse().ok()?),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    fn open_book(dir: &tempfile::TempDir) -> Book {
        Book::open(&dir.path().join("book")).unwrap()
    }

    #[test]
    fn value_applies_swap_exactly_when_legal() {
        let mut state = State::new(5).unwrap();
        let node = BookNode::new(0.2);
        assert_eq!(Book::node_value(&node, &state), 0.2);
        state.play(cell("a1")).unwrap();
        // One stone on the board: the mover may swap into the better side
        assert_eq!(Book::node_value(&node, &state), 0.8);
        state.play(cell("b1")).unwrap();
        assert_eq!(Book::node_value(&node, &state), 0.2);
    }

    #[test]
    fn score_prefers_explored_nodes_on_close_values() {
        let state = State::new(5).unwrap();
        let fresh = BookNode::new(0.5);
        let mut seasoned = BookNode::new(0.5);
        seasoned.count = 100;
        assert!(
            Book::node_score(&seasoned, &state, 0.1) > Book::node_score(&fresh, &state, 0.1)
        );
    }

    #[test]
    fn terminal_nodes_get_no_exploration_bonus() {
        let state = State::new(5).unwrap();
        let mut terminal = BookNode::new(LOSS_VALUE);
        terminal.count = 100;
        assert_eq!(Book::node_score(&terminal, &state, 0.5), inverse(LOSS_VALUE));
    }

    #[test]
    fn best_move_respects_min_count() {
        let dir = tempfile::tempdir().unwrap();
        let book = open_book(&dir);
        let root = State::new(3).unwrap();
        let mut node = BookNode::new(0.5);
        node.count = 1;
        book.put(&root, &node).unwrap();

        let mut child = root;
        child.play(cell("b2")).unwrap();
        book.put(&child, &BookNode::new(0.4)).unwrap();

        assert_eq!(book.best_move(&root, 5, 0.0).unwrap(), None);
        assert_eq!(book.best_move(&root, 1, 0.0).unwrap(), Some(cell("b2")));
    }

    #[test]
    fn best_move_picks_worst_child_value() {
        let dir = tempfile::tempdir().unwrap();
        let book = open_book(&dir);
        let root = State::new(3).unwrap();
        book.put(&root, &BookNode::new(0.5)).unwrap();

        // Child value is from the opponent's perspective: lower is better
        for (mv, value) in [("a1", 0.9), ("b2", 0.3), ("c3", 0.6)] {
            let mut child = root;
            child.play(cell(mv)).unwrap();
            book.put(&child, &BookNode::new(value)).unwrap();
        }
        assert_eq!(book.best_move(&root, 0, 0.0).unwrap(), Some(cell("b2")));
    }

    #[test]
    fn import_stores_winner_relative_values() {
        let dir = tempfile::tempdir().unwrap();
        let book = open_book(&dir);
        let input = "# comment line\na1 b2 c3 black\n";
        let stats = book.import_solved(Cursor::new(input), 5).unwrap();
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.new, 1);

        let mut state = State::new(5).unwrap();
        for m in ["a1", "b2", "c3"] {
            state.play(cell(m)).unwrap();
        }
        // Three moves played: White to move, Black wins -> loss for mover
        let node = book.get(&state).unwrap().unwrap();
        assert!(is_loss(node.value));
    }

    #[test]
    fn import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let book = open_book(&dir);
        let input = "a1 b2 white\n";
        let first = book.import_solved(Cursor::new(input), 5).unwrap();
        assert_eq!(first.new, 1);
        let second = book.import_solved(Cursor::new(input), 5).unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.replaced, 1);
        assert_eq!(book.len(), 1);

        let mut state = State::new(5).unwrap();
        state.play(cell("a1")).unwrap();
        state.play(cell("b2")).unwrap();
        // Black to move, White wins -> loss for the mover... but this mover
        // is Black and the winner was White, so the stored value is a loss
        let node = book.get(&state).unwrap().unwrap();
        assert!(is_loss(node.value));
    }

    #[test]
    fn import_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let book = open_book(&dir);
        let input = "not a move line\na1 white\n";
        let stats = book.import_solved(Cursor::new(input), 5).unwrap();
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.lines, 2);
    }

    #[test]
    fn tree_size_counts_reachable_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let book = open_book(&dir);
        let root = State::new(3).unwrap();
        book.put(&root, &BookNode::new(0.5)).unwrap();
        let mut child = root;
        child.play(cell("b2")).unwrap();
        book.put(&child, &BookNode::new(0.4)).unwrap();
        assert_eq!(book.tree_size(&root).unwrap(), 2);
        assert_eq!(book.main_line_depth(&root).unwrap(), 1);
    }
}
