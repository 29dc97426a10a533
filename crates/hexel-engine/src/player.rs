//! Move choice: book first, then proven records, then the solver.

use std::collections::HashMap;

use hexel_core::{Cell, State};
use tracing::debug;

use crate::book::Book;
use crate::dfpn::{DfpnSolver, SearchRecord};
use crate::error::StoreError;
use crate::oracle::MoveOracle;
use crate::store::{PositionStore, canonical_key, needs_rotation};

/// In-memory cache of responses already computed for a position.
///
/// Keyed canonically, so a position and its rotation share one entry and
/// the stored move rotates to match the queried orientation.
#[derive(Debug, Default)]
pub struct MoveCache {
    map: HashMap<u64, Cell>,
}

impl MoveCache {
    /// Empty cache.
    pub fn new() -> MoveCache {
        MoveCache::default()
    }

    /// The cached response for a position, in the position's orientation.
    pub fn get(&self, state: &State) -> Option<Cell> {
        let key = canonical_key(state);
        let cell = *self.map.get(&key)?;
        if needs_rotation(state, key) {
            Some(cell.rotated(state.board().size()))
        } else {
            Some(cell)
        }
    }

    /// Remember the response for a position.
    pub fn insert(&mut self, state: &State, cell: Cell) {
        let key = canonical_key(state);
        let stored = if needs_rotation(state, key) {
            cell.rotated(state.board().size())
        } else {
            cell
        };
        self.map.insert(key, stored);
    }

    /// Number of cached positions.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Knobs of the move-choice pipeline.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Whether to consult the book before searching.
    pub use_book: bool,
    /// Minimum visit count for a book move to be trusted.
    pub book_min_count: u32,
    /// Exploration weight of the book move choice.
    pub book_count_weight: f32,
}

impl Default for PlayerConfig {
    fn default() -> PlayerConfig {
        PlayerConfig {
            use_book: true,
            book_min_count: 1,
            book_count_weight: 0.25,
        }
    }
}

/// Picks moves by consulting the book, proven records, and the solver, in
/// that order.
#[derive(Debug, Default)]
pub struct Player {
    config: PlayerConfig,
    cache: MoveCache,
}

impl Player {
    /// Create a player with the given configuration.
    pub fn new(config: PlayerConfig) -> Player {
        Player {
            config,
            cache: MoveCache::new(),
        }
    }

    /// The player's configuration.
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut PlayerConfig {
        &mut self.config
    }

    /// Choose a move for the side to move, or `None` when the game is
    /// already decided or no move exists.
    pub fn genmove<O: MoveOracle>(
        &mut self,
        solver: &DfpnSolver<O>,
        store: &PositionStore<SearchRecord>,
        book: Option<&Book>,
        state: &State,
    ) -> Result<Option<Cell>, StoreError> {
        if state.is_terminal() || state.legal_moves().is_empty() {
            return Ok(None);
        }

        if self.config.use_book
            && let Some(book) = book
            && let Some(cell) = book.best_move(
                state,
                self.config.book_min_count,
                self.config.book_count_weight,
            )?
        {
            debug!(%cell, "book move");
            return Ok(Some(cell));
        }

        if let Some(cell) = self.cache.get(state) {
            debug!(%cell, "cached move");
            return Ok(Some(cell));
        }

        if let Some(record) = store.get(state)?
            && record.bounds.is_solved()
            && let Some(cell) = record.best_move
        {
            self.cache.insert(state, cell);
            debug!(%cell, "stored proof move");
            return Ok(Some(cell));
        }

        let outcome = solver.solve(state, store)?;
        if outcome.winner.is_some()
            && let Some(&cell) = outcome.pv.first()
        {
            self.cache.insert(state, cell);
            debug!(%cell, "solved move");
            return Ok(Some(cell));
        }

        // Undetermined search: fall back on the statically best move
        Ok(solver
            .oracle()
            .consider_moves(state)
            .first()
            .map(|&(cell, _)| cell))
    }
}
