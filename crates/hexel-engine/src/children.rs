//! Ordered child-move cursor for a search position.

use hexel_core::{BoardError, Cell, State};
use serde::{Deserialize, Serialize};

/// The ordered moves from a position, best (by static score) first.
///
/// The order is fixed at creation time; widening decides how many of the
/// moves are live at any given visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Children {
    moves: Vec<Cell>,
}

impl Children {
    /// Wrap an already-ordered move list.
    pub fn new(moves: Vec<Cell>) -> Children {
        Children { moves }
    }

    /// Number of children.
    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Whether there are no children.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// The move at the given rank.
    #[inline]
    pub fn move_at(&self, index: usize) -> Cell {
        self.moves[index]
    }

    /// The rank of a move, if present.
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        self.moves.iter().position(|&m| m == cell)
    }

    /// The full ordered move list.
    #[inline]
    pub fn moves(&self) -> &[Cell] {
        &self.moves
    }

    /// Play the move at the given rank on the scratch state.
    pub fn play(&self, index: usize, state: &mut State) -> Result<(), BoardError> {
        state.play(self.moves[index])
    }

    /// Undo the move at the given rank on the scratch state.
    pub fn undo(&self, index: usize, state: &mut State) -> Result<(), BoardError> {
        state.undo(self.moves[index])
    }
}
