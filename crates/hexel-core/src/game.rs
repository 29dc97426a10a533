//! A game in progress: current position plus the moves that produced it.

use tracing::trace;

use crate::cell::Cell;
use crate::error::BoardError;
use crate::state::State;

/// Current position with played-move history.
///
/// The history is what the solver's backwards propagation walks and what the
/// command layer's `undo` unwinds.
#[derive(Debug, Clone)]
pub struct Game {
    state: State,
    history: Vec<Cell>,
}

impl Game {
    /// Start a new game on an empty board.
    pub fn new(size: u8) -> Result<Game, BoardError> {
        Ok(Game {
            state: State::new(size)?,
            history: Vec::new(),
        })
    }

    /// The current position.
    #[inline]
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Moves played from the empty board, oldest first.
    #[inline]
    pub fn history(&self) -> &[Cell] {
        &self.history
    }

    /// Play a move for the side to move.
    pub fn play(&mut self, cell: Cell) -> Result<(), BoardError> {
        self.state.play(cell)?;
        self.history.push(cell);
        trace!(%cell, move_number = self.history.len(), "move played");
        Ok(())
    }

    /// Undo the last played move. Returns the move, or `None` at the start.
    pub fn undo(&mut self) -> Option<Cell> {
        let cell = self.history.pop()?;
        self.state
            .undo(cell)
            .expect("history move must be undoable");
        Some(cell)
    }

    /// Reset to an empty board of the same size.
    pub fn clear(&mut self) {
        let size = self.state.board().size();
        self.state = State::new(size).expect("size already validated");
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    #[test]
    fn play_records_history() {
        let mut game = Game::new(5).unwrap();
        game.play(cell("a1")).unwrap();
        game.play(cell("b2")).unwrap();
        assert_eq!(game.history(), &[cell("a1"), cell("b2")]);
    }

    #[test]
    fn undo_unwinds_in_order() {
        let mut game = Game::new(5).unwrap();
        let initial = game.state().hash();
        game.play(cell("a1")).unwrap();
        game.play(cell("b2")).unwrap();
        assert_eq!(game.undo(), Some(cell("b2")));
        assert_eq!(game.undo(), Some(cell("a1")));
        assert_eq!(game.undo(), None);
        assert_eq!(game.state().hash(), initial);
    }

    #[test]
    fn clear_resets_board_and_history() {
        let mut game = Game::new(5).unwrap();
        game.play(cell("a1")).unwrap();
        game.clear();
        assert!(game.history().is_empty());
        assert_eq!(game.state().num_stones(), 0);
    }

    #[test]
    fn illegal_play_leaves_history_untouched() {
        let mut game = Game::new(5).unwrap();
        game.play(cell("a1")).unwrap();
        assert!(game.play(cell("a1")).is_err());
        assert_eq!(game.history().len(), 1);
    }
}
