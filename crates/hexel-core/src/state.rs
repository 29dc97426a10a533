//! Board position paired with the side to move.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::cell::Cell;
use crate::cellset::CellSet;
use crate::color::Color;
use crate::error::BoardError;
use crate::zobrist;

/// A Hex position: board plus side to move, with an incrementally maintained
/// Zobrist hash.
///
/// The hash covers stone placement AND the side to move, so the same stones
/// with different movers hash differently, and a rotated board hashes
/// differently from its source in general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    board: Board,
    to_play: Color,
    hash: u64,
}

impl State {
    /// An empty board with Black to move.
    pub fn new(size: u8) -> Result<State, BoardError> {
        Ok(State::from_board(Board::new(size)?, Color::Black))
    }

    /// Wrap an existing board with a side to move.
    pub fn from_board(board: Board, to_play: Color) -> State {
        let hash = zobrist::hash_from_scratch(&board, to_play);
        State {
            board,
            to_play,
            hash,
        }
    }

    /// The underlying board.
    #[inline]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// The side to move.
    #[inline]
    pub const fn to_play(&self) -> Color {
        self.to_play
    }

    /// The position hash.
    #[inline]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Number of stones on the board.
    #[inline]
    pub fn num_stones(&self) -> u32 {
        self.board.num_stones()
    }

    /// Play a stone of the side to move and pass the turn.
    pub fn play(&mut self, cell: Cell) -> Result<(), BoardError> {
        self.board.place(self.to_play, cell)?;
        self.hash ^= zobrist::COLOR_CELL[self.to_play.index()][cell.index()];
        self.hash ^= zobrist::SIDE_TO_MOVE;
        self.to_play = self.to_play.flip();
        Ok(())
    }

    /// Undo a move previously made with [`play`](Self::play).
    pub fn undo(&mut self, cell: Cell) -> Result<(), BoardError> {
        let color = self.board.remove(cell)?;
        debug_assert_eq!(color, self.to_play.flip(), "undo out of order");
        self.hash ^= zobrist::COLOR_CELL[color.index()][cell.index()];
        self.hash ^= zobrist::SIDE_TO_MOVE;
        self.to_play = self.to_play.flip();
        Ok(())
    }

    /// The position rotated by 180 degrees, same side to move.
    pub fn rotated(&self) -> State {
        State::from_board(self.board.rotated(), self.to_play)
    }

    /// The legal moves: every empty cell.
    ///
    /// The swap decision is not listed as a move; engines handle it
    /// implicitly through [`swap_is_legal`](Self::swap_is_legal).
    pub fn legal_moves(&self) -> CellSet {
        self.board.empty_cells()
    }

    /// Whether the pie rule applies: exactly one stone has been played.
    #[inline]
    pub fn swap_is_legal(&self) -> bool {
        self.num_stones() == 1
    }

    /// The winner, if the game is decided.
    pub fn winner(&self) -> Option<Color> {
        self.board.winner()
    }

    /// Whether the game is decided.
    pub fn is_terminal(&self) -> bool {
        self.winner().is_some()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} to play", self.board, self.to_play)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    #[test]
    fn play_alternates_colors() {
        let mut state = State::new(5).unwrap();
        assert_eq!(state.to_play(), Color::Black);
        state.play(cell("a1")).unwrap();
        assert_eq!(state.to_play(), Color::White);
        assert_eq!(state.board().color_at(cell("a1")), Some(Color::Black));
        state.play(cell("b2")).unwrap();
        assert_eq!(state.board().color_at(cell("b2")), Some(Color::White));
    }

    #[test]
    fn play_undo_restores_hash() {
        let mut state = State::new(5).unwrap();
        let initial = state.hash();
        state.play(cell("c3")).unwrap();
        assert_ne!(state.hash(), initial);
        state.undo(cell("c3")).unwrap();
        assert_eq!(state.hash(), initial);
        assert_eq!(state.to_play(), Color::Black);
    }

    #[test]
    fn incremental_hash_matches_scratch() {
        let mut state = State::new(5).unwrap();
        for s in ["a1", "c3", "e5", "b2"] {
            state.play(cell(s)).unwrap();
        }
        let rebuilt = State::from_board(*state.board(), state.to_play());
        assert_eq!(state.hash(), rebuilt.hash());
    }

    #[test]
    fn rotated_hash_differs_for_asymmetric_position() {
        let mut state = State::new(5).unwrap();
        state.play(cell("a1")).unwrap();
        assert_ne!(state.hash(), state.rotated().hash());
    }

    #[test]
    fn swap_window() {
        let mut state = State::new(5).unwrap();
        assert!(!state.swap_is_legal());
        state.play(cell("a1")).unwrap();
        assert!(state.swap_is_legal());
        state.play(cell("b1")).unwrap();
        assert!(!state.swap_is_legal());
    }

    #[test]
    fn terminal_detection() {
        let mut state = State::new(2).unwrap();
        state.play(cell("a1")).unwrap(); // black
        state.play(cell("b1")).unwrap(); // white
        assert!(!state.is_terminal());
        state.play(cell("a2")).unwrap(); // black connects rows
        assert_eq!(state.winner(), Some(Color::Black));
    }

    #[test]
    fn legal_moves_excludes_occupied() {
        let mut state = State::new(3).unwrap();
        state.play(cell("b2")).unwrap();
        let moves = state.legal_moves();
        assert_eq!(moves.len(), 8);
        assert!(!moves.contains(cell("b2")));
    }
}
