//! Zobrist hashing keys for position deduplication.
//!
//! A position's hash depends on stone placement and on the side to move.
//! Rotating a board produces a different hash in general — the canonical-key
//! machinery in the store layer relies on exactly that.

use crate::board::Board;
use crate::cell::MAX_SIZE;
use crate::color::Color;

const NUM_CELLS: usize = MAX_SIZE as usize * MAX_SIZE as usize;

/// Zobrist key for each (color, cell) pair. Indexed by
/// `[Color::index()][Cell::index()]`.
pub(crate) static COLOR_CELL: [[u64; NUM_CELLS]; 2] = {
    let mut table = [[0u64; NUM_CELLS]; 2];
    let mut state = SEED;
    let mut color = 0;
    while color < 2 {
        let mut cell = 0;
        while cell < NUM_CELLS {
            let (val, next) = xorshift64(state);
            table[color][cell] = val;
            state = next;
            cell += 1;
        }
        color += 1;
    }
    table
};

/// Zobrist key XORed when White is the side to move.
pub(crate) static SIDE_TO_MOVE: u64 = {
    // State continues from COLOR_CELL generation
    let mut state = SEED;
    let mut i = 0;
    while i < 2 * NUM_CELLS {
        let (_, next) = xorshift64(state);
        state = next;
        i += 1;
    }
    let (val, _) = xorshift64(state);
    val
};

/// Zobrist key per board size, indexed by the size itself. Without it the
/// same stone pattern on different boards would share a hash and alias in
/// a shared store.
pub(crate) static BOARD_SIZE: [u64; MAX_SIZE as usize + 1] = {
    let mut table = [0u64; MAX_SIZE as usize + 1];
    let mut state = SEED;
    // Advance past the cell keys and the side-to-move key
    let mut i = 0;
    while i < 2 * NUM_CELLS + 1 {
        let (_, next) = xorshift64(state);
        state = next;
        i += 1;
    }
    let mut idx = 0;
    while idx < MAX_SIZE as usize + 1 {
        let (val, next) = xorshift64(state);
        table[idx] = val;
        state = next;
        idx += 1;
    }
    table
};

const SEED: u64 = 0x4845_5845_4c21_2121; // "HEXEL!!!"

/// Xorshift64 PRNG. Returns (value, next_state).
const fn xorshift64(mut state: u64) -> (u64, u64) {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    (state, state)
}

/// Compute a position hash from scratch for the given board and side to move.
pub(crate) fn hash_from_scratch(board: &Board, to_play: Color) -> u64 {
    let mut hash = BOARD_SIZE[board.size() as usize];

    for color in Color::ALL {
        for cell in board.stones(color).iter() {
            hash ^= COLOR_CELL[color.index()][cell.index()];
        }
    }

    if to_play == Color::White {
        hash ^= SIDE_TO_MOVE;
    }

    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::cell::Cell;

    #[test]
    fn empty_boards_of_different_sizes_hash_differently() {
        let small = Board::new(3).unwrap();
        let large = Board::new(5).unwrap();
        assert_ne!(
            hash_from_scratch(&small, Color::Black),
            hash_from_scratch(&large, Color::Black)
        );
        assert_ne!(hash_from_scratch(&small, Color::Black), 0);
    }

    #[test]
    fn side_to_move_changes_hash() {
        let mut board = Board::new(5).unwrap();
        board.place(Color::Black, "a1".parse().unwrap()).unwrap();
        assert_ne!(
            hash_from_scratch(&board, Color::Black),
            hash_from_scratch(&board, Color::White)
        );
    }

    #[test]
    fn rotation_changes_hash_for_asymmetric_position() {
        let mut board = Board::new(5).unwrap();
        board.place(Color::Black, "a1".parse().unwrap()).unwrap();
        board.place(Color::White, "b2".parse().unwrap()).unwrap();
        let rotated = board.rotated();
        assert_ne!(
            hash_from_scratch(&board, Color::Black),
            hash_from_scratch(&rotated, Color::Black)
        );
    }

    #[test]
    fn rotation_preserves_hash_for_symmetric_position() {
        // A single center stone on an odd board is its own rotation image.
        let mut board = Board::new(5).unwrap();
        board.place(Color::Black, Cell::new(2, 2).unwrap()).unwrap();
        let rotated = board.rotated();
        assert_eq!(
            hash_from_scratch(&board, Color::White),
            hash_from_scratch(&rotated, Color::White)
        );
    }

    #[test]
    fn all_keys_are_unique() {
        let mut all_keys = Vec::new();
        for color_keys in &COLOR_CELL {
            for &key in color_keys.iter() {
                all_keys.push(key);
            }
        }
        all_keys.push(SIDE_TO_MOVE);
        for &key in &BOARD_SIZE {
            all_keys.push(key);
        }

        let count = all_keys.len();
        all_keys.sort();
        all_keys.dedup();
        assert_eq!(all_keys.len(), count, "some Zobrist keys collide");
    }
}
