//! Error types for board construction and coordinate parsing.

/// A string failed to parse as a cell coordinate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cell: \"{found}\"")]
pub struct CellError {
    /// The string that failed to parse.
    pub found: String,
}

/// A string failed to parse as a color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color: \"{found}\"")]
pub struct ColorError {
    /// The string that failed to parse.
    pub found: String,
}

/// Errors from board-level operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The requested board size is outside the supported range.
    #[error("unsupported board size {size}, expected 1..={max}", max = crate::cell::MAX_SIZE)]
    BadSize {
        /// The rejected size.
        size: u8,
    },

    /// The cell does not lie on this board.
    #[error("cell {cell} is off a {size}x{size} board")]
    OffBoard {
        /// The offending cell.
        cell: crate::Cell,
        /// The board size.
        size: u8,
    },

    /// A stone already occupies the cell.
    #[error("cell {cell} is occupied")]
    Occupied {
        /// The occupied cell.
        cell: crate::Cell,
    },

    /// No stone occupies the cell, so it cannot be removed.
    #[error("cell {cell} is empty")]
    Empty {
        /// The empty cell.
        cell: crate::Cell,
    },
}
