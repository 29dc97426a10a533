//! Hex board: stone placement and the edge-to-edge connection rule.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, MAX_SIZE};
use crate::cellset::CellSet;
use crate::color::Color;
use crate::error::BoardError;
use crate::groups::Groups;

/// A Hex board of a given size with stones of both colors.
///
/// The board is a rhombus of `size * size` hexagonal cells. Black owns the
/// top and bottom edges (rows 0 and size-1), White owns the left and right
/// edges (columns 0 and size-1). Cells have up to six neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    size: u8,
    black: CellSet,
    white: CellSet,
}

impl Board {
    /// Create an empty board. Sizes 1 through [`MAX_SIZE`] are supported.
    pub fn new(size: u8) -> Result<Board, BoardError> {
        if size == 0 || size > MAX_SIZE {
            return Err(BoardError::BadSize { size });
        }
        Ok(Board {
            size,
            black: CellSet::EMPTY,
            white: CellSet::EMPTY,
        })
    }

    /// Board dimension.
    #[inline]
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// The stones of one color.
    #[inline]
    pub const fn stones(&self, color: Color) -> CellSet {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }

    /// All occupied cells.
    #[inline]
    pub fn occupied(&self) -> CellSet {
        self.black | self.white
    }

    /// Number of stones on the board.
    #[inline]
    pub fn num_stones(&self) -> u32 {
        self.occupied().len()
    }

    /// The color occupying a cell, if any.
    pub fn color_at(&self, cell: Cell) -> Option<Color> {
        if self.black.contains(cell) {
            Some(Color::Black)
        } else if self.white.contains(cell) {
            Some(Color::White)
        } else {
            None
        }
    }

    /// All empty cells of the board.
    pub fn empty_cells(&self) -> CellSet {
        let mut empty = CellSet::EMPTY;
        for row in 0..self.size {
            for col in 0..self.size {
                let cell = Cell::new(col, row).expect("size bounded by MAX_SIZE");
                if self.color_at(cell).is_none() {
                    empty.insert(cell);
                }
            }
        }
        empty
    }

    /// Place a stone.
    pub fn place(&mut self, color: Color, cell: Cell) -> Result<(), BoardError> {
        if !cell.on_board(self.size) {
            return Err(BoardError::OffBoard {
                cell,
                size: self.size,
            });
        }
        if self.occupied().contains(cell) {
            return Err(BoardError::Occupied { cell });
        }
        match color {
            Color::Black => self.black.insert(cell),
            Color::White => self.white.insert(cell),
        }
        Ok(())
    }

    /// Remove a stone, returning its color.
    pub fn remove(&mut self, cell: Cell) -> Result<Color, BoardError> {
        match self.color_at(cell) {
            Some(Color::Black) => {
                self.black.remove(cell);
                Ok(Color::Black)
            }
            Some(Color::White) => {
                self.white.remove(cell);
                Ok(Color::White)
            }
            None => Err(BoardError::Empty { cell }),
        }
    }

    /// The up-to-six neighbors of a cell on this board.
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        const OFFSETS: [(i16, i16); 6] = [(-1, 0), (1, 0), (0, -1), (0, 1), (1, -1), (-1, 1)];
        let size = self.size as i16;
        OFFSETS.into_iter().filter_map(move |(dc, dr)| {
            let col = cell.col() as i16 + dc;
            let row = cell.row() as i16 + dr;
            if col >= 0 && col < size && row >= 0 && row < size {
                Cell::new(col as u8, row as u8)
            } else {
                None
            }
        })
    }

    /// The board rotated by 180 degrees.
    pub fn rotated(&self) -> Board {
        Board {
            size: self.size,
            black: self.black.rotated(self.size),
            white: self.white.rotated(self.size),
        }
    }

    /// The winner, if either player has connected their edges.
    pub fn winner(&self) -> Option<Color> {
        Color::ALL
            .into_iter()
            .find(|&color| Groups::new(self, color).edges_connected())
    }

    /// The chain of stones connecting `color`'s edges, if one exists.
    ///
    /// Returns the group containing both edges; stones touching an edge
    /// belong to it through the edge, so this is a superset of any minimal
    /// connecting path.
    pub fn winning_chain(&self, color: Color) -> Option<CellSet> {
        Groups::new(self, color).winning_chain()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        for col in 0..self.size {
            write!(f, " {}", (b'a' + col) as char)?;
        }
        writeln!(f)?;
        for row in 0..self.size {
            // Shift each row right by half a cell to draw the rhombus
            for _ in 0..row {
                write!(f, " ")?;
            }
            write!(f, "{:>2}", row + 1)?;
            for col in 0..self.size {
                let cell = Cell::new(col, row).expect("size bounded by MAX_SIZE");
                let glyph = match self.color_at(cell) {
                    Some(Color::Black) => 'B',
                    Some(Color::White) => 'W',
                    None => '.',
                };
                write!(f, " {glyph}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
