//! Core Hex types: board representation, move rules, and position hashing.

mod board;
mod cell;
mod cellset;
mod color;
mod error;
mod game;
mod groups;
mod state;
mod zobrist;

pub use board::Board;
pub use cell::{Cell, MAX_SIZE};
pub use cellset::CellSet;
pub use color::Color;
pub use error::{BoardError, CellError, ColorError};
pub use game::Game;
pub use groups::Groups;
pub use state::State;
