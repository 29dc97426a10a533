//! Connected stone groups of one color.
//!
//! A union-find over a color's stones plus two sentinel nodes for the
//! color's edges. The game is decided exactly when the two sentinels join.

use crate::board::Board;
use crate::cell::{Cell, MAX_SIZE};
use crate::cellset::CellSet;
use crate::color::Color;

const NUM_CELLS: usize = MAX_SIZE as usize * MAX_SIZE as usize;

/// Sentinel for the near edge (top for Black, left for White).
const NEAR_EDGE: usize = NUM_CELLS;

/// Sentinel for the far edge (bottom for Black, right for White).
const FAR_EDGE: usize = NUM_CELLS + 1;

/// The stone groups of one color on a board, with edge membership.
///
/// Built once from a position; rebuilding after each move is cheap enough
/// for rule queries and keeps the board itself plain data.
pub struct Groups {
    parent: [u16; NUM_CELLS + 2],
    color: Color,
    stones: CellSet,
}

impl Groups {
    /// Compute the groups of `color` on `board`.
    pub fn new(board: &Board, color: Color) -> Groups {
        let mut groups = Groups {
            parent: [0; NUM_CELLS + 2],
            color,
            stones: board.stones(color),
        };
        for (i, slot) in groups.parent.iter_mut().enumerate() {
            *slot = i as u16;
        }
        let size = board.size();
        let last = size - 1;
        for cell in groups.stones.iter() {
            let touches_near = match color {
                Color::Black => cell.row() == 0,
                Color::White => cell.col() == 0,
            };
            let touches_far = match color {
                Color::Black => cell.row() == last,
                Color::White => cell.col() == last,
            };
            if touches_near {
                groups.union(cell.index(), NEAR_EDGE);
            }
            if touches_far {
                groups.union(cell.index(), FAR_EDGE);
            }
            for next in board.neighbors(cell) {
                if groups.stones.contains(next) {
                    groups.union(cell.index(), next.index());
                }
            }
        }
        groups
    }

    /// The color these groups describe.
    pub fn color(&self) -> Color {
        self.color
    }

    fn find(&self, mut node: usize) -> usize {
        while self.parent[node] as usize != node {
            node = self.parent[node] as usize;
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb as u16;
        }
    }

    /// Whether two stones belong to the same chain.
    pub fn same_group(&self, a: Cell, b: Cell) -> bool {
        self.stones.contains(a)
            && self.stones.contains(b)
            && self.find(a.index()) == self.find(b.index())
    }

    /// Whether a stone's chain reaches the color's near edge.
    pub fn touches_near_edge(&self, cell: Cell) -> bool {
        self.stones.contains(cell) && self.find(cell.index()) == self.find(NEAR_EDGE)
    }

    /// Whether the color's edges are connected.
    pub fn edges_connected(&self) -> bool {
        self.find(NEAR_EDGE) == self.find(FAR_EDGE)
    }

    /// The chain connecting the edges, if one exists.
    pub fn winning_chain(&self) -> Option<CellSet> {
        if !self.edges_connected() {
            return None;
        }
        let root = self.find(NEAR_EDGE);
        let chain = self
            .stones
            .iter()
            .filter(|cell| self.find(cell.index()) == root)
            .collect();
        Some(chain)
    }
}

impl std::fmt::Debug for Groups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Groups")
            .field("color", &self.color)
            .field("stones", &self.stones)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    fn board_with(color: Color, cells: &[&str]) -> Board {
        let mut board = Board::new(3).unwrap();
        for s in cells {
            board.place(color, s.parse().unwrap()).unwrap();
        }
        board
    }

    #[test]
    fn isolated_stones_are_separate_groups() {
        let board = board_with(Color::Black, &["a1", "c3"]);
        let groups = Groups::new(&board, Color::Black);
        assert!(!groups.same_group(cell("a1"), cell("c3")));
        assert!(!groups.edges_connected());
    }

    #[test]
    fn adjacent_stones_share_a_group() {
        let board = board_with(Color::Black, &["b1", "b2"]);
        let groups = Groups::new(&board, Color::Black);
        assert!(groups.same_group(cell("b1"), cell("b2")));
        assert!(groups.touches_near_edge(cell("b2")));
    }

    #[test]
    fn full_column_connects_black_edges() {
        let board = board_with(Color::Black, &["b1", "b2", "b3"]);
        let groups = Groups::new(&board, Color::Black);
        assert!(groups.edges_connected());
        let chain = groups.winning_chain().unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn white_edges_are_columns() {
        let board = board_with(Color::White, &["a2", "b2", "c2"]);
        let groups = Groups::new(&board, Color::White);
        assert!(groups.edges_connected());
        assert!(!Groups::new(&board, Color::Black).edges_connected());
    }

    #[test]
    fn opponent_stones_do_not_join_groups() {
        let mut board = board_with(Color::Black, &["b1", "b3"]);
        board.place(Color::White, cell("b2")).unwrap();
        let groups = Groups::new(&board, Color::Black);
        assert!(!groups.same_group(cell("b1"), cell("b3")));
        assert!(!groups.edges_connected());
    }

    #[test]
    fn diagonal_chain_wins_via_hex_adjacency() {
        let board = board_with(Color::Black, &["c1", "b2", "a3"]);
        let groups = Groups::new(&board, Color::Black);
        assert!(groups.edges_connected());
    }

    #[test]
    fn chain_excludes_unconnected_stones() {
        // The e column wins; a3 sits mid-board touching none of it and
        // neither edge, so it stays outside the winning group
        let mut board = Board::new(5).unwrap();
        for s in ["e1", "e2", "e3", "e4", "e5", "a3"] {
            board.place(Color::Black, s.parse().unwrap()).unwrap();
        }
        let groups = Groups::new(&board, Color::Black);
        let chain = groups.winning_chain().unwrap();
        assert!(chain.contains(cell("e3")));
        assert!(!chain.contains(cell("a3")));
        assert_eq!(chain.len(), 5);
    }
}
