//! Static position evaluation.
//!
//! The engines treat evaluation as an injected black box: DFPN uses it only
//! to order fresh children, the book builder uses it for initial leaf
//! values. [`FlowEval`] (connection distance) and [`ResistanceEval`]
//! (resistor network) are the built-in evaluators.

use std::collections::VecDeque;

use hexel_core::{Board, Cell, Color, MAX_SIZE, State};

/// A static evaluator. Positive scores favor the side to move.
pub trait Evaluation: Send + Sync {
    /// Score the position for its side to move.
    fn evaluate(&self, state: &State) -> f32;
}

impl<F> Evaluation for F
where
    F: Fn(&State) -> f32 + Send + Sync,
{
    fn evaluate(&self, state: &State) -> f32 {
        self(state)
    }
}

/// Distance assigned to a color that can no longer connect.
const UNREACHABLE: u32 = 1000;

/// Connection-distance evaluator.
///
/// For each player, computes the minimum number of additional stones needed
/// to connect their edges (own stones are free, empty cells cost one, enemy
/// stones block). The score is the opponent's remaining distance minus the
/// mover's, so a winning position scores high.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowEval;

impl Evaluation for FlowEval {
    fn evaluate(&self, state: &State) -> f32 {
        let own = connection_distance(state.board(), state.to_play());
        let opp = connection_distance(state.board(), state.to_play().flip());
        opp as f32 - own as f32
    }
}

/// Minimum number of stones `color` must add to connect its edges.
///
/// Zero means the edges are already connected. [`UNREACHABLE`] means no
/// connection is possible anymore.
pub fn connection_distance(board: &Board, color: Color) -> u32 {
    let size = board.size();
    let own = board.stones(color);
    let enemy = board.stones(color.flip());
    let num_cells = MAX_SIZE as usize * MAX_SIZE as usize;
    let mut dist = vec![u32::MAX; num_cells];
    let mut deque: VecDeque<Cell> = VecDeque::new();

    let enter_cost = |cell: Cell| -> Option<u32> {
        if enemy.contains(cell) {
            None
        } else if own.contains(cell) {
            Some(0)
        } else {
            Some(1)
        }
    };

    // Seed with the near edge: row 0 for Black, column 0 for White
    for i in 0..size {
        let cell = match color {
            Color::Black => Cell::new(i, 0),
            Color::White => Cell::new(0, i),
        }
        .expect("size bounded by MAX_SIZE");
        if let Some(cost) = enter_cost(cell) {
            dist[cell.index()] = cost;
            if cost == 0 {
                deque.push_front(cell);
            } else {
                deque.push_back(cell);
            }
        }
    }

    // 0-1 BFS: cells pop in nondecreasing distance order
    let mut best = u32::MAX;
    while let Some(cell) = deque.pop_front() {
        let d = dist[cell.index()];
        if d >= best {
            continue;
        }
        let at_far_edge = match color {
            Color::Black => cell.row() == size - 1,
            Color::White => cell.col() == size - 1,
        };
        if at_far_edge {
            best = best.min(d);
            continue;
        }
        for next in board.neighbors(cell) {
            if let Some(cost) = enter_cost(next) {
                let nd = d + cost;
                if nd < dist[next.index()] {
                    dist[next.index()] = nd;
                    if cost == 0 {
                        deque.push_front(next);
                    } else {
                        deque.push_back(next);
                    }
                }
            }
        }
    }
    if best == u32::MAX { UNREACHABLE } else { best }
}

/// Map a raw score into the book's [0, 1] value domain.
pub fn unit_value(score: f32) -> f32 {
    let v = 1.0 / (1.0 + (-0.5 * score).exp());
    v.clamp(0.0, 1.0)
}

/// Resistance of an own stone's cell. Near-zero: chains are almost wires.
const STONE_RESISTANCE: f32 = 0.05;

/// Resistance of an empty cell.
const EMPTY_RESISTANCE: f32 = 1.0;

/// Resistance reported when a player can no longer connect.
const BLOCKED_RESISTANCE: f32 = 1e6;

/// Electrical-resistance evaluator.
///
/// Models the board as a resistor network per player: own stones conduct
/// almost freely, empty cells carry unit resistance, enemy stones are open
/// circuits. One edge is held at potential 1, the other at 0, and the
/// effective resistance between them is estimated by relaxation. The score
/// is the log-ratio of the opponent's resistance to the mover's.
#[derive(Debug, Clone, Copy)]
pub struct ResistanceEval {
    /// Relaxation sweeps per resistance computation.
    pub iterations: usize,
}

impl Default for ResistanceEval {
    fn default() -> ResistanceEval {
        ResistanceEval { iterations: 60 }
    }
}

impl Evaluation for ResistanceEval {
    fn evaluate(&self, state: &State) -> f32 {
        let own = self.edge_resistance(state.board(), state.to_play());
        let opp = self.edge_resistance(state.board(), state.to_play().flip());
        (opp / own).ln()
    }
}

impl ResistanceEval {
    /// Approximate effective resistance between `color`'s edges.
    pub fn edge_resistance(&self, board: &Board, color: Color) -> f32 {
        let size = board.size();
        let own = board.stones(color);
        let enemy = board.stones(color.flip());
        let num_cells = MAX_SIZE as usize * MAX_SIZE as usize;

        let cell_resistance = |cell: Cell| -> Option<f32> {
            if enemy.contains(cell) {
                None
            } else if own.contains(cell) {
                Some(STONE_RESISTANCE)
            } else {
                Some(EMPTY_RESISTANCE)
            }
        };
        let on_near_edge = |cell: Cell| match color {
            Color::Black => cell.row() == 0,
            Color::White => cell.col() == 0,
        };
        let on_far_edge = |cell: Cell| match color {
            Color::Black => cell.row() == size - 1,
            Color::White => cell.col() == size - 1,
        };

        let playable: Vec<Cell> = (0..size)
            .flat_map(|row| (0..size).map(move |col| (col, row)))
            .filter_map(|(col, row)| Cell::new(col, row))
            .filter(|&c| cell_resistance(c).is_some())
            .collect();

        // Gauss-Seidel relaxation of node potentials; the edges act as
        // perfect conductors at potentials 1 and 0
        let mut potential = vec![0.5f32; num_cells];
        for _ in 0..self.iterations {
            for &cell in &playable {
                let r = cell_resistance(cell).expect("playable cell has resistance");
                let mut flow = 0.0f32;
                let mut total = 0.0f32;
                if on_near_edge(cell) {
                    let g = 2.0 / r;
                    flow += g;
                    total += g;
                }
                if on_far_edge(cell) {
                    total += 2.0 / r;
                }
                for next in board.neighbors(cell) {
                    if let Some(rn) = cell_resistance(next) {
                        let g = 2.0 / (r + rn);
                        flow += g * potential[next.index()];
                        total += g;
                    }
                }
                if total > 0.0 {
                    potential[cell.index()] = flow / total;
                }
            }
        }

        // Total current drawn from the high edge
        let mut current = 0.0f32;
        for &cell in &playable {
            if on_near_edge(cell) {
                let r = cell_resistance(cell).expect("playable cell has resistance");
                current += (2.0 / r) * (1.0 - potential[cell.index()]);
            }
        }
        if current <= 1e-6 {
            BLOCKED_RESISTANCE
        } else {
            (1.0 / current).min(BLOCKED_RESISTANCE)
        }
    }
}
