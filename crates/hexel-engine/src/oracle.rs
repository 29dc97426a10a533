//! Move oracle: the narrow interface between the engines and move knowledge.
//!
//! Engines never enumerate moves themselves; they ask an oracle for the
//! legal set, the pruned-and-ordered consider set, and rule-level
//! determination. Inferior-cell analysis plugs in behind the same seam.

use hexel_core::{Cell, Color, State};

use crate::eval::Evaluation;

/// Supplies legal moves, consider moves, and terminal detection.
pub trait MoveOracle: Send + Sync {
    /// Every legal move in the position.
    fn legal_moves(&self, state: &State) -> Vec<Cell>;

    /// The moves worth exploring, best first, paired with their static
    /// scores from the mover's perspective. A subset of
    /// [`legal_moves`](Self::legal_moves), never empty while legal moves
    /// exist.
    fn consider_moves(&self, state: &State) -> Vec<(Cell, f32)>;

    /// The winner if the game is decided at this position.
    fn is_determined(&self, state: &State) -> Option<Color>;

    /// Static score of the position for its side to move.
    fn evaluate(&self, state: &State) -> f32;
}

/// Rule-based oracle ordering children by an evaluator.
///
/// With `use_ice` set, cells that are provably useless for the mover (not on
/// the mover's edge, every neighbor held by the opponent) are pruned from
/// the consider set.
pub struct BasicOracle<E> {
    evaluator: E,
    use_ice: bool,
}

impl<E: Evaluation> BasicOracle<E> {
    /// Create an oracle around an evaluator.
    pub fn new(evaluator: E) -> BasicOracle<E> {
        BasicOracle {
            evaluator,
            use_ice: false,
        }
    }

    /// Enable or disable inferior-cell pruning.
    pub fn set_use_ice(&mut self, flag: bool) {
        self.use_ice = flag;
    }

    /// Whether inferior-cell pruning is enabled.
    pub fn use_ice(&self) -> bool {
        self.use_ice
    }

    /// A cell the mover could never use: off the mover's own edges with
    /// every neighbor occupied by the opponent.
    fn is_dead_for(&self, state: &State, cell: Cell) -> bool {
        let mover = state.to_play();
        let size = state.board().size();
        let on_own_edge = match mover {
            Color::Black => cell.row() == 0 || cell.row() == size - 1,
            Color::White => cell.col() == 0 || cell.col() == size - 1,
        };
        if on_own_edge {
            return false;
        }
        let enemy = state.board().stones(mover.flip());
        state.board().neighbors(cell).all(|n| enemy.contains(n))
    }
}

impl<E: Evaluation> MoveOracle for BasicOracle<E> {
    fn legal_moves(&self, state: &State) -> Vec<Cell> {
        state.legal_moves().iter().collect()
    }

    fn consider_moves(&self, state: &State) -> Vec<(Cell, f32)> {
        let mut scratch = *state;
        let mut scored: Vec<(Cell, f32)> = Vec::new();
        for cell in state.legal_moves().iter() {
            if self.use_ice && self.is_dead_for(state, cell) {
                continue;
            }
            scratch.play(cell).expect("legal move must play");
            // The child is scored for its own mover; negate for us. When the
            // child position allows a swap, the opponent keeps the better
            // side, so only balance survives.
            let child_score = self.evaluator.evaluate(&scratch);
            let mut score = -child_score;
            if scratch.swap_is_legal() {
                score = -score.abs();
            }
            scratch.undo(cell).expect("played move must undo");
            scored.push((cell, score));
        }
        if scored.is_empty() {
            // Pruning must never empty the consider set
            scored = self
                .legal_moves(state)
                .iter()
                .map(|&cell| (cell, 0.0))
                .collect();
        }
        // Stable sort keeps move order as the tiebreak
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("scores are finite"));
        scored
    }

    fn is_determined(&self, state: &State) -> Option<Color> {
        state.winner()
    }

    fn evaluate(&self, state: &State) -> f32 {
        self.evaluator.evaluate(state)
    }
}
