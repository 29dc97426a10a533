//! Best-first opening-book expansion.
//!
//! Repeatedly descends from the build root to the most urgent leaf, expands
//! it with evaluator-scored children, and backs value and priority up the
//! descent path. Under transpositions the book is a DAG, so a full
//! [`refresh`](BookBuilder::refresh) recomputes every interior node from
//! the current leaves.

use hexel_core::{Cell, State};
use tracing::{debug, info};

use crate::book::node::{BookNode, LOSS_VALUE, WIN_VALUE, inverse, is_loss};
use crate::book::Book;
use crate::error::StoreError;
use crate::eval::unit_value;
use crate::oracle::MoveOracle;
use crate::store::PositionSet;

/// Tunable knobs of book expansion.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Priority weight: large values deepen lines, small values widen the
    /// tree toward breadth-first.
    pub alpha: f32,
    /// Whether interior nodes re-widen as their visit counts grow.
    pub use_widening: bool,
    /// Children created when a leaf is first expanded.
    pub expand_width: usize,
    /// Visits between widenings of an interior node.
    pub expand_threshold: u32,
    /// Expansion iterations between database flushes.
    pub flush_iterations: u32,
}

impl Default for BookConfig {
    fn default() -> BookConfig {
        BookConfig {
            alpha: 50.0,
            use_widening: true,
            expand_width: 16,
            expand_threshold: 1000,
            flush_iterations: 100,
        }
    }
}

/// Counters from one builder pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    /// Evaluator calls.
    pub evals: u64,
    /// Widening passes performed.
    pub widenings: u64,
    /// Interior value changes seen during refresh.
    pub value_updates: u64,
    /// Interior priority changes seen during refresh.
    pub priority_updates: u64,
    /// Interior nodes visited during refresh.
    pub internal_nodes: u64,
    /// Leaves visited during refresh.
    pub leaf_nodes: u64,
    /// Terminal nodes visited during refresh.
    pub terminal_nodes: u64,
}

enum Generated {
    /// The position is decided; the value is for its side to move.
    Determined(f32),
    /// Moves worth exploring, best first.
    Moves(Vec<Cell>),
}

/// Expands a [`Book`] using an injected move oracle and evaluator.
pub struct BookBuilder<'a, O> {
    book: &'a Book,
    oracle: &'a O,
    config: BookConfig,
    root: State,
    state: State,
    visited: PositionSet,
    stats: BuildStats,
}

impl<'a, O: MoveOracle> BookBuilder<'a, O> {
    /// Create a builder working from the given root position.
    pub fn new(book: &'a Book, oracle: &'a O, root: State, config: BookConfig) -> Self {
        BookBuilder {
            book,
            oracle,
            config,
            root,
            state: root,
            visited: PositionSet::new(),
            stats: BuildStats::default(),
        }
    }

    /// Counters from the last pass.
    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Extend the book by up to `iterations` leaf expansions.
    ///
    /// Stops early when the root becomes terminal — once the root is a
    /// known win or loss there is nothing left to learn.
    pub fn expand(&mut self, iterations: u32) -> Result<u32, StoreError> {
        self.stats = BuildStats::default();
        self.ensure_root_exists()?;
        let mut performed = 0;
        for iteration in 0..iterations {
            if iteration > 0 && iteration % self.config.flush_iterations == 0 {
                self.book.flush()?;
            }
            self.state = self.root;
            let root = self.read_node()?;
            if root.is_terminal() {
                info!("root solved, stopping expansion");
                break;
            }
            debug!(iteration, "book expansion");
            self.do_expansion()?;
            performed += 1;
        }
        self.book.flush()?;
        info!(
            expansions = performed,
            evals = self.stats.evals,
            widenings = self.stats.widenings,
            "book expansion finished"
        );
        Ok(performed)
    }

    /// Recompute value and priority for every interior node reachable from
    /// the root, given the current leaves. Applying it twice in a row is a
    /// no-op.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.stats = BuildStats::default();
        self.visited.clear();
        self.state = self.root;
        self.refresh_node()?;
        self.book.flush()?;
        info!(
            value_updates = self.stats.value_updates,
            priority_updates = self.stats.priority_updates,
            internal = self.stats.internal_nodes,
            leaves = self.stats.leaf_nodes,
            terminal = self.stats.terminal_nodes,
            "book refresh finished"
        );
        Ok(())
    }

    /// Re-widen every interior node whose visit count has outgrown its
    /// child set. Run [`refresh`](Self::refresh) afterwards to propagate.
    pub fn increase_width(&mut self) -> Result<(), StoreError> {
        if !self.config.use_widening {
            info!("widening disabled, nothing to do");
            return Ok(());
        }
        self.stats = BuildStats::default();
        self.visited.clear();
        self.state = self.root;
        self.increase_width_node()?;
        self.book.flush()?;
        info!(
            widenings = self.stats.widenings,
            evals = self.stats.evals,
            "width increase finished"
        );
        Ok(())
    }

    // ── Expansion internals ─────────────────────────────────────────────────

    fn read_node(&self) -> Result<BookNode, StoreError> {
        self.book.get(&self.state)?.ok_or(StoreError::MissingState)
    }

    fn write_node(&self, node: &BookNode) -> Result<(), StoreError> {
        self.book.put(&self.state, node)
    }

    /// The swap-aware value of a node at the current position.
    fn value(&self, node: &BookNode) -> f32 {
        Book::node_value(node, &self.state)
    }

    fn ensure_root_exists(&mut self) -> Result<(), StoreError> {
        self.state = self.root;
        if self.book.get(&self.state)?.is_none() {
            let value = self.leaf_value();
            self.stats.evals += 1;
            self.write_node(&BookNode::new(value))?;
        }
        Ok(())
    }

    /// Initial value of the current position: sentinel if decided, else the
    /// evaluator's unit score.
    fn leaf_value(&self) -> f32 {
        match self.oracle.is_determined(&self.state) {
            Some(winner) if winner == self.state.to_play() => WIN_VALUE,
            Some(_) => LOSS_VALUE,
            None => unit_value(self.oracle.evaluate(&self.state)),
        }
    }

    /// One best-first expansion: descend to the most urgent node, expand,
    /// and back up along the descent path.
    fn do_expansion(&mut self) -> Result<(), StoreError> {
        let node = self.read_node()?;
        if node.is_terminal() {
            return Ok(());
        }
        if node.is_leaf() {
            self.expand_children(self.config.expand_width)?;
        } else {
            // Re-widen when the visit count crosses the threshold
            if self.config.use_widening && node.count % self.config.expand_threshold == 0 {
                let width = (node.count / self.config.expand_threshold + 1) as usize
                    * self.config.expand_width;
                self.stats.widenings += 1;
                self.expand_children(width)?;
            }

            // The node may be newly terminal if a child was a proven win
            let mut node = self.read_node()?;
            self.update_value(&mut node)?;
            let most_urgent = self.update_priority(&mut node)?;
            self.write_node(&node)?;

            if !node.is_terminal()
                && let Some(cell) = most_urgent
            {
                self.state.play(cell).expect("book move must be legal");
                self.do_expansion()?;
                self.state.undo(cell).expect("played move must undo");
            }
        }

        let mut node = self.read_node()?;
        self.update_value(&mut node)?;
        self.update_priority(&mut node)?;
        node.count += 1;
        self.write_node(&node)
    }

    /// Create nodes for the first `count` consider children that do not
    /// exist yet. Returns whether any node was created.
    fn expand_children(&mut self, count: usize) -> Result<bool, StoreError> {
        // The position may turn out to be decided even though it was
        // already evaluated as a leaf
        let moves = match self.generate_moves() {
            Generated::Determined(value) => {
                info!("expansion found a determined state");
                self.write_node(&BookNode::new(value))?;
                return Ok(false);
            }
            Generated::Moves(moves) => moves,
        };
        let limit = count.min(moves.len());
        let mut created = false;
        for &cell in &moves[..limit] {
            self.state.play(cell).expect("consider move must be legal");
            if self.book.get(&self.state)?.is_none() {
                let value = self.leaf_value();
                self.stats.evals += 1;
                self.write_node(&BookNode::new(value))?;
                created = true;
            }
            self.state.undo(cell).expect("played move must undo");
        }
        Ok(created)
    }

    fn generate_moves(&self) -> Generated {
        if let Some(winner) = self.oracle.is_determined(&self.state) {
            let value = if winner == self.state.to_play() {
                WIN_VALUE
            } else {
                LOSS_VALUE
            };
            return Generated::Determined(value);
        }
        let moves = self
            .oracle
            .consider_moves(&self.state)
            .into_iter()
            .map(|(cell, _)| cell)
            .collect();
        Generated::Moves(moves)
    }

    /// Number of legal children present in the book.
    fn num_children(&mut self, legal: &[Cell]) -> Result<usize, StoreError> {
        let mut num = 0;
        for &cell in legal {
            self.state.play(cell).expect("legal move must play");
            if self.book.get(&self.state)?.is_some() {
                num += 1;
            }
            self.state.undo(cell).expect("played move must undo");
        }
        Ok(num)
    }

    /// `value = max over book children of inverse(child value)`.
    fn update_value_from(
        &mut self,
        node: &mut BookNode,
        legal: &[Cell],
    ) -> Result<(), StoreError> {
        let mut best: Option<f32> = None;
        for &cell in legal {
            self.state.play(cell).expect("legal move must play");
            if let Some(child) = self.book.get(&self.state)? {
                let value = inverse(Book::node_value(&child, &self.state));
                if best.is_none_or(|b| value > b) {
                    best = Some(value);
                }
            }
            self.state.undo(cell).expect("played move must undo");
        }
        if let Some(best) = best {
            node.value = best;
        }
        Ok(())
    }

    /// Update the node's value; if it is a loss, widen until a non-loss
    /// child appears or no new children can be produced.
    fn update_value(&mut self, node: &mut BookNode) -> Result<(), StoreError> {
        loop {
            let legal = self.oracle.legal_moves(&self.state);
            self.update_value_from(node, &legal)?;
            if !is_loss(self.value(node)) {
                return Ok(());
            }
            // Round up to the next multiple of the expansion width above
            // the current child count
            let num_children = self.num_children(&legal)?;
            let width = (num_children / self.config.expand_width + 1)
                * self.config.expand_width;
            debug!(num_children, width, "forced widening on loss");
            if !self.expand_children(width)? {
                return Ok(());
            }
            self.stats.widenings += 1;
        }
    }

    /// Priority of expanding a child, given its value and priority.
    fn compute_priority(&self, node: &BookNode, child_value: f32, child_priority: f32) -> f32 {
        let delta = node.value - inverse(child_value);
        self.config.alpha * delta + child_priority + 1.0
    }

    /// Recompute the node's priority and return the most urgent child.
    /// Requires that [`update_value`](Self::update_value) ran first.
    fn update_priority(&mut self, node: &mut BookNode) -> Result<Option<Cell>, StoreError> {
        let legal = self.oracle.legal_moves(&self.state);
        let mut best: Option<(Cell, f32)> = None;
        for cell in legal {
            self.state.play(cell).expect("legal move must play");
            if let Some(child) = self.book.get(&self.state)? {
                // The child's value adjusts for swap, the parent's does
                // not: we compare against the minimax value
                let child_value = Book::node_value(&child, &self.state);
                let priority = self.compute_priority(node, child_value, child.priority);
                if best.is_none_or(|(_, p)| priority < p) {
                    best = Some((cell, priority));
                }
            }
            self.state.undo(cell).expect("played move must undo");
        }
        if let Some((_, priority)) = best {
            node.priority = priority;
        }
        Ok(best.map(|(cell, _)| cell))
    }

    // ── Refresh and width passes ────────────────────────────────────────────

    fn refresh_node(&mut self) -> Result<bool, StoreError> {
        if self.visited.contains(&self.state) {
            return Ok(true);
        }
        let Some(mut node) = self.book.get(&self.state)? else {
            return Ok(false);
        };
        self.visited.insert(&self.state);
        if node.is_leaf() {
            self.stats.leaf_nodes += 1;
            if node.is_terminal() {
                self.stats.terminal_nodes += 1;
            }
            return Ok(true);
        }
        let old_value = self.value(&node);
        let old_priority = node.priority;
        for cell in self.oracle.legal_moves(&self.state) {
            self.state.play(cell).expect("legal move must play");
            self.refresh_node()?;
            self.state.undo(cell).expect("played move must undo");
        }
        self.update_value(&mut node)?;
        self.update_priority(&mut node)?;
        if (old_value - self.value(&node)).abs() > 1e-4 {
            self.stats.value_updates += 1;
        }
        if (old_priority - node.priority).abs() > 1e-4 {
            self.stats.priority_updates += 1;
        }
        self.write_node(&node)?;
        if node.is_terminal() {
            self.stats.terminal_nodes += 1;
        } else {
            self.stats.internal_nodes += 1;
        }
        Ok(true)
    }

    fn increase_width_node(&mut self) -> Result<(), StoreError> {
        if self.visited.contains(&self.state) {
            return Ok(());
        }
        let Some(node) = self.book.get(&self.state)? else {
            return Ok(());
        };
        self.visited.insert(&self.state);
        if node.is_terminal() || node.is_leaf() {
            return Ok(());
        }
        for cell in self.oracle.legal_moves(&self.state) {
            self.state.play(cell).expect("legal move must play");
            self.increase_width_node()?;
            self.state.undo(cell).expect("played move must undo");
        }
        let width = (node.count / self.config.expand_threshold + 1) as usize
            * self.config.expand_width;
        if self.expand_children(width)? {
            self.stats.widenings += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::FlowEval;
    use crate::oracle::BasicOracle;

    fn cell(s: &str) -> Cell {
        s.parse().unwrap()
    }

    fn setup(dir: &tempfile::TempDir, size: u8) -> (Book, BasicOracle<FlowEval>, State) {
        let book = Book::open(&dir.path().join("book")).unwrap();
        let oracle = BasicOracle::new(FlowEval);
        let root = State::new(size).unwrap();
        (book, oracle, root)
    }

    #[test]
    fn expand_creates_root_and_children() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, root) = setup(&dir, 3);
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        builder.expand(1).unwrap();
        assert!(book.get(&root).unwrap().is_some(), "root must exist");
        // One expansion creates the root leaf's children
        assert!(book.len() > 1);
    }

    #[test]
    fn expansion_grows_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, root) = setup(&dir, 3);
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        builder.expand(5).unwrap();
        let after_first = book.len();
        builder.expand(5).unwrap();
        assert!(book.len() >= after_first);
    }

    #[test]
    fn interior_value_is_max_inverse_child_value() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, root) = setup(&dir, 3);
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        builder.expand(10).unwrap();

        let node = book.get(&root).unwrap().unwrap();
        assert!(!node.is_leaf());
        let mut best: Option<f32> = None;
        let mut scratch = root;
        for cell in root.legal_moves().iter() {
            scratch.play(cell).unwrap();
            if let Some(child) = book.get(&scratch).unwrap() {
                let v = inverse(Book::node_value(&child, &scratch));
                if best.is_none_or(|b| v > b) {
                    best = Some(v);
                }
            }
            scratch.undo(cell).unwrap();
        }
        assert_eq!(node.value, best.unwrap());
    }

    #[test]
    fn refresh_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, root) = setup(&dir, 3);
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        builder.expand(10).unwrap();
        builder.refresh().unwrap();
        builder.refresh().unwrap();
        assert_eq!(builder.stats().value_updates, 0, "second refresh must change nothing");
        assert_eq!(builder.stats().priority_updates, 0);
    }

    #[test]
    fn expansion_counts_visits() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, root) = setup(&dir, 3);
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        builder.expand(4).unwrap();
        let node = book.get(&root).unwrap().unwrap();
        assert_eq!(node.count, 4);
    }

    #[test]
    fn terminal_root_stops_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, mut root) = setup(&dir, 2);
        // Black connects immediately: a2 then b... build a decided position
        root.play(cell("a1")).unwrap();
        root.play(cell("b1")).unwrap();
        root.play(cell("a2")).unwrap();
        assert!(root.is_terminal());
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        let performed = builder.expand(10).unwrap();
        assert_eq!(performed, 0, "terminal root must not expand");
        let node = book.get(&root).unwrap().unwrap();
        assert!(node.is_terminal());
    }

    #[test]
    fn import_then_refresh_propagates_solved_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let (book, oracle, root) = setup(&dir, 2);
        let mut builder = BookBuilder::new(&book, &oracle, root, BookConfig::default());
        builder.expand(2).unwrap();

        // Declare a2 externally solved for Black
        let solved = "a2 black\n";
        book.import_solved(std::io::Cursor::new(solved), 2).unwrap();
        builder.refresh().unwrap();

        // The raw leaf value is the sentinel, but the mover there may still
        // swap into the winning side, so the swap-aware view is a win for
        // the opponent and the root does not become terminal
        let mut child = root;
        child.play(cell("a2")).unwrap();
        let leaf = book.get(&child).unwrap().unwrap();
        assert!(super::super::node::is_loss(leaf.value));
        assert!(super::super::node::is_win(Book::node_value(&leaf, &child)));

        // After the refresh the root obeys the propagation invariant
        let node = book.get(&root).unwrap().unwrap();
        assert!(!node.is_terminal());
        let mut expected: Option<f32> = None;
        let mut scratch = root;
        for cell in root.legal_moves().iter() {
            scratch.play(cell).unwrap();
            if let Some(entry) = book.get(&scratch).unwrap() {
                let v = inverse(Book::node_value(&entry, &scratch));
                if expected.is_none_or(|b| v > b) {
                    expected = Some(v);
                }
            }
            scratch.undo(cell).unwrap();
        }
        assert_eq!(node.value, expected.unwrap());
    }
}
