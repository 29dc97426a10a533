//! Depth-first proof-number search.
//!
//! The solver proves the winner of a position by iterative best-first
//! descent over (phi, delta) bounds, persisting every visited position in
//! the shared store so later searches amortize earlier work.
//!
//! Parallel search runs N workers over one store and one virtual-bounds
//! table. Workers serialize their top-of-tree path selection behind a single
//! mutex, advertise claims in the virtual table so other workers deflect
//! into different branches, run a work-bounded burst of search at the
//! selected sub-goal, and back real bounds up the claimed path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use hexel_core::{Cell, CellSet, Color, Game, State};
use tracing::{debug, info};

use crate::backup::{BackupConfig, BackupScheduler};
use crate::bounds::Bounds;
use crate::children::Children;
use crate::dfpn::control::SolverControl;
use crate::dfpn::record::SearchRecord;
use crate::dfpn::vtt::{MAX_WORKERS, VirtualBounds};
use crate::error::StoreError;
use crate::history::History;
use crate::oracle::MoveOracle;
use crate::store::PositionStore;

/// Tunable knobs of the DFPN search.
#[derive(Debug, Clone)]
pub struct DfpnConfig {
    /// The epsilon of the 1+epsilon descent rule: a child's delta budget is
    /// the second-best sibling delta scaled by this factor.
    pub epsilon: f32,
    /// Whether to restrict each node to a growing window of its best
    /// children.
    pub use_widening: bool,
    /// Children live from the first visit.
    pub expand_width: usize,
    /// Work between admissions of one further child.
    pub expand_threshold: u64,
    /// Number of worker threads.
    pub num_threads: usize,
    /// Maximum work a worker spends on a single claimed sub-goal.
    pub thread_work: u64,
    /// Wall-clock budget for one solve. `None` searches until proven.
    pub timelimit: Option<Duration>,
}

impl Default for DfpnConfig {
    fn default() -> DfpnConfig {
        DfpnConfig {
            epsilon: 0.25,
            use_widening: true,
            expand_width: 16,
            expand_threshold: 1000,
            num_threads: 1,
            thread_work: 1000,
            timelimit: None,
        }
    }
}

/// Counters reported after a solve.
#[derive(Debug, Default, Clone, Copy)]
pub struct DfpnStats {
    /// Search bursts (MID invocations).
    pub mid_calls: u64,
    /// Positions expanded for the first time.
    pub records_created: u64,
    /// Rule-terminal positions reached.
    pub terminal_hits: u64,
    /// Siblings pruned through max-proof domination.
    pub pruned_siblings: u64,
    /// Sub-goals found already solved by another worker.
    pub wasted_selections: u64,
}

#[derive(Default)]
struct AtomicDfpnStats {
    mid_calls: AtomicU64,
    records_created: AtomicU64,
    terminal_hits: AtomicU64,
    pruned_siblings: AtomicU64,
    wasted_selections: AtomicU64,
}

impl AtomicDfpnStats {
    fn reset(&self) {
        self.mid_calls.store(0, Ordering::Relaxed);
        self.records_created.store(0, Ordering::Relaxed);
        self.terminal_hits.store(0, Ordering::Relaxed);
        self.pruned_siblings.store(0, Ordering::Relaxed);
        self.wasted_selections.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DfpnStats {
        DfpnStats {
            mid_calls: self.mid_calls.load(Ordering::Relaxed),
            records_created: self.records_created.load(Ordering::Relaxed),
            terminal_hits: self.terminal_hits.load(Ordering::Relaxed),
            pruned_siblings: self.pruned_siblings.load(Ordering::Relaxed),
            wasted_selections: self.wasted_selections.load(Ordering::Relaxed),
        }
    }
}

/// Result of one solve call.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// The proven winner, or `None` when the search stopped on its budget,
    /// deadline, or abort flag.
    pub winner: Option<Color>,
    /// Principal variation from the root, following stored best moves.
    pub pv: Vec<Cell>,
    /// Bounds of the root record when the search ended.
    pub root_bounds: Bounds,
    /// Search counters.
    pub stats: DfpnStats,
}

/// Observer of solved positions.
pub trait SolveListener: Send + Sync {
    /// Called when a position is first proven, with the line from the
    /// search root and the solved record.
    fn state_solved(&self, line: &[Cell], record: &SearchRecord);
}

/// Shared per-solve state, borrowed by every worker.
struct SearchCtx<'a> {
    store: &'a PositionStore<SearchRecord>,
    vtt: VirtualBounds,
    topmid: Mutex<()>,
    parking: Mutex<()>,
    parked: Condvar,
    path_solved: Vec<AtomicBool>,
    done: AtomicBool,
    control: SolverControl,
    root: State,
    max_bounds: Bounds,
}

enum PathOutcome {
    /// A claimed sub-goal: run a search burst with these limits.
    Goal { max_bounds: Bounds },
    /// The root is solved or has crossed the caller's bounds.
    RootDone,
    /// Every reachable branch is claimed or solved; park and retry.
    NothingToSearch,
}

/// Hex solver using DFPN search.
pub struct DfpnSolver<O> {
    oracle: O,
    config: DfpnConfig,
    abort: Arc<AtomicBool>,
    backup: BackupScheduler,
    listeners: Vec<Box<dyn SolveListener>>,
    stats: AtomicDfpnStats,
}

impl<O: MoveOracle> DfpnSolver<O> {
    /// Create a solver around a move oracle.
    pub fn new(oracle: O, config: DfpnConfig) -> DfpnSolver<O> {
        DfpnSolver {
            oracle,
            config,
            abort: Arc::new(AtomicBool::new(false)),
            backup: BackupScheduler::new(BackupConfig::default()),
            listeners: Vec::new(),
            stats: AtomicDfpnStats::default(),
        }
    }

    /// The solver's configuration.
    pub fn config(&self) -> &DfpnConfig {
        &self.config
    }

    /// Mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut DfpnConfig {
        &mut self.config
    }

    /// The move oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable access to the move oracle.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Install a backup policy.
    pub fn set_backup(&mut self, config: BackupConfig) {
        self.backup = BackupScheduler::new(config);
    }

    /// The backup policy.
    pub fn backup(&self) -> &BackupScheduler {
        &self.backup
    }

    /// The shared abort flag. Raise it from another thread to stop a
    /// running solve.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Lower the abort flag before starting fresh work.
    pub fn clear_abort(&self) {
        self.abort.store(false, Ordering::Release);
    }

    /// Register a solve listener.
    pub fn add_listener(&mut self, listener: Box<dyn SolveListener>) {
        self.listeners.push(listener);
    }

    /// Solve a position to completion (or abort/deadline).
    pub fn solve(
        &self,
        root: &State,
        store: &PositionStore<SearchRecord>,
    ) -> Result<SolveOutcome, StoreError> {
        self.solve_bounded(root, store, Bounds::new(Bounds::MAX_WORK, Bounds::MAX_WORK))
    }

    /// Solve a position within the given root bounds. Crossing them is
    /// budget exhaustion, reported as an undetermined outcome.
    pub fn solve_bounded(
        &self,
        root: &State,
        store: &PositionStore<SearchRecord>,
        max_bounds: Bounds,
    ) -> Result<SolveOutcome, StoreError> {
        self.stats.reset();
        let cells = root.board().size() as usize * root.board().size() as usize;
        let ctx = SearchCtx {
            store,
            vtt: VirtualBounds::new(cells + 1),
            topmid: Mutex::new(()),
            parking: Mutex::new(()),
            parked: Condvar::new(),
            path_solved: (0..MAX_WORKERS).map(|_| AtomicBool::new(false)).collect(),
            done: AtomicBool::new(false),
            control: SolverControl::new(Arc::clone(&self.abort), self.config.timelimit),
            root: *root,
            max_bounds,
        };
        let threads = self.config.num_threads.clamp(1, MAX_WORKERS);
        debug!(threads, %max_bounds, "starting dfpn search");

        let joined: Result<(), StoreError> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|id| {
                    let ctx = &ctx;
                    scope.spawn(move || self.run_worker(ctx, id))
                })
                .collect();
            let mut first_err = Ok(());
            for handle in handles {
                let result = handle.join().expect("dfpn worker panicked");
                if first_err.is_ok() && result.is_err() {
                    first_err = result;
                }
            }
            first_err
        });
        joined?;
        store.flush()?;

        let record = store.get(root)?;
        let (winner, root_bounds) = match &record {
            Some(r) if r.bounds.is_winning() => (Some(root.to_play()), r.bounds),
            Some(r) if r.bounds.is_losing() => (Some(root.to_play().flip()), r.bounds),
            Some(r) => (None, r.bounds),
            None => (None, Bounds::default()),
        };
        let pv = store.variation(root)?;
        let stats = self.stats.snapshot();
        let verdict = winner.map_or_else(|| "undetermined".to_string(), |c| c.to_string());
        info!(
            winner = %verdict,
            mid_calls = stats.mid_calls,
            terminal = stats.terminal_hits,
            pruned = stats.pruned_siblings,
            "dfpn search finished"
        );
        Ok(SolveOutcome {
            winner,
            pv,
            root_bounds,
            stats,
        })
    }

    /// Solve every considered root move and return the winning subset.
    pub fn find_winning(
        &self,
        root: &State,
        store: &PositionStore<SearchRecord>,
    ) -> Result<Vec<Cell>, StoreError> {
        let mut winning = Vec::new();
        let mut state = *root;
        for (cell, _) in self.oracle.consider_moves(root) {
            if self.abort.load(Ordering::Relaxed) {
                break;
            }
            state.play(cell).expect("consider move must be legal");
            let outcome = self.solve(&state, store)?;
            state.undo(cell).expect("played move must undo");
            // A winning root move leaves the opponent in a lost child
            if outcome.winner == Some(root.to_play()) {
                winning.push(cell);
            }
        }
        Ok(winning)
    }

    /// Refresh the bounds of every ancestor of the current game position.
    ///
    /// Walks the game history backwards from the current position toward
    /// the empty board, recomputing each stored ancestor from its children.
    /// The walk ends at the first ancestor missing from the store.
    pub fn propagate_backwards(
        &self,
        game: &Game,
        store: &PositionStore<SearchRecord>,
    ) -> Result<(), StoreError> {
        let mut state = *game.state();
        for &cell in game.history().iter().rev() {
            state.undo(cell).expect("game history must be undoable");
            let Some(mut record) = store.get(&state)? else {
                break;
            };
            if record.bounds.is_solved() || record.is_fresh() {
                continue;
            }
            if self.refresh_from_children(store, &mut state, &mut record)? {
                store.put(&state, &record)?;
            }
        }
        store.flush()
    }

    // ── Worker loop ─────────────────────────────────────────────────────────

    fn run_worker(&self, ctx: &SearchCtx<'_>, id: usize) -> Result<(), StoreError> {
        let result = self.worker_loop(ctx, id);
        if result.is_err() {
            // A fatal error stops the whole search; the coordinator re-raises
            ctx.done.store(true, Ordering::Release);
            ctx.parked.notify_all();
        }
        result
    }

    fn worker_loop(&self, ctx: &SearchCtx<'_>, id: usize) -> Result<(), StoreError> {
        loop {
            if ctx.done.load(Ordering::Acquire) || ctx.control.should_stop() {
                return Ok(());
            }
            ctx.path_solved[id].store(false, Ordering::Release);
            let mut state = ctx.root;
            let mut history = History::new(state.hash());

            let outcome = {
                let _top = ctx.topmid.lock().expect("topmid lock poisoned");
                self.select_path(ctx, id, &mut state, &mut history)?
            };
            match outcome {
                PathOutcome::RootDone => {
                    ctx.done.store(true, Ordering::Release);
                    ctx.parked.notify_all();
                    return Ok(());
                }
                PathOutcome::Goal { max_bounds } => {
                    let mut record = ctx.store.get(&state)?.unwrap_or_default();
                    if record.bounds.is_solved() {
                        self.stats.wasted_selections.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.mid(
                            ctx,
                            id,
                            max_bounds,
                            self.config.thread_work,
                            &mut record,
                            &mut state,
                            &mut history,
                        )?;
                    }
                    let _top = ctx.topmid.lock().expect("topmid lock poisoned");
                    self.backup_path(ctx, id, &mut state, &mut history)?;
                    ctx.parked.notify_all();
                }
                PathOutcome::NothingToSearch => {
                    {
                        let _top = ctx.topmid.lock().expect("topmid lock poisoned");
                        self.backup_path(ctx, id, &mut state, &mut history)?;
                    }
                    // Park until another worker backs something up
                    let guard = ctx.parking.lock().expect("parking lock poisoned");
                    let _ = ctx
                        .parked
                        .wait_timeout(guard, Duration::from_millis(20))
                        .expect("parking lock poisoned");
                }
            }
        }
    }

    /// Descend from the root to a claimable sub-goal, installing virtual
    /// claims along the way. Runs under the top mutex.
    fn select_path(
        &self,
        ctx: &SearchCtx<'_>,
        id: usize,
        state: &mut State,
        history: &mut History,
    ) -> Result<PathOutcome, StoreError> {
        let mut max_bounds = ctx.max_bounds;
        loop {
            let depth = history.depth();
            let record = ctx.store.get(state)?.unwrap_or_default();

            if depth == 0
                && (record.bounds.is_solved()
                    || record.bounds.phi >= ctx.max_bounds.phi
                    || record.bounds.delta >= ctx.max_bounds.delta)
                && !record.is_fresh()
            {
                return Ok(PathOutcome::RootDone);
            }

            let claim_bounds = inflated(record.bounds, self.config.thread_work);
            ctx.vtt.claim(depth, state.hash(), id, claim_bounds);

            if record.is_fresh()
                || record.bounds.is_solved()
                || record.work < self.config.thread_work
            {
                return Ok(PathOutcome::Goal { max_bounds });
            }

            // Interior split node: pick a child under virtual bounds so
            // concurrent workers spread over different branches.
            let kids = self.lookup_children(ctx.store, state, history, &record.children)?;
            let mut virtual_bounds: Vec<Bounds> =
                kids.iter().map(|k| k.bounds).collect();
            for (i, vb) in virtual_bounds.iter_mut().enumerate() {
                let cell = record.children.move_at(i);
                state.play(cell).expect("child move must be legal");
                if let Some(advertised) = ctx.vtt.read(depth + 1, state.hash()) {
                    *vb = advertised;
                }
                state.undo(cell).expect("played move must undo");
            }
            let live = self.live_window(&record, &kids);
            let Some((best, _)) = select_child(&virtual_bounds, live) else {
                return Ok(PathOutcome::NothingToSearch);
            };
            max_bounds =
                self.child_max_bounds(max_bounds, &virtual_bounds, live, best);
            let cell = record.children.move_at(best);
            state.play(cell).expect("child move must be legal");
            history.push(cell, state.hash());
        }
    }

    /// Back up real bounds from the current position to the root, releasing
    /// virtual claims level by level. Runs under the top mutex.
    fn backup_path(
        &self,
        ctx: &SearchCtx<'_>,
        id: usize,
        state: &mut State,
        history: &mut History,
    ) -> Result<(), StoreError> {
        loop {
            let depth = history.depth();
            let mut record = ctx.store.get(state)?.unwrap_or_default();
            if !record.is_fresh()
                && !record.bounds.is_solved()
                && !record.children.is_empty()
                && self.refresh_from_children(ctx.store, state, &mut record)?
            {
                ctx.store.put(state, &record)?;
            }
            let solved = record.bounds.is_solved();
            let others = ctx
                .vtt
                .release(depth, state.hash(), id, record.bounds, solved);
            if others != 0 {
                for worker in 0..MAX_WORKERS {
                    if others & (1 << worker) != 0 {
                        ctx.path_solved[worker].store(true, Ordering::Release);
                    }
                }
            }
            if depth == 0 {
                if solved
                    || record.bounds.phi >= ctx.max_bounds.phi
                    || record.bounds.delta >= ctx.max_bounds.delta
                {
                    ctx.done.store(true, Ordering::Release);
                    ctx.parked.notify_all();
                }
                return Ok(());
            }
            let cell = history.last_move().expect("non-root history entry");
            history.pop();
            state.undo(cell).expect("history move must undo");
        }
    }

    // ── Core search ─────────────────────────────────────────────────────────

    /// One work-bounded burst of proof-number search at the current
    /// position. Returns the work performed.
    fn mid(
        &self,
        ctx: &SearchCtx<'_>,
        id: usize,
        max_bounds: Bounds,
        work_budget: u64,
        record: &mut SearchRecord,
        state: &mut State,
        history: &mut History,
    ) -> Result<u64, StoreError> {
        self.stats.mid_calls.fetch_add(1, Ordering::Relaxed);
        // The caller's copy may be stale when this position was reached
        // through a transposition since the caller cached its children; the
        // store is authoritative unless the table has evicted the record.
        if let Some(stored) = ctx.store.get(state)? {
            *record = stored;
        }
        if record.bounds.is_solved() {
            return Ok(0);
        }
        let mut work: u64 = 0;

        if record.is_fresh() {
            work += self.create_record(state, record);
            if record.bounds.is_solved() {
                record.work += work;
                self.write_solved(ctx, record, state, history)?;
                return Ok(work);
            }
        }

        let mut kids =
            self.lookup_children(ctx.store, state, history, &record.children)?;

        loop {
            let live = self.live_window(record, &kids);
            let solved = self.apply_children_bounds(record, &kids, live);
            if solved
                || record.bounds.phi >= max_bounds.phi
                || record.bounds.delta >= max_bounds.delta
                || work >= work_budget
            {
                break;
            }
            if ctx.control.should_stop() {
                // Abort: return current bounds without writing a degraded record
                return Ok(work);
            }
            if ctx.path_solved[id].load(Ordering::Acquire) {
                break;
            }

            let child_bounds: Vec<Bounds> = kids.iter().map(|k| k.bounds).collect();
            let Some((best, _)) = select_child(&child_bounds, live) else {
                break;
            };
            let child_max =
                self.child_max_bounds(max_bounds, &child_bounds, live, best);
            let cell = record.children.move_at(best);
            state.play(cell).expect("child move must be legal");
            history.push(cell, state.hash());
            let mut child = kids[best].clone();
            let spent = self.mid(
                ctx,
                id,
                child_max,
                work_budget - work,
                &mut child,
                state,
                history,
            )?;
            history.pop();
            state.undo(cell).expect("played move must undo");
            work += spent;

            // A child proven winning for its mover refutes our move; any
            // sibling outside the child's proof region fails the same way.
            if child.bounds.is_winning() {
                let proof = child.max_proof;
                self.prune_siblings(ctx, state, record, &mut kids, live, best, &proof)?;
            }
            kids[best] = child;
        }

        record.work += work.max(1);
        ctx.store.put(state, record)?;
        if record.bounds.is_solved() {
            self.on_solved(ctx, record, history)?;
        }
        Ok(work.max(1))
    }

    /// First visit to a position: terminal check, else child enumeration.
    fn create_record(&self, state: &State, record: &mut SearchRecord) -> u64 {
        if let Some(winner) = self.oracle.is_determined(state) {
            self.stats.terminal_hits.fetch_add(1, Ordering::Relaxed);
            let bounds = if winner == state.to_play() {
                Bounds::winning()
            } else {
                Bounds::losing()
            };
            // A decided position needs no empty cells for its proof
            *record = SearchRecord::terminal(bounds, self.oracle.evaluate(state));
            return 1;
        }
        let scored = self.oracle.consider_moves(state);
        if scored.is_empty() {
            // No legal move in an undecided position: loss for the mover
            *record = SearchRecord::terminal(Bounds::losing(), self.oracle.evaluate(state));
            return 1;
        }
        self.stats.records_created.fetch_add(1, Ordering::Relaxed);
        let moves: Vec<Cell> = scored.iter().map(|&(cell, _)| cell).collect();
        record.children = Children::new(moves);
        record.eval = self.oracle.evaluate(state);
        record.bounds = Bounds::default();
        1
    }

    /// Read the records of every child, substituting fresh defaults for
    /// unknown children and a never-improving sentinel for transpositions
    /// back into the current path.
    fn lookup_children(
        &self,
        store: &PositionStore<SearchRecord>,
        state: &mut State,
        history: &History,
        children: &Children,
    ) -> Result<Vec<SearchRecord>, StoreError> {
        let mut kids = Vec::with_capacity(children.len());
        for i in 0..children.len() {
            let cell = children.move_at(i);
            state.play(cell).expect("child move must be legal");
            let record = if history.contains_hash(state.hash()) {
                // Re-entering an ancestor must not look attractive from the
                // parent, nor contribute proof or disproof
                let mut sentinel = SearchRecord::default();
                sentinel.bounds = Bounds::new(Bounds::INFTY, Bounds::INFTY);
                sentinel
            } else {
                store.get(state)?.unwrap_or_default()
            };
            state.undo(cell).expect("played move must undo");
            kids.push(record);
        }
        Ok(kids)
    }

    /// How many of the ordered children are live at the current visit
    /// count. Extends past the schedule while every live child is a proven
    /// win for the opponent, so a loss is only ever proven over the full
    /// child set.
    fn live_window(&self, record: &SearchRecord, kids: &[SearchRecord]) -> usize {
        let total = kids.len();
        if total == 0 {
            return 0;
        }
        let mut live = if self.config.use_widening {
            let extra = (record.work / self.config.expand_threshold) as usize;
            self.config
                .expand_width
                .saturating_add(extra)
                .clamp(1, total)
        } else {
            total
        };
        while live < total && kids[..live].iter().all(|k| k.bounds.is_winning()) {
            live += 1;
        }
        live
    }

    /// Recompute a record's bounds from its live children: phi is the
    /// minimum child delta, delta the clamped sum of child phis. On a
    /// solve, fills in the best move and the max-proof set. Returns whether
    /// the record is solved.
    fn apply_children_bounds(
        &self,
        record: &mut SearchRecord,
        kids: &[SearchRecord],
        live: usize,
    ) -> bool {
        let mut phi = Bounds::INFTY;
        let mut delta: u64 = 0;
        for kid in &kids[..live] {
            phi = phi.min(kid.bounds.delta);
            delta = delta.saturating_add(kid.bounds.phi as u64);
        }
        let mut delta = delta.min(Bounds::INFTY as u64) as u32;
        if phi >= Bounds::INFTY && delta >= Bounds::INFTY {
            // (INFTY, INFTY) is never a valid pair; clamp the disproof side
            delta = Bounds::MAX_WORK;
        }
        record.bounds = Bounds::new(phi, delta);

        if record.bounds.is_winning() {
            // Winning through the child that is lost for the opponent
            let proving = kids[..live]
                .iter()
                .position(|k| k.bounds.is_losing())
                .expect("phi 0 requires a losing child");
            let best = record.children.move_at(proving);
            record.best_move = Some(best);
            record.max_proof = kids[proving].max_proof.with(best);
            true
        } else if record.bounds.is_losing() {
            // Lost: every child refutes us; the proof needs all their regions.
            // Keep the statically best move so variations extend through
            // lost positions.
            let mut proof = CellSet::EMPTY;
            for kid in &kids[..live] {
                proof |= kid.max_proof;
            }
            record.best_move = (!record.children.is_empty())
                .then(|| record.children.move_at(0));
            record.max_proof = proof;
            true
        } else {
            false
        }
    }

    /// Thresholds passed to the selected child, in the child's frame:
    /// its delta budget is the second-best sibling delta under the
    /// 1+epsilon rule (capped by the parent's phi budget), its phi budget
    /// is the parent's delta budget minus the other siblings' phi sum.
    fn child_max_bounds(
        &self,
        max_bounds: Bounds,
        child_bounds: &[Bounds],
        live: usize,
        best: usize,
    ) -> Bounds {
        let mut phi_sum: u64 = 0;
        let mut delta2 = Bounds::INFTY;
        for (i, b) in child_bounds[..live].iter().enumerate() {
            phi_sum = phi_sum.saturating_add(b.phi as u64);
            if i != best {
                delta2 = delta2.min(b.delta);
            }
        }
        let others = phi_sum - child_bounds[best].phi as u64;
        let phi_max = if max_bounds.delta >= Bounds::INFTY {
            Bounds::INFTY
        } else {
            (max_bounds.delta as u64).saturating_sub(others) as u32
        };
        let scaled = if delta2 >= Bounds::MAX_WORK {
            Bounds::MAX_WORK
        } else {
            ((delta2 as f64 * (1.0 + self.config.epsilon as f64)) as u32).saturating_add(1)
        };
        Bounds::new(phi_max, max_bounds.phi.min(scaled))
    }

    /// After a child refutes our move with proof region `proof`, solve all
    /// unproven siblings lying outside the region the same way: our extra
    /// stone there cannot disturb the opponent's winning strategy.
    fn prune_siblings(
        &self,
        ctx: &SearchCtx<'_>,
        state: &mut State,
        record: &SearchRecord,
        kids: &mut [SearchRecord],
        live: usize,
        best: usize,
        proof: &CellSet,
    ) -> Result<(), StoreError> {
        for i in 0..live {
            if i == best || kids[i].bounds.is_solved() {
                continue;
            }
            let cell = record.children.move_at(i);
            if proof.contains(cell) {
                continue;
            }
            let mut pruned = SearchRecord::terminal(Bounds::winning(), kids[i].eval);
            pruned.max_proof = *proof;
            state.play(cell).expect("child move must be legal");
            ctx.store.put(state, &pruned)?;
            state.undo(cell).expect("played move must undo");
            kids[i] = pruned;
            self.stats.pruned_siblings.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Recompute an interior record from its stored children. Returns
    /// whether anything changed.
    fn refresh_from_children(
        &self,
        store: &PositionStore<SearchRecord>,
        state: &mut State,
        record: &mut SearchRecord,
    ) -> Result<bool, StoreError> {
        let history = History::new(state.hash());
        let kids = self.lookup_children(store, state, &history, &record.children)?;
        let live = self.live_window(record, &kids);
        let before = record.bounds;
        self.apply_children_bounds(record, &kids, live);
        Ok(record.bounds != before)
    }

    fn write_solved(
        &self,
        ctx: &SearchCtx<'_>,
        record: &SearchRecord,
        state: &State,
        history: &History,
    ) -> Result<(), StoreError> {
        ctx.store.put(state, record)?;
        self.on_solved(ctx, record, history)
    }

    fn on_solved(
        &self,
        ctx: &SearchCtx<'_>,
        record: &SearchRecord,
        history: &History,
    ) -> Result<(), StoreError> {
        let line = history.line();
        for listener in &self.listeners {
            listener.state_solved(&line, record);
        }
        self.backup.maybe_backup(ctx.store)?;
        Ok(())
    }
}

/// Inflate unsolved bound components by a worker's pending budget, so
/// other workers read this branch as temporarily more expensive.
fn inflated(bounds: Bounds, amount: u64) -> Bounds {
    let amount = amount.min(Bounds::MAX_WORK as u64) as u32;
    let bump = |v: u32| {
        if v == 0 || v >= Bounds::INFTY {
            v
        } else {
            v.saturating_add(amount).min(Bounds::MAX_WORK)
        }
    };
    Bounds::new(bump(bounds.phi), bump(bounds.delta))
}

/// The delta-minimal live child and the second-smallest delta. `None` when
/// every live child is already decided or unreachable.
fn select_child(child_bounds: &[Bounds], live: usize) -> Option<(usize, u32)> {
    let mut best: Option<usize> = None;
    let mut delta1 = Bounds::INFTY;
    let mut delta2 = Bounds::INFTY;
    for (i, b) in child_bounds[..live].iter().enumerate() {
        if b.is_solved() {
            continue;
        }
        if b.delta < delta1 {
            delta2 = delta1;
            delta1 = b.delta;
            best = Some(i);
        } else if b.delta < delta2 {
            delta2 = b.delta;
        }
    }
    best.map(|i| (i, delta2))
}
