//! Integration tests for the parallel DFPN solver.
//!
//! Verifies correctness (proven winners, consistent variations) and
//! robustness (abort propagation, store persistence) under various worker
//! counts.

use std::sync::atomic::Ordering;

use hexel_core::{Color, State};
use hexel_engine::dfpn::{DfpnConfig, DfpnSolver, SearchRecord};
use hexel_engine::eval::FlowEval;
use hexel_engine::oracle::BasicOracle;
use hexel_engine::store::{PositionStore, StateDb, StoreConfig};

/// Helper: solve `size`x`size` Hex from the empty board with `threads`
/// workers against a fresh store.
fn solve_empty(size: u8, threads: usize) -> (Option<Color>, Vec<hexel_core::Cell>) {
    let mut solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
    solver.config_mut().num_threads = threads;
    let store: PositionStore<SearchRecord> = PositionStore::new(StoreConfig::default());
    let outcome = solver
        .solve(&State::new(size).unwrap(), &store)
        .expect("solve must not fail");
    (outcome.winner, outcome.pv)
}

// ── Proven winners ────────────────────────────────────────────────────────────

#[test]
fn single_worker_proves_small_boards() {
    for size in [1u8, 2, 3] {
        let (winner, pv) = solve_empty(size, 1);
        assert_eq!(
            winner,
            Some(Color::Black),
            "first player must win {size}x{size} Hex"
        );
        assert!(!pv.is_empty(), "{size}x{size} solve must produce a variation");
    }
}

#[test]
fn four_workers_agree_with_one() {
    for size in [2u8, 3] {
        let (single, _) = solve_empty(size, 1);
        let (multi, _) = solve_empty(size, 4);
        assert_eq!(single, multi, "worker count must not change the winner");
    }
}

#[test]
fn two_workers_prove_a_lost_position() {
    // White's a2-b2 pair double-threatens c1 and c2; Black to move cannot
    // block both, and has no faster win of his own
    let mut board = hexel_core::Board::new(3).unwrap();
    for cell in ["a2", "b2"] {
        board.place(Color::White, cell.parse().unwrap()).unwrap();
    }
    let state = State::from_board(board, Color::Black);

    let mut solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
    solver.config_mut().num_threads = 2;
    let store: PositionStore<SearchRecord> = PositionStore::new(StoreConfig::default());
    let outcome = solver.solve(&state, &store).unwrap();
    assert_eq!(outcome.winner, Some(Color::White));
}

// ── Variation consistency ─────────────────────────────────────────────────────

#[test]
fn variation_alternates_proven_outcomes() {
    let mut solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
    solver.config_mut().num_threads = 4;
    let store: PositionStore<SearchRecord> = PositionStore::new(StoreConfig::default());
    let root = State::new(3).unwrap();
    let outcome = solver.solve(&root, &store).unwrap();

    let mut state = root;
    let mut mover_wins = true;
    for cell in &outcome.pv {
        let record = store
            .get(&state)
            .unwrap()
            .expect("every variation position must be stored");
        assert!(record.bounds.is_solved());
        assert_eq!(
            record.bounds.is_winning(),
            mover_wins,
            "proven outcomes must alternate along the variation"
        );
        state.play(*cell).unwrap();
        mover_wins = !mover_wins;
    }
}

// ── Abort behaviour ───────────────────────────────────────────────────────────

#[test]
fn pre_set_abort_returns_undetermined() {
    let solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
    solver.abort_flag().store(true, Ordering::Release);
    let store: PositionStore<SearchRecord> = PositionStore::new(StoreConfig::default());
    let outcome = solver.solve(&State::new(5).unwrap(), &store).unwrap();
    assert_eq!(
        outcome.winner, None,
        "a pre-aborted search must not claim a winner"
    );
}

#[test]
fn cleared_abort_solves_again() {
    let solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
    solver.abort_flag().store(true, Ordering::Release);
    let store: PositionStore<SearchRecord> = PositionStore::new(StoreConfig::default());
    let aborted = solver.solve(&State::new(2).unwrap(), &store).unwrap();
    assert_eq!(aborted.winner, None);

    solver.clear_abort();
    let solved = solver.solve(&State::new(2).unwrap(), &store).unwrap();
    assert_eq!(solved.winner, Some(Color::Black));
}

// ── Persistence ───────────────────────────────────────────────────────────────

#[test]
fn solve_persists_across_database_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dfpn-db");
    let root = State::new(3).unwrap();

    let first = {
        let solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
        let mut store: PositionStore<SearchRecord> =
            PositionStore::new(StoreConfig::default());
        store.set_db(StateDb::open(&path, hexel_engine::dfpn::DFPN_DB_VERSION).unwrap());
        solver.solve(&root, &store).unwrap()
    };
    assert_eq!(first.winner, Some(Color::Black));

    // A fresh store over the same database answers without new search work
    let solver = DfpnSolver::new(BasicOracle::new(FlowEval), DfpnConfig::default());
    let mut store: PositionStore<SearchRecord> = PositionStore::new(StoreConfig::default());
    store.set_db(StateDb::open(&path, hexel_engine::dfpn::DFPN_DB_VERSION).unwrap());
    let record = store.get(&root).unwrap().expect("root must persist");
    assert!(record.bounds.is_winning());

    let second = solver.solve(&root, &store).unwrap();
    assert_eq!(second.winner, Some(Color::Black));
    assert_eq!(
        store.get(&root).unwrap().unwrap().work,
        record.work,
        "a persisted proof must be reused, not recomputed"
    );
}
