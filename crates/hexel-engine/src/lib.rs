//! Solving and book-building engines over a shared position store.

pub mod backup;
pub mod book;
pub mod bounds;
pub mod children;
pub mod dfpn;
pub mod error;
pub mod eval;
pub mod history;
pub mod oracle;
pub mod player;
pub mod store;

pub use backup::{BackupConfig, BackupScheduler};
pub use book::{Book, BookBuilder, BookConfig, BookNode};
pub use bounds::Bounds;
pub use children::Children;
pub use dfpn::{DfpnConfig, DfpnSolver, SearchRecord, SolveOutcome};
pub use error::StoreError;
pub use eval::{Evaluation, FlowEval, ResistanceEval};
pub use history::History;
pub use oracle::{BasicOracle, MoveOracle};
pub use player::{MoveCache, Player, PlayerConfig};
pub use store::{PositionStore, StateDb, StoreConfig, StoreEntry};
