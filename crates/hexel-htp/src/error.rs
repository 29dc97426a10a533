//! HTP protocol errors.

use hexel_core::BoardError;
use hexel_engine::StoreError;

/// Errors surfaced to the HTP caller as `? message` responses.
#[derive(Debug, thiserror::Error)]
pub enum HtpError {
    /// The command is not known to this engine.
    #[error("unknown command: {command}")]
    UnknownCommand {
        /// The command word received.
        command: String,
    },

    /// A required argument was missing.
    #[error("missing argument: expected {expected}")]
    MissingArgument {
        /// Description of the expected argument.
        expected: &'static str,
    },

    /// An argument failed to parse.
    #[error("invalid argument: \"{found}\"")]
    InvalidArgument {
        /// The offending argument text.
        found: String,
    },

    /// An unknown parameter name was given to a `param_*` command.
    #[error("unknown parameter: {name}")]
    UnknownParameter {
        /// The parameter name.
        name: String,
    },

    /// `undo` with no moves played.
    #[error("no move to undo")]
    EmptyHistory,

    /// The current position has no record in the store.
    #[error("position not in store")]
    UnknownPosition,

    /// A book command arrived with no book open.
    #[error("no open book")]
    NoBook,

    /// A database command arrived with no database open.
    #[error("no open database")]
    NoDb,

    /// A board-level rule violation.
    #[error(transparent)]
    Board(#[from] BoardError),

    /// An engine or store failure.
    #[error(transparent)]
    Engine(#[from] StoreError),

    /// Reading the input stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
