//! HTP command parsing.
//!
//! HTP is a GTP-style line protocol: an optional numeric id, a command
//! word, and whitespace-separated arguments.

use std::path::PathBuf;

use hexel_core::{Cell, Color};

use crate::error::HtpError;

/// A value accepted by `book-set-value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BookValue {
    /// Proven win for the side to move.
    Win,
    /// Proven loss for the side to move.
    Loss,
    /// A heuristic value in [0, 1].
    Heuristic(f32),
}

/// A parsed HTP command.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// `name` -- identify the engine.
    Name,
    /// `version` -- engine version.
    Version,
    /// `protocol_version` -- protocol revision.
    ProtocolVersion,
    /// `quit` -- exit the engine.
    Quit,
    /// `boardsize N` -- start a new game on an NxN board.
    Boardsize {
        /// Requested board dimension.
        size: u8,
    },
    /// `clear_board` -- reset to the empty board.
    ClearBoard,
    /// `play <color> <cell>` -- play a move.
    Play {
        /// The moving color.
        color: Color,
        /// The cell played.
        cell: Cell,
    },
    /// `genmove <color>` -- choose and play a move for a color.
    GenMove {
        /// The moving color.
        color: Color,
    },
    /// `undo` -- retract the last move.
    Undo,
    /// `showboard` -- print the current position.
    ShowBoard,
    /// `solve-state <color> [db-path [max-stones]]` -- prove the winner.
    SolveState {
        /// The side to move in the solved position.
        color: Color,
        /// Database to persist shallow positions in.
        db_path: Option<PathBuf>,
        /// Stone-count threshold of the database split.
        max_stones: Option<u32>,
    },
    /// `find-winning <color>` -- solve every root move, report winners.
    FindWinning {
        /// The side to move.
        color: Color,
    },
    /// `dfpn-clear-tt` -- drop the transposition table.
    ClearTt,
    /// `dfpn-get-bounds` -- bounds of the current position.
    GetBounds,
    /// `dfpn-get-pv` -- stored variation from the current position.
    GetPv,
    /// `dfpn-open-db <path>` -- attach a solver database.
    OpenDb {
        /// Database path.
        path: PathBuf,
    },
    /// `dfpn-close-db` -- detach the solver database.
    CloseDb,
    /// `dfpn-db-stat` -- database traffic counters.
    DbStat,
    /// `book-open <path>` -- open (or create) a book.
    BookOpen {
        /// Book path.
        path: PathBuf,
    },
    /// `book-close` -- close the open book.
    BookClose,
    /// `book-expand <n>` -- extend the book by n expansions.
    BookExpand {
        /// Number of expansions.
        iterations: u32,
    },
    /// `book-refresh` -- recompute values and priorities across the DAG.
    BookRefresh,
    /// `book-increase-width` -- re-widen overdue interior nodes.
    BookIncreaseWidth,
    /// `book-set-value <W|L|[0,1]>` -- override the current position's value.
    BookSetValue {
        /// The value to store.
        value: BookValue,
    },
    /// `book-best-move` -- best book move for the current position.
    BookBestMove,
    /// `book-import-solved <file>` -- import a solved-lines file.
    BookImportSolved {
        /// Input file path.
        path: PathBuf,
    },
    /// `book-stat` -- book size and traffic counters.
    BookStat,
    /// `param_dfpn [name value]` -- show or set solver parameters.
    ParamDfpn {
        /// Parameter assignment, or `None` to list.
        assignment: Option<(String, String)>,
    },
    /// `param_book [name value]` -- show or set book parameters.
    ParamBook {
        /// Parameter assignment, or `None` to list.
        assignment: Option<(String, String)>,
    },
}

/// A command with its optional protocol id.
#[derive(Debug, PartialEq)]
pub struct Request {
    /// Echoed back in the response when present.
    pub id: Option<u32>,
    /// The parsed command.
    pub command: Command,
}

/// Parse one line of HTP input.
///
/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Result<Option<Request>, HtpError> {
    let text = line.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    let mut id = None;
    if let Some(first) = tokens.first()
        && let Ok(number) = first.parse::<u32>()
    {
        id = Some(number);
        tokens.remove(0);
    }
    let Some(&word) = tokens.first() else {
        return Ok(None);
    };
    let args = &tokens[1..];
    let command = parse_command(word, args)?;
    Ok(Some(Request { id, command }))
}

fn parse_command(word: &str, args: &[&str]) -> Result<Command, HtpError> {
    match word {
        "name" => Ok(Command::Name),
        "version" => Ok(Command::Version),
        "protocol_version" => Ok(Command::ProtocolVersion),
        "quit" => Ok(Command::Quit),
        "clear_board" => Ok(Command::ClearBoard),
        "undo" => Ok(Command::Undo),
        "showboard" => Ok(Command::ShowBoard),
        "boardsize" => Ok(Command::Boardsize {
            size: parse_arg(args, 0, "board size")?,
        }),
        "play" => Ok(Command::Play {
            color: parse_arg(args, 0, "color")?,
            cell: parse_arg(args, 1, "cell")?,
        }),
        "genmove" => Ok(Command::GenMove {
            color: parse_arg(args, 0, "color")?,
        }),
        "solve-state" => Ok(Command::SolveState {
            color: parse_arg(args, 0, "color")?,
            db_path: args.get(1).map(PathBuf::from),
            max_stones: match args.get(2) {
                Some(token) => Some(parse_token(token)?),
                None => None,
            },
        }),
        "find-winning" => Ok(Command::FindWinning {
            color: parse_arg(args, 0, "color")?,
        }),
        "dfpn-clear-tt" => Ok(Command::ClearTt),
        "dfpn-get-bounds" => Ok(Command::GetBounds),
        "dfpn-get-pv" => Ok(Command::GetPv),
        "dfpn-open-db" => Ok(Command::OpenDb {
            path: path_arg(args, "database path")?,
        }),
        "dfpn-close-db" => Ok(Command::CloseDb),
        "dfpn-db-stat" => Ok(Command::DbStat),
        "book-open" => Ok(Command::BookOpen {
            path: path_arg(args, "book path")?,
        }),
        "book-close" => Ok(Command::BookClose),
        "book-expand" => Ok(Command::BookExpand {
            iterations: parse_arg(args, 0, "iteration count")?,
        }),
        "book-refresh" => Ok(Command::BookRefresh),
        "book-increase-width" => Ok(Command::BookIncreaseWidth),
        "book-set-value" => Ok(Command::BookSetValue {
            value: parse_book_value(args)?,
        }),
        "book-best-move" => Ok(Command::BookBestMove),
        "book-import-solved" => Ok(Command::BookImportSolved {
            path: path_arg(args, "input file")?,
        }),
        "book-stat" => Ok(Command::BookStat),
        "param_dfpn" => Ok(Command::ParamDfpn {
            assignment: parse_assignment(args)?,
        }),
        "param_book" => Ok(Command::ParamBook {
            assignment: parse_assignment(args)?,
        }),
        _ => Err(HtpError::UnknownCommand {
            command: word.to_string(),
        }),
    }
}

fn parse_arg<T: std::str::FromStr>(
    args: &[&str],
    index: usize,
    expected: &'static str,
) -> Result<T, HtpError> {
    let token = args
        .get(index)
        .ok_or(HtpError::MissingArgument { expected })?;
    parse_token(token)
}

fn parse_token<T: std::str::FromStr>(token: &str) -> Result<T, HtpError> {
    token.parse().map_err(|_| HtpError::InvalidArgument {
        found: token.to_string(),
    })
}

fn path_arg(args: &[&str], expected: &'static str) -> Result<PathBuf, HtpError> {
    args.first()
        .map(PathBuf::from)
        .ok_or(HtpError::MissingArgument { expected })
}

fn parse_book_value(args: &[&str]) -> Result<BookValue, HtpError> {
    let token = args.first().ok_or(HtpError::MissingArgument {
        expected: "value (W, L, or [0,1])",
    })?;
    match *token {
        "W" | "w" => Ok(BookValue::Win),
        "L" | "l" => Ok(BookValue::Loss),
        other => {
            let value: f32 = parse_token(other)?;
            if (0.0..=1.0).contains(&value) {
                Ok(BookValue::Heuristic(value))
            } else {
                Err(HtpError::InvalidArgument {
                    found: other.to_string(),
                })
            }
        }
    }
}

fn parse_assignment(args: &[&str]) -> Result<Option<(String, String)>, HtpError> {
    match args {
        [] => Ok(None),
        [name, value] => Ok(Some((name.to_string(), value.to_string()))),
        _ => Err(HtpError::InvalidArgument {
            found: args.join(" "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> Command {
        parse_line(line).unwrap().unwrap().command
    }

    #[test]
    fn parse_bare_commands() {
        assert_eq!(command("name"), Command::Name);
        assert_eq!(command("quit"), Command::Quit);
        assert_eq!(command("showboard"), Command::ShowBoard);
        assert_eq!(command("book-refresh"), Command::BookRefresh);
    }

    #[test]
    fn parse_id_prefix() {
        let request = parse_line("7 undo").unwrap().unwrap();
        assert_eq!(request.id, Some(7));
        assert_eq!(request.command, Command::Undo);
    }

    #[test]
    fn parse_play() {
        assert_eq!(
            command("play black c3"),
            Command::Play {
                color: Color::Black,
                cell: "c3".parse().unwrap(),
            }
        );
    }

    #[test]
    fn parse_play_rejects_bad_cell() {
        assert!(matches!(
            parse_line("play black z99"),
            Err(HtpError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn parse_boardsize() {
        assert_eq!(command("boardsize 5"), Command::Boardsize { size: 5 });
    }

    #[test]
    fn parse_genmove() {
        assert_eq!(
            command("genmove white"),
            Command::GenMove {
                color: Color::White
            }
        );
        assert!(parse_line("genmove").is_err());
    }

    #[test]
    fn parse_solve_state_variants() {
        assert_eq!(
            command("solve-state white"),
            Command::SolveState {
                color: Color::White,
                db_path: None,
                max_stones: None,
            }
        );
        assert_eq!(
            command("solve-state black solver.db 8"),
            Command::SolveState {
                color: Color::Black,
                db_path: Some(PathBuf::from("solver.db")),
                max_stones: Some(8),
            }
        );
    }

    #[test]
    fn parse_book_set_value() {
        assert_eq!(
            command("book-set-value W"),
            Command::BookSetValue {
                value: BookValue::Win
            }
        );
        assert_eq!(
            command("book-set-value 0.25"),
            Command::BookSetValue {
                value: BookValue::Heuristic(0.25)
            }
        );
        assert!(parse_line("book-set-value 1.5").is_err());
        assert!(parse_line("book-set-value").is_err());
    }

    #[test]
    fn parse_params() {
        assert_eq!(command("param_dfpn"), Command::ParamDfpn { assignment: None });
        assert_eq!(
            command("param_dfpn epsilon 0.5"),
            Command::ParamDfpn {
                assignment: Some(("epsilon".to_string(), "0.5".to_string()))
            }
        );
        assert!(parse_line("param_dfpn epsilon 0.5 extra").is_err());
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(matches!(
            parse_line("frobnicate"),
            Err(HtpError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# a comment").unwrap(), None);
    }
}
