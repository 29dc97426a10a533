//! The HTP engine: command dispatch over the solver, store, and book.

use std::io::{BufRead, Write};
use std::path::Path;

use tracing::{info, warn};

use hexel_core::{Cell, Color, Game, State};
use hexel_engine::backup::BackupConfig;
use hexel_engine::book::{Book, BookBuilder, BookConfig, BookNode, LOSS_VALUE, WIN_VALUE};
use hexel_engine::dfpn::{DFPN_DB_VERSION, DfpnConfig, DfpnSolver, SearchRecord};
use hexel_engine::eval::ResistanceEval;
use hexel_engine::oracle::BasicOracle;
use hexel_engine::player::{Player, PlayerConfig};
use hexel_engine::store::{PositionStore, StateDb, StoreConfig};

use crate::command::{BookValue, Command, parse_line};
use crate::error::HtpError;

/// Default board size of a fresh engine.
const DEFAULT_SIZE: u8 = 11;

/// The HTP engine: owns the game, the solver with its store, and the
/// optional book.
///
/// Commands run synchronously; a solve blocks the command loop until it
/// proves the position or hits its limits.
pub struct HtpEngine {
    game: Game,
    solver: DfpnSolver<BasicOracle<ResistanceEval>>,
    store: PositionStore<SearchRecord>,
    book: Option<Book>,
    player: Player,
    book_config: BookConfig,
    backup_config: BackupConfig,
    /// Minimum visit count for `book-best-move`.
    min_count: u32,
    /// Exploration weight for `book-best-move`.
    count_weight: f32,
}

impl HtpEngine {
    /// Create an engine with an empty default board.
    pub fn new() -> HtpEngine {
        HtpEngine {
            game: Game::new(DEFAULT_SIZE).expect("default size is valid"),
            solver: DfpnSolver::new(
                BasicOracle::new(ResistanceEval::default()),
                DfpnConfig::default(),
            ),
            store: PositionStore::new(StoreConfig::default()),
            book: None,
            player: Player::new(PlayerConfig::default()),
            book_config: BookConfig::default(),
            backup_config: BackupConfig::default(),
            min_count: 1,
            count_weight: 0.25,
        }
    }

    /// Run the command loop until `quit` or end of input.
    pub fn run(
        &mut self,
        reader: impl BufRead,
        mut writer: impl Write,
    ) -> Result<(), HtpError> {
        for line in reader.lines() {
            let line = line?;
            let request = match parse_line(&line) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(error) => {
                    warn!(%error, "rejected command line");
                    respond_failure(&mut writer, None, &error)?;
                    continue;
                }
            };
            let quitting = request.command == Command::Quit;
            match self.execute(request.command) {
                Ok(body) => respond_success(&mut writer, request.id, &body)?,
                Err(error) => {
                    warn!(%error, "command failed");
                    respond_failure(&mut writer, request.id, &error)?;
                }
            }
            if quitting {
                break;
            }
        }
        info!("htp engine shutting down");
        Ok(())
    }

    /// Execute one command, returning the response body.
    pub fn execute(&mut self, command: Command) -> Result<String, HtpError> {
        match command {
            Command::Name => Ok("hexel".to_string()),
            Command::Version => Ok(env!("CARGO_PKG_VERSION").to_string()),
            Command::ProtocolVersion => Ok("2".to_string()),
            Command::Quit => Ok(String::new()),
            Command::Boardsize { size } => {
                self.game = Game::new(size)?;
                Ok(String::new())
            }
            Command::ClearBoard => {
                self.game.clear();
                Ok(String::new())
            }
            Command::Play { color, cell } => self.play(color, cell),
            Command::GenMove { color } => self.genmove(color),
            Command::Undo => match self.game.undo() {
                Some(_) => Ok(String::new()),
                None => Err(HtpError::EmptyHistory),
            },
            Command::ShowBoard => Ok(format!("\n{}", self.game.state())),
            Command::SolveState {
                color,
                db_path,
                max_stones,
            } => self.solve_state(color, db_path.as_deref(), max_stones),
            Command::FindWinning { color } => self.find_winning(color),
            Command::ClearTt => {
                self.store.clear_tt();
                Ok(String::new())
            }
            Command::GetBounds => {
                let record = self.current_record()?;
                Ok(record.bounds.to_string())
            }
            Command::GetPv => {
                let pv = self.store.variation(self.game.state())?;
                Ok(join_cells(&pv))
            }
            Command::OpenDb { path } => {
                self.store
                    .set_db(StateDb::open(&path, DFPN_DB_VERSION)?);
                Ok(String::new())
            }
            Command::CloseDb => match self.store.take_db() {
                Some(db) => {
                    db.flush()?;
                    Ok(String::new())
                }
                None => Err(HtpError::NoDb),
            },
            Command::DbStat => {
                let db = self.store.db().ok_or(HtpError::NoDb)?;
                Ok(format!("positions {} {}", db.len(), db.stats()))
            }
            Command::BookOpen { path } => {
                self.book = Some(Book::open(&path)?);
                Ok(String::new())
            }
            Command::BookClose => match self.book.take() {
                Some(book) => {
                    book.flush()?;
                    Ok(String::new())
                }
                None => Err(HtpError::NoBook),
            },
            Command::BookExpand { iterations } => {
                let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
                let mut builder = BookBuilder::new(
                    book,
                    self.solver.oracle(),
                    *self.game.state(),
                    self.book_config.clone(),
                );
                let performed = builder.expand(iterations)?;
                Ok(format!("expanded {performed}"))
            }
            Command::BookRefresh => {
                let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
                let mut builder = BookBuilder::new(
                    book,
                    self.solver.oracle(),
                    *self.game.state(),
                    self.book_config.clone(),
                );
                builder.refresh()?;
                Ok(String::new())
            }
            Command::BookIncreaseWidth => {
                let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
                let mut builder = BookBuilder::new(
                    book,
                    self.solver.oracle(),
                    *self.game.state(),
                    self.book_config.clone(),
                );
                builder.increase_width()?;
                Ok(String::new())
            }
            Command::BookSetValue { value } => self.book_set_value(value),
            Command::BookBestMove => {
                let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
                let best =
                    book.best_move(self.game.state(), self.min_count, self.count_weight)?;
                Ok(best.map_or_else(|| "none".to_string(), |cell| cell.to_string()))
            }
            Command::BookImportSolved { path } => {
                let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
                let file = std::fs::File::open(&path).map_err(HtpError::Io)?;
                let stats = book.import_solved(
                    std::io::BufReader::new(file),
                    self.game.state().board().size(),
                )?;
                Ok(format!(
                    "lines {} parsed {} replaced {} new {}",
                    stats.lines, stats.parsed, stats.replaced, stats.new
                ))
            }
            Command::BookStat => {
                let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
                Ok(format!("positions {} {}", book.len(), book.stats()))
            }
            Command::ParamDfpn { assignment } => self.param_dfpn(assignment),
            Command::ParamBook { assignment } => self.param_book(assignment),
        }
    }

    fn play(&mut self, color: Color, cell: Cell) -> Result<String, HtpError> {
        if color != self.game.state().to_play() {
            return Err(HtpError::InvalidArgument {
                found: format!("it is not {color}'s turn"),
            });
        }
        self.game.play(cell)?;
        Ok(String::new())
    }

    fn genmove(&mut self, color: Color) -> Result<String, HtpError> {
        if color != self.game.state().to_play() {
            return Err(HtpError::InvalidArgument {
                found: format!("it is not {color}'s turn"),
            });
        }
        self.solver.clear_abort();
        let state = *self.game.state();
        let chosen = self.player.genmove(
            &self.solver,
            &self.store,
            self.book.as_ref(),
            &state,
        )?;
        match chosen {
            Some(cell) => {
                self.game.play(cell)?;
                Ok(cell.to_string())
            }
            None => Ok("resign".to_string()),
        }
    }

    fn solve_state(
        &mut self,
        color: Color,
        db_path: Option<&Path>,
        max_stones: Option<u32>,
    ) -> Result<String, HtpError> {
        if let Some(path) = db_path {
            self.store.set_db(StateDb::open(path, DFPN_DB_VERSION)?);
        }
        if let Some(max_stones) = max_stones {
            self.store.set_max_stones(max_stones);
        }
        let state = State::from_board(*self.game.state().board(), color);
        self.solver.clear_abort();
        let outcome = self.solver.solve(&state, &self.store)?;
        let mut body = match outcome.winner {
            Some(winner) => winner.to_string(),
            None => "unknown".to_string(),
        };
        if !outcome.pv.is_empty() {
            body.push(' ');
            body.push_str(&join_cells(&outcome.pv));
        }
        Ok(body)
    }

    fn find_winning(&mut self, color: Color) -> Result<String, HtpError> {
        let state = State::from_board(*self.game.state().board(), color);
        self.solver.clear_abort();
        let winning = self.solver.find_winning(&state, &self.store)?;
        Ok(join_cells(&winning))
    }

    fn current_record(&self) -> Result<SearchRecord, HtpError> {
        self.store
            .get(self.game.state())?
            .ok_or(HtpError::UnknownPosition)
    }

    fn book_set_value(&mut self, value: BookValue) -> Result<String, HtpError> {
        let book = self.book.as_ref().ok_or(HtpError::NoBook)?;
        let value = match value {
            BookValue::Win => WIN_VALUE,
            BookValue::Loss => LOSS_VALUE,
            BookValue::Heuristic(v) => v,
        };
        let state = self.game.state();
        let mut node = book.get(state)?.unwrap_or_else(|| BookNode::new(value));
        node.value = value;
        book.put(state, &node)?;
        book.flush()?;
        Ok(String::new())
    }

    // ── Parameters ──────────────────────────────────────────────────────────

    fn param_dfpn(
        &mut self,
        assignment: Option<(String, String)>,
    ) -> Result<String, HtpError> {
        let Some((name, value)) = assignment else {
            let config = self.solver.config();
            let backup = &self.backup_config;
            return Ok(format!(
                "[bool] use_widening {}\n\
                 [bool] use_ice {}\n\
                 [string] epsilon {}\n\
                 [string] expand_width {}\n\
                 [string] expand_threshold {}\n\
                 [string] num_threads {}\n\
                 [string] thread_work {}\n\
                 [string] timelimit {}\n\
                 [string] max_stones {}\n\
                 [string] db_bak_filename {}\n\
                 [string] db_bak_start {}\n\
                 [string] db_bak_period {}\n\
                 [string] tt_bak_filename {}\n\
                 [string] tt_bak_start {}\n\
                 [string] tt_bak_period {}",
                config.use_widening as u8,
                self.solver.oracle().use_ice() as u8,
                config.epsilon,
                config.expand_width,
                config.expand_threshold,
                config.num_threads,
                config.thread_work,
                config.timelimit.map_or(0.0, |t| t.as_secs_f64()),
                self.store.max_stones(),
                display_path(&backup.db_bak_filename),
                backup.db_bak_start.as_secs_f64(),
                backup.db_bak_period.as_secs_f64(),
                display_path(&backup.tt_bak_filename),
                backup.tt_bak_start.as_secs_f64(),
                backup.tt_bak_period.as_secs_f64(),
            ));
        };
        match name.as_str() {
            "use_widening" => self.solver.config_mut().use_widening = parse_bool(&value)?,
            "use_ice" => {
                let flag = parse_bool(&value)?;
                self.solver.oracle_mut().set_use_ice(flag);
            }
            "epsilon" => self.solver.config_mut().epsilon = parse_value(&value)?,
            "expand_width" => self.solver.config_mut().expand_width = parse_value(&value)?,
            "expand_threshold" => {
                self.solver.config_mut().expand_threshold = parse_value(&value)?;
            }
            "num_threads" => self.solver.config_mut().num_threads = parse_value(&value)?,
            "thread_work" => self.solver.config_mut().thread_work = parse_value(&value)?,
            "timelimit" => {
                let seconds: f64 = parse_value(&value)?;
                self.solver.config_mut().timelimit = (seconds > 0.0)
                    .then(|| std::time::Duration::from_secs_f64(seconds));
            }
            "max_stones" => {
                let max_stones: u32 = parse_value(&value)?;
                self.store.set_max_stones(max_stones);
            }
            "db_bak_filename" => {
                self.backup_config.db_bak_filename = Some(value.into());
                self.solver.set_backup(self.backup_config.clone());
            }
            "db_bak_start" => {
                self.backup_config.db_bak_start = parse_seconds(&value)?;
                self.solver.set_backup(self.backup_config.clone());
            }
            "db_bak_period" => {
                self.backup_config.db_bak_period = parse_seconds(&value)?;
                self.solver.set_backup(self.backup_config.clone());
            }
            "tt_bak_filename" => {
                self.backup_config.tt_bak_filename = Some(value.into());
                self.solver.set_backup(self.backup_config.clone());
            }
            "tt_bak_start" => {
                self.backup_config.tt_bak_start = parse_seconds(&value)?;
                self.solver.set_backup(self.backup_config.clone());
            }
            "tt_bak_period" => {
                self.backup_config.tt_bak_period = parse_seconds(&value)?;
                self.solver.set_backup(self.backup_config.clone());
            }
            _ => return Err(HtpError::UnknownParameter { name }),
        }
        Ok(String::new())
    }

    fn param_book(
        &mut self,
        assignment: Option<(String, String)>,
    ) -> Result<String, HtpError> {
        let Some((name, value)) = assignment else {
            let config = &self.book_config;
            return Ok(format!(
                "[bool] use_widening {}\n\
                 [string] alpha {}\n\
                 [string] expand_width {}\n\
                 [string] expand_threshold {}\n\
                 [string] flush_iterations {}\n\
                 [string] min_count {}\n\
                 [string] count_weight {}",
                config.use_widening as u8,
                config.alpha,
                config.expand_width,
                config.expand_threshold,
                config.flush_iterations,
                self.min_count,
                self.count_weight,
            ));
        };
        match name.as_str() {
            "use_widening" => self.book_config.use_widening = parse_bool(&value)?,
            "alpha" => self.book_config.alpha = parse_value(&value)?,
            "expand_width" => self.book_config.expand_width = parse_value(&value)?,
            "expand_threshold" => self.book_config.expand_threshold = parse_value(&value)?,
            "flush_iterations" => self.book_config.flush_iterations = parse_value(&value)?,
            "min_count" => {
                self.min_count = parse_value(&value)?;
                self.player.config_mut().book_min_count = self.min_count;
            }
            "count_weight" => {
                self.count_weight = parse_value(&value)?;
                self.player.config_mut().book_count_weight = self.count_weight;
            }
            _ => return Err(HtpError::UnknownParameter { name }),
        }
        Ok(String::new())
    }
}

impl Default for HtpEngine {
    fn default() -> HtpEngine {
        HtpEngine::new()
    }
}

fn respond_success(
    writer: &mut impl Write,
    id: Option<u32>,
    body: &str,
) -> Result<(), HtpError> {
    match (id, body.is_empty()) {
        (Some(id), true) => write!(writer, "={id}\n\n")?,
        (Some(id), false) => write!(writer, "={id} {body}\n\n")?,
        (None, true) => write!(writer, "=\n\n")?,
        (None, false) => write!(writer, "= {body}\n\n")?,
    }
    writer.flush()?;
    Ok(())
}

fn respond_failure(
    writer: &mut impl Write,
    id: Option<u32>,
    error: &HtpError,
) -> Result<(), HtpError> {
    match id {
        Some(id) => write!(writer, "?{id} {error}\n\n")?,
        None => write!(writer, "? {error}\n\n")?,
    }
    writer.flush()?;
    Ok(())
}

fn join_cells(cells: &[Cell]) -> String {
    cells
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn display_path(path: &Option<std::path::PathBuf>) -> String {
    path.as_ref()
        .map_or_else(|| "-".to_string(), |p| p.display().to_string())
}

fn parse_value<T: std::str::FromStr>(value: &str) -> Result<T, HtpError> {
    value.parse().map_err(|_| HtpError::InvalidArgument {
        found: value.to_string(),
    })
}

fn parse_bool(value: &str) -> Result<bool, HtpError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(HtpError::InvalidArgument {
            found: value.to_string(),
        }),
    }
}

fn parse_seconds(value: &str) -> Result<std::time::Duration, HtpError> {
    let seconds: f64 = parse_value(value)?;
    if seconds < 0.0 {
        return Err(HtpError::InvalidArgument {
            found: value.to_string(),
        });
    }
    Ok(std::time::Duration::from_secs_f64(seconds))
}
