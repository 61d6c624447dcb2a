//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use crate::adapters::console_sync_adapter::ConsoleSyncAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store_adapter::JsonStoreAdapter;
use crate::domain::bar::BarSeries;
use crate::domain::clock::{PlaybackState, ReplayClock};
use crate::domain::config_validation::{
    collect_script_actions, parse_timestamp, validate_data_config, validate_replay_config,
    validate_script_config,
};
use crate::domain::error::ReplayError;
use crate::domain::metrics::Summary;
use crate::domain::script::{ActionOp, ScriptedAction};
use crate::domain::session::{ReplaySession, SavedSession};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::BarDataPort;
use crate::ports::store_port::DocumentStorePort;

#[derive(Parser, Debug)]
#[command(name = "replaylab", about = "Bar-replay trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scripted replay session
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Start from this bar index (overrides config)
        #[arg(long)]
        start_index: Option<usize>,
        /// Start from a random bar (overrides config)
        #[arg(long)]
        random_start: bool,
        /// Sleep the configured interval between ticks
        #[arg(long)]
        realtime: bool,
        /// Persist the finished session under this name
        #[arg(long)]
        save_session: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a replay configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored bar range for a symbol
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List saved replay sessions
    Sessions {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the summary of a saved session
    Show {
        #[arg(long)]
        name: String,
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Replay {
            config,
            symbol,
            timeframe,
            start_index,
            random_start,
            realtime,
            save_session,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_replay(
                    &config,
                    symbol.as_deref(),
                    timeframe.as_deref(),
                    start_index,
                    random_start,
                    realtime,
                    save_session.as_deref(),
                )
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            symbol,
            timeframe,
            config,
        } => run_info(symbol.as_deref(), timeframe.as_deref(), &config),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Sessions { config } => run_sessions(&config),
        Command::Show { name, config } => run_show(&name, &config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ReplayError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// A resolved `[data]` section: what to fetch and from where.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub dir: PathBuf,
    pub symbol: String,
    pub timeframe: String,
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
}

/// Resolve the data request, with CLI overrides taking precedence over the
/// config.
pub fn build_data_request(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
    timeframe_override: Option<&str>,
) -> Result<DataRequest, ReplayError> {
    let require = |key: &str| -> Result<String, ReplayError> {
        config
            .get_string("data", key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ReplayError::ConfigMissing {
                section: "data".into(),
                key: key.into(),
            })
    };

    let dir = PathBuf::from(require("dir")?);
    let symbol = match symbol_override {
        Some(s) => s.to_uppercase(),
        None => require("symbol")?.to_uppercase(),
    };
    let timeframe = match timeframe_override {
        Some(t) => t.to_string(),
        None => require("timeframe")?,
    };
    let start = parse_timestamp(&require("start")?, "data", "start")?;
    let end = parse_timestamp(&require("end")?, "data", "end")?;

    Ok(DataRequest {
        dir,
        symbol,
        timeframe,
        start,
        end,
    })
}

type SectionCheck = fn(&dyn ConfigPort) -> Result<(), ReplayError>;

const CONFIG_CHECKS: [(&str, SectionCheck); 3] = [
    ("data", validate_data_config),
    ("replay", validate_replay_config),
    ("script", validate_script_config),
];

/// Build the clock from `[replay]` settings.
pub fn build_clock(config: &dyn ConfigPort) -> Result<ReplayClock, ReplayError> {
    let interval_ms = config.get_int("replay", "interval_ms", 250);
    let speed = config.get_int("replay", "speed", 1);
    ReplayClock::new(interval_ms as u64, speed as u32)
}

/// Open the document store: sqlite when configured (and compiled in),
/// otherwise JSON files under `[store] dir`.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn DocumentStorePort>, ReplayError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_store_adapter::SqliteStoreAdapter;
        if config.get_string("sqlite", "path").is_some() {
            return Ok(Box::new(SqliteStoreAdapter::from_config(config)?));
        }
    }

    let dir = config
        .get_string("store", "dir")
        .unwrap_or_else(|| "./sessions".to_string());
    Ok(Box::new(JsonStoreAdapter::new(PathBuf::from(dir))?))
}

fn run_replay(
    config_path: &PathBuf,
    symbol_override: Option<&str>,
    timeframe_override: Option<&str>,
    start_index_override: Option<usize>,
    random_start_override: bool,
    realtime: bool,
    save_session: Option<&str>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate config sections
    for (_, validate) in CONFIG_CHECKS {
        if let Err(e) = validate(&adapter) {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    // Stage 3: Fetch bars
    let request = match build_data_request(&adapter, symbol_override, timeframe_override) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_port = CsvAdapter::new(request.dir.clone());
    eprintln!(
        "Fetching {} {} bars, {} to {}",
        request.symbol, request.timeframe, request.start, request.end
    );
    let bars = match data_port.fetch_bars(
        &request.symbol,
        &request.timeframe,
        request.start,
        request.end,
    ) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if bars.is_empty() {
        let e = ReplayError::EmptySeries;
        eprintln!(
            "error: no bars for {} {} in the requested range",
            request.symbol, request.timeframe
        );
        return (&e).into();
    }
    eprintln!("  {} bars loaded", bars.len());

    let series = match BarSeries::new(bars) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Parse script
    let actions = match collect_script_actions(&adapter) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 5: Build session
    let clock = match build_clock(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let mut session = ReplaySession::new(
        request.symbol.clone(),
        request.timeframe.clone(),
        series,
        clock,
    );
    session.attach_sync(Box::new(ConsoleSyncAdapter::stderr()));

    // Stage 6: Start point (CLI overrides config)
    let random = random_start_override || adapter.get_bool("replay", "random_start", false);
    let start_result = if random {
        session.random_start(&mut rand::thread_rng())
    } else {
        let index = start_index_override
            .unwrap_or_else(|| adapter.get_int("replay", "start_index", 0) as usize);
        session.restart_at(index)
    };
    let start_cursor = match start_result {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Starting at bar {start_cursor}");

    // Stage 7: Drive the clock to the end, applying due script actions
    // between ticks.
    let mut pending: Vec<ScriptedAction> = Vec::new();
    for action in actions {
        if action.bar < start_cursor {
            eprintln!(
                "warning: skipping action scheduled before the start point (bar {})",
                action.bar
            );
        } else {
            pending.push(action);
        }
    }

    if let Err(e) = apply_due_actions(&mut session, &mut pending) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    match drive_to_end(&mut session, &mut pending, realtime) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    // Stage 8: Optionally flatten whatever is still open
    if adapter.get_bool("replay", "auto_flatten_at_end", false) {
        match session.flatten_all() {
            Ok(flattened) if !flattened.is_empty() => {
                eprintln!("Flattened {} open trade(s) at the final bar", flattened.len());
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    }

    // Stage 9: Summary
    print_summary(&session.summary(), session.snapshot().open_trades.len());

    // Stage 10: Persist if asked
    if let Some(name) = save_session {
        let store = match open_store(&adapter) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if let Err(e) = session.save(store.as_ref(), name) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Session saved as '{name}'");
    }

    ExitCode::SUCCESS
}

/// Run the playback loop until the clock finishes.
fn drive_to_end(
    session: &mut ReplaySession,
    pending: &mut Vec<ScriptedAction>,
    realtime: bool,
) -> Result<(), ReplayError> {
    let Some(token) = session.play()? else {
        return Ok(());
    };

    loop {
        if realtime {
            thread::sleep(session.interval());
        }
        match session.tick(token)? {
            None => break,
            Some(event) => {
                apply_due_actions(session, pending)?;
                if event.replay.state == PlaybackState::Finished {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Apply every pending action whose bar the cursor has reached. Actions are
/// sorted by bar, so this drains a prefix.
fn apply_due_actions(
    session: &mut ReplaySession,
    pending: &mut Vec<ScriptedAction>,
) -> Result<(), ReplayError> {
    let cursor = session.replay_state().cursor;
    while pending.first().is_some_and(|a| a.bar <= cursor) {
        let action = pending.remove(0);
        match action.op {
            ActionOp::Place {
                side,
                quantity,
                stop_loss,
                take_profit,
            } => {
                let trade = session.place_trade(side, quantity, stop_loss, take_profit)?;
                eprintln!(
                    "Placed {} {} {} @ {:.2}",
                    trade.id, trade.side, trade.quantity, trade.entry_price
                );
            }
            ActionOp::Flatten => {
                let flattened = session.flatten_all()?;
                eprintln!("Flattened {} trade(s)", flattened.len());
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &Summary, still_open: usize) {
    eprintln!("\n=== Replay Summary ===");
    eprintln!("Total Trades:     {}", summary.total_trades);
    eprintln!(
        "Won / Lost / BE:  {} / {} / {}",
        summary.trades_won, summary.trades_lost, summary.trades_breakeven
    );
    eprintln!("Win Rate:         {:.1}%", summary.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", summary.profit_factor);
    eprintln!("Total P&L:        {:+.2}", summary.total_pnl);
    eprintln!("Biggest Win:      {:.2}", summary.biggest_win);
    eprintln!("Biggest Loss:     {:.2}", summary.biggest_loss);
    if still_open > 0 {
        eprintln!("Still Open:       {}", still_open);
    }
}

pub fn run_dry_run(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    for (_, validate) in &CONFIG_CHECKS[..2] {
        if let Err(e) = validate(&adapter) {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    let actions = match collect_script_actions(&adapter) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nScript actions ({}):", actions.len());
    for action in &actions {
        match &action.op {
            ActionOp::Place {
                side,
                quantity,
                stop_loss,
                take_profit,
            } => {
                eprintln!(
                    "  bar {:>5}: {} {}{}{}",
                    action.bar,
                    side,
                    quantity,
                    stop_loss
                        .map(|s| format!(" stop {s}"))
                        .unwrap_or_default(),
                    take_profit
                        .map(|t| format!(" target {t}"))
                        .unwrap_or_default(),
                );
            }
            ActionOp::Flatten => eprintln!("  bar {:>5}: flatten", action.bar),
        }
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    for (name, validate) in CONFIG_CHECKS {
        match validate(&adapter) {
            Ok(()) => eprintln!("  [{name}] ok"),
            Err(e) => {
                eprintln!("  [{name}] error: {e}");
                return (&e).into();
            }
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(
    symbol: Option<&str>,
    timeframe: Option<&str>,
    config_path: &PathBuf,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let request = match build_data_request(&config, symbol, timeframe) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let adapter = CsvAdapter::new(request.dir);
    match adapter.data_range(&request.symbol, &request.timeframe) {
        Ok(Some((first, last, count))) => {
            println!(
                "{}.{}: {} bars, {} to {}",
                request.symbol, request.timeframe, count, first, last
            );
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("{}.{}: no data found", request.symbol, request.timeframe);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_list_symbols(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let dir = match config.get_string("data", "dir") {
        Some(d) => PathBuf::from(d),
        None => {
            let e = ReplayError::ConfigMissing {
                section: "data".into(),
                key: "dir".into(),
            };
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let adapter = CsvAdapter::new(dir);
    match adapter.list_symbols() {
        Ok(symbols) => {
            if symbols.is_empty() {
                eprintln!("No symbols found");
            } else {
                for symbol in &symbols {
                    println!("{}", symbol);
                }
                eprintln!("{} symbols found", symbols.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_sessions(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match store.list_keys() {
        Ok(keys) => {
            if keys.is_empty() {
                eprintln!("No saved sessions");
            } else {
                for key in &keys {
                    println!("{}", key);
                }
                eprintln!("{} session(s)", keys.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_show(name: &str, config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let saved = match SavedSession::read(store.as_ref(), name) {
        Ok(Some(s)) => s,
        Ok(None) => {
            eprintln!("error: no session named '{name}'");
            return ExitCode::from(3);
        }
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "{} {} cursor {} ({})",
        saved.symbol, saved.timeframe, saved.replay.cursor, saved.replay.state
    );
    let summary = Summary::compute(&saved.ledger.closed_trades);
    print_summary(&summary, saved.ledger.open_trades.len());
    ExitCode::SUCCESS
}
