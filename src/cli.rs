//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvSeriesAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_catalog_adapter::JsonCatalogAdapter;
use crate::adapters::memory_store_adapter::MemoryStore;
use crate::domain::catalog::{filter_sessions, select_sessions};
use crate::domain::comparison::{compare, metric_label, Cell, ComparisonTable};
use crate::domain::error::StratlabError;
use crate::domain::metrics::{
    compute_drawdown_curve, compute_trade_statistics, max_drawdown, sort_by_field,
    summarize_backtest, BacktestReport, MetricsSummary, Streak, TradeField,
};
use crate::domain::pipeline::PipelineController;
use crate::domain::record::{ModuleKind, StepPayload};
use crate::domain::session::SessionId;
use crate::domain::step::{PipelineState, StepState};
use crate::domain::step_config::{load_step_gate, load_summary_config, store_backend, StoreBackend};
use crate::ports::config_port::ConfigPort;
use crate::ports::series_port::SeriesSource;
use crate::ports::session_catalog_port::SessionCatalog;
use crate::ports::session_store_port::SessionStore;

const EXIT_IMPORT_FAILED: u8 = 6;
const EXIT_ADVANCE_BLOCKED: u8 = 7;

#[derive(Parser, Debug)]
#[command(
    name = "stratlab",
    about = "Strategy construction pipeline and session analytics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a fresh session id
    NewSession,
    /// List the pipeline steps
    Steps {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Publish a module result for a session step
    Export {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        session: String,
        #[arg(long)]
        step: String,
        /// JSON payload; a full envelope unless --module is given
        #[arg(long, conflicts_with = "series", required_unless_present = "series")]
        file: Option<PathBuf>,
        #[arg(long)]
        module: Option<String>,
        /// Build a backtesting payload from CSV series
        #[arg(long)]
        series: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Show a session's pipeline state
    Status {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        session: String,
    },
    /// Check whether a step's result is available to the session
    Import {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        session: String,
        #[arg(long)]
        step: String,
    },
    /// Check whether every required step is satisfied
    Advance {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        session: String,
    },
    /// Headline metrics for a backtest
    Summarize {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, conflicts_with = "series", required_unless_present = "series")]
        session: Option<String>,
        /// Step holding the backtest result
        #[arg(long, default_value = "backtesting")]
        step: String,
        #[arg(long)]
        series: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Sorted trade log with streak statistics
    Trades {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        series: String,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long, default_value = "date")]
        sort: String,
        #[arg(long)]
        desc: bool,
    },
    /// Drawdown curve of an equity series
    Drawdown {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        series: String,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List recorded sessions
    Sessions {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        module: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Compare recorded sessions side by side
    Compare {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::NewSession => run_new_session(),
        Command::Steps { config } => run_steps(config.as_deref()),
        Command::Export {
            config,
            session,
            step,
            file,
            module,
            series,
            data_dir,
        } => {
            let source = match (file, series) {
                (Some(path), _) => PayloadSource::File {
                    path,
                    module: module.as_deref(),
                },
                (None, Some(name)) => PayloadSource::Series {
                    name,
                    data_dir: data_dir.as_deref(),
                },
                (None, None) => {
                    eprintln!("error: one of --file or --series is required");
                    return ExitCode::from(2);
                }
            };
            run_export(config.as_deref(), &session, &step, source)
        }
        Command::Status { config, session } => run_status(config.as_deref(), &session),
        Command::Import {
            config,
            session,
            step,
        } => run_import(config.as_deref(), &session, &step),
        Command::Advance { config, session } => run_advance(config.as_deref(), &session),
        Command::Summarize {
            config,
            session,
            step,
            series,
            data_dir,
            json,
        } => run_summarize(
            config.as_deref(),
            session.as_deref(),
            &step,
            series.as_deref(),
            data_dir.as_deref(),
            json,
        ),
        Command::Trades {
            config,
            series,
            data_dir,
            sort,
            desc,
        } => run_trades(config.as_deref(), &series, data_dir.as_deref(), &sort, desc),
        Command::Drawdown {
            config,
            series,
            data_dir,
        } => run_drawdown(config.as_deref(), &series, data_dir.as_deref()),
        Command::Sessions {
            config,
            catalog,
            module,
            search,
        } => run_sessions(
            config.as_deref(),
            catalog.as_deref(),
            module.as_deref(),
            search.as_deref(),
        ),
        Command::Compare {
            config,
            catalog,
            ids,
            json,
        } => run_compare(config.as_deref(), catalog.as_deref(), &ids, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// No path means an empty configuration: every setting takes its default.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StratlabError> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn SessionStore>, StratlabError> {
    let backend = store_backend(config)?;
    tracing::debug!(%backend, "opening session store");

    match backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StoreBackend::Sqlite => open_sqlite(config),
        StoreBackend::Postgres => open_postgres(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn SessionStore>, StratlabError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn SessionStore>, StratlabError> {
    Err(StratlabError::ConfigInvalid {
        section: "store".into(),
        key: "backend".into(),
        reason: "built without the sqlite feature".into(),
    })
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<Box<dyn SessionStore>, StratlabError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;

    let adapter = PostgresAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<Box<dyn SessionStore>, StratlabError> {
    Err(StratlabError::ConfigInvalid {
        section: "store".into(),
        key: "backend".into(),
        reason: "built without the postgres feature".into(),
    })
}

/// `--data-dir`, then `[series] dir`, then the working directory.
pub fn resolve_data_dir(config: &dyn ConfigPort, data_dir: Option<&Path>) -> PathBuf {
    data_dir
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("series", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `--catalog`, then `[catalog] path`.
pub fn resolve_catalog(
    config: &dyn ConfigPort,
    catalog: Option<&Path>,
) -> Result<JsonCatalogAdapter, StratlabError> {
    let path = match catalog {
        Some(path) => path.to_path_buf(),
        None => config
            .get_string("catalog", "path")
            .map(PathBuf::from)
            .ok_or_else(|| StratlabError::ConfigMissing {
                section: "catalog".into(),
                key: "path".into(),
            })?,
    };
    JsonCatalogAdapter::from_file(path)
}

fn run_new_session() -> Result<ExitCode, StratlabError> {
    println!("{}", SessionId::generate());
    Ok(ExitCode::SUCCESS)
}

fn run_steps(config_path: Option<&Path>) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let gate = load_step_gate(&config)?;

    for step in gate.definitions() {
        println!(
            "{:<14} {:<26} {:<9} {:<32} {}",
            step.id,
            step.name,
            if step.required { "required" } else { "optional" },
            step.storage_key,
            step.path
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub enum PayloadSource<'a> {
    File {
        path: PathBuf,
        module: Option<&'a str>,
    },
    Series {
        name: String,
        data_dir: Option<&'a Path>,
    },
}

/// Reads a payload file. With `module` the file content is the bare `data`;
/// otherwise it must be a full `{module, schemaVersion, data}` envelope.
pub fn read_payload_file(path: &Path, module: Option<&str>) -> Result<StepPayload, StratlabError> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| StratlabError::Data {
            reason: format!("{}: {}", path.display(), e),
        })?;

    match module {
        Some(raw) => {
            let module: ModuleKind = raw.parse().map_err(|reason| StratlabError::Data { reason })?;
            Ok(StepPayload::new(module, value))
        }
        None => serde_json::from_value(value).map_err(|e| StratlabError::Data {
            reason: format!(
                "{}: not a step payload envelope ({e}); pass --module to wrap raw data",
                path.display()
            ),
        }),
    }
}

pub fn backtest_from_series(
    source: &dyn SeriesSource,
    name: &str,
) -> Result<BacktestReport, StratlabError> {
    Ok(BacktestReport {
        equity_curve: source.fetch_equity_curve(name)?,
        trade_log: source.fetch_trades(name)?,
    })
}

fn run_export(
    config_path: Option<&Path>,
    session: &str,
    step_id: &str,
    source: PayloadSource<'_>,
) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let gate = load_step_gate(&config)?;
    let session_id = SessionId::new(session)?;

    let payload = match source {
        PayloadSource::File { path, module } => read_payload_file(&path, module)?,
        PayloadSource::Series { name, data_dir } => {
            let series = CsvSeriesAdapter::new(resolve_data_dir(&config, data_dir));
            backtest_from_series(&series, &name)?.to_payload()?
        }
    };

    let store = open_store(&config)?;
    let controller = PipelineController::new(&gate, store.as_ref());
    let record = controller.export_step(&session_id, step_id, &payload)?;

    let step = gate.definition(step_id)?;
    eprintln!(
        "Exported {} data for {} at {}",
        step.name,
        session_id,
        record.timestamp.to_rfc3339()
    );
    Ok(ExitCode::SUCCESS)
}

fn print_state(state: &PipelineState) {
    println!("Session {}", state.session_id);
    for status in &state.steps {
        let detail = match &status.state {
            StepState::Missing => "missing".to_string(),
            StepState::Imported(record) => format!(
                "imported ({}, {})",
                record.payload.module,
                record.timestamp.to_rfc3339()
            ),
            StepState::Corrupted { reason } => format!("corrupted: {reason}"),
        };
        println!(
            "  {:<14} {:<26} {:<9} {}",
            status.step_id,
            status.name,
            if status.required { "required" } else { "optional" },
            detail
        );
    }
    println!(
        "Ready to advance: {}",
        if state.all_required_satisfied { "yes" } else { "no" }
    );
}

fn run_status(config_path: Option<&Path>, session: &str) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let gate = load_step_gate(&config)?;
    let session_id = SessionId::new(session)?;
    let store = open_store(&config)?;

    let controller = PipelineController::new(&gate, store.as_ref());
    print_state(&controller.load_state(&session_id));
    Ok(ExitCode::SUCCESS)
}

fn run_import(
    config_path: Option<&Path>,
    session: &str,
    step_id: &str,
) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let gate = load_step_gate(&config)?;
    let session_id = SessionId::new(session)?;
    let store = open_store(&config)?;

    let controller = PipelineController::new(&gate, store.as_ref());
    let outcome = controller.import_step(&session_id, step_id)?;

    if outcome.success {
        println!("{}", outcome.message);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", outcome.message);
        Ok(ExitCode::from(EXIT_IMPORT_FAILED))
    }
}

fn run_advance(config_path: Option<&Path>, session: &str) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let gate = load_step_gate(&config)?;
    let session_id = SessionId::new(session)?;
    let store = open_store(&config)?;

    let controller = PipelineController::new(&gate, store.as_ref());
    let outcome = controller.try_advance(&session_id);

    if outcome.allowed {
        println!("All required steps complete for {session_id}");
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("Please complete all required steps before proceeding.");
    for id in outcome.state.missing_required() {
        if let Ok(step) = gate.definition(id) {
            eprintln!("  missing: {} ({})", step.name, step.id);
        }
    }
    Ok(ExitCode::from(EXIT_ADVANCE_BLOCKED))
}

fn print_summary(summary: &MetricsSummary, json: bool) -> Result<(), StratlabError> {
    if json {
        let out = serde_json::to_string_pretty(summary).map_err(|e| {
            StratlabError::Serialization {
                reason: e.to_string(),
            }
        })?;
        println!("{out}");
    } else {
        for (name, value) in summary.iter() {
            println!("{:<20} {:.2}", metric_label(name), value);
        }
    }
    Ok(())
}

fn run_summarize(
    config_path: Option<&Path>,
    session: Option<&str>,
    step_id: &str,
    series: Option<&str>,
    data_dir: Option<&Path>,
    json: bool,
) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let summary_config = load_summary_config(&config)?;

    let report = match (session, series) {
        (_, Some(name)) => {
            let source = CsvSeriesAdapter::new(resolve_data_dir(&config, data_dir));
            backtest_from_series(&source, name)?
        }
        (Some(session), None) => {
            let gate = load_step_gate(&config)?;
            let session_id = SessionId::new(session)?;
            let store = open_store(&config)?;
            let controller = PipelineController::new(&gate, store.as_ref());
            let outcome = controller.import_step(&session_id, step_id)?;

            let record = outcome
                .state
                .step(step_id)
                .and_then(|s| s.state.data())
                .filter(|_| outcome.success);
            let Some(record) = record else {
                eprintln!("{}", outcome.message);
                return Ok(ExitCode::from(EXIT_IMPORT_FAILED));
            };
            BacktestReport::from_payload(&record.payload)?
        }
        (None, None) => {
            eprintln!("error: one of --session or --series is required");
            return Ok(ExitCode::from(2));
        }
    };

    let summary = summarize_backtest(&report, &summary_config)?;
    print_summary(&summary, json)?;
    Ok(ExitCode::SUCCESS)
}

fn run_trades(
    config_path: Option<&Path>,
    series: &str,
    data_dir: Option<&Path>,
    sort: &str,
    desc: bool,
) -> Result<ExitCode, StratlabError> {
    let field: TradeField = sort
        .parse()
        .map_err(|reason| StratlabError::ConfigInvalid {
            section: "cli".into(),
            key: "sort".into(),
            reason,
        })?;

    let config = load_config(config_path)?;
    let source = CsvSeriesAdapter::new(resolve_data_dir(&config, data_dir));
    let trades = source.fetch_trades(series)?;

    let Some(stats) = compute_trade_statistics(&trades) else {
        println!("No trades recorded for {series}");
        return Ok(ExitCode::SUCCESS);
    };

    println!(
        "{:<12} {:<10} {:>12} {:>12} {:>12}",
        "Date", "Asset", "Entry", "Exit", "P&L"
    );
    for trade in sort_by_field(&trades, field, !desc) {
        println!(
            "{:<12} {:<10} {:>12.2} {:>12.2} {:>12.2}",
            trade.date.format("%Y-%m-%d"),
            trade.asset,
            trade.entry_price,
            trade.exit_price,
            trade.pnl
        );
    }

    let current = match stats.final_streak {
        Streak::Win(n) => format!("{n} win(s)"),
        Streak::Loss(n) => format!("{n} loss(es)"),
    };
    println!();
    println!("Average P&L:      {:.2}", stats.avg_profit);
    println!("Largest win:      {:.2}", stats.max_win);
    println!("Largest loss:     {:.2}", stats.max_loss);
    println!("Max win streak:   {}", stats.max_win_streak);
    println!("Max loss streak:  {}", stats.max_loss_streak);
    println!("Current streak:   {current}");
    Ok(ExitCode::SUCCESS)
}

fn run_drawdown(
    config_path: Option<&Path>,
    series: &str,
    data_dir: Option<&Path>,
) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let source = CsvSeriesAdapter::new(resolve_data_dir(&config, data_dir));
    let curve = source.fetch_equity_curve(series)?;

    let max = max_drawdown(&curve).ok_or(StratlabError::EmptySeries {
        series: "equity curve",
    })?;

    for point in compute_drawdown_curve(&curve) {
        println!("{}  {:>8.2}%", point.date.format("%Y-%m-%d"), point.drawdown_pct);
    }
    println!("Max drawdown: {max:.2}%");
    Ok(ExitCode::SUCCESS)
}

fn run_sessions(
    config_path: Option<&Path>,
    catalog: Option<&Path>,
    module: Option<&str>,
    search: Option<&str>,
) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let sessions = resolve_catalog(&config, catalog)?.list_sessions()?;

    let found = filter_sessions(&sessions, module, search);
    if found.is_empty() {
        eprintln!("No sessions match your filters.");
        return Ok(ExitCode::SUCCESS);
    }
    for s in found {
        println!(
            "{:<10} {:<32} {:<24} {}",
            s.id,
            s.name,
            s.module,
            s.timestamp.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub fn render_table(table: &ComparisonTable) -> String {
    let mut out = format!("{:<22}", "Metric");
    for session in &table.sessions {
        out.push_str(&format!(" {:>24}", session.name));
    }
    out.push('\n');

    for row in &table.rows {
        out.push_str(&format!("{:<22}", metric_label(&row.metric)));
        for cell in &row.cells {
            let text = match cell {
                Cell::Value(v) => format!("{v:.2}"),
                Cell::Missing => cell.to_string(),
            };
            out.push_str(&format!(" {text:>24}"));
        }
        out.push('\n');
    }
    out
}

fn run_compare(
    config_path: Option<&Path>,
    catalog: Option<&Path>,
    ids: &[String],
    json: bool,
) -> Result<ExitCode, StratlabError> {
    let config = load_config(config_path)?;
    let sessions = resolve_catalog(&config, catalog)?.list_sessions()?;
    let selected = select_sessions(&sessions, ids)?;
    let table = compare(&selected)?;

    if json {
        let out = serde_json::to_string_pretty(&table).map_err(|e| {
            StratlabError::Serialization {
                reason: e.to_string(),
            }
        })?;
        println!("{out}");
    } else {
        print!("{}", render_table(&table));
    }
    Ok(ExitCode::SUCCESS)
}
