//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report::{TextReportAdapter, tables};
use crate::domain::config_validation::{
    configured_indices, parse_date, validate_engine_config, validate_screen_config,
};
use crate::domain::constituent::parse_symbols;
use crate::domain::error::RotatorError;
use crate::domain::market_data::{MarketData, build_unified_timeline};
use crate::domain::orchestrator::{EngineConfig, SelectionEngine, rebalance_dates};
use crate::domain::ranker::rank_indices;
use crate::domain::regime::MarketRegime;
use crate::domain::screener::{Normalization, ScreenFilters, TrendFilter};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

/// Calendar days of history loaded before the first evaluation date when
/// `[data] history_days` is not set.
const DEFAULT_HISTORY_DAYS: i64 = 365;

#[derive(Parser, Debug)]
#[command(name = "rotator", about = "Index strength rotation and constituent selection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Select the strongest index and its stocks for one date
    Select {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluation date (YYYY-MM-DD); defaults to [engine] end_date
        #[arg(long)]
        date: Option<String>,
        /// Write the selection report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated index symbols overriding [indices] symbols
        #[arg(long)]
        indices: Option<String>,
    },
    /// Rank the tracked indices by strength for one date
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        indices: Option<String>,
    },
    /// Evaluate every rebalance date and write the decision log
    Rotate {
        #[arg(short, long)]
        config: PathBuf,
        /// Decision log path; defaults to [report] decision_log
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        indices: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        /// Symbol to inspect; defaults to the configured indices
        #[arg(long)]
        symbol: Option<String>,
    },
}

/// Everything a run needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub history_days: i64,
    pub index_symbols: Vec<String>,
    pub rebalance_every: usize,
    pub engine: EngineConfig,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Select {
            config,
            date,
            output,
            indices,
        } => run_select(&config, date.as_deref(), output.as_deref(), indices.as_deref()),
        Command::Rank {
            config,
            date,
            indices,
        } => run_rank(&config, date.as_deref(), indices.as_deref()),
        Command::Rotate {
            config,
            output,
            indices,
        } => run_rotate(&config, output.as_deref(), indices.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RotatorError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

pub fn build_screen_filters(config: &dyn ConfigPort) -> Result<ScreenFilters, RotatorError> {
    let defaults = ScreenFilters::default();
    let trend_defaults = TrendFilter::default();

    let normalization = match config.get_string("screen", "normalization") {
        Some(raw) => raw
            .parse::<Normalization>()
            .map_err(|reason| RotatorError::ConfigInvalid {
                section: "screen".into(),
                key: "normalization".into(),
                reason,
            })?,
        None => defaults.normalization,
    };

    let trend_filter = config.get_bool("screen", "trend_filter", true).then(|| TrendFilter {
        max_recent_gain: config.get_double("screen", "max_recent_gain", trend_defaults.max_recent_gain),
        gain_lookback: config.get_int("screen", "gain_lookback", trend_defaults.gain_lookback as i64)
            as usize,
        ma_down_ratio: config.get_double("screen", "ma_down_ratio", trend_defaults.ma_down_ratio),
        min_ma60_angle: config.get_double("screen", "min_ma60_angle", trend_defaults.min_ma60_angle),
        min_ma5_slope: config.get_double("screen", "min_ma5_slope", trend_defaults.min_ma5_slope),
    });

    let usize_key = |key: &str, default: usize| config.get_int("screen", key, default as i64).max(0) as usize;

    Ok(ScreenFilters {
        stock_window: usize_key("stock_window", defaults.stock_window),
        valuation_lower_pct: config.get_double("screen", "valuation_lower_pct", defaults.valuation_lower_pct),
        valuation_upper_pct: config.get_double("screen", "valuation_upper_pct", defaults.valuation_upper_pct),
        exclude_non_positive_valuation: config.get_bool(
            "screen",
            "exclude_non_positive_valuation",
            defaults.exclude_non_positive_valuation,
        ),
        lower_valuation_is_better: config.get_bool(
            "screen",
            "lower_valuation_is_better",
            defaults.lower_valuation_is_better,
        ),
        momentum_weight: config.get_double("screen", "momentum_weight", defaults.momentum_weight),
        valuation_weight: config.get_double("screen", "valuation_weight", defaults.valuation_weight),
        normalization,
        trend_filter,
        top_k: usize_key("top_k", defaults.top_k),
        min_selection: usize_key("min_selection", defaults.min_selection),
        stop_loss_lookback: usize_key("stop_loss_lookback", defaults.stop_loss_lookback),
    })
}

pub fn build_run_config(
    config: &dyn ConfigPort,
    indices_override: Option<&str>,
) -> Result<RunConfig, RotatorError> {
    validate_engine_config(config)?;
    validate_screen_config(config)?;

    let defaults = EngineConfig::default();
    let index_symbols = match indices_override {
        Some(raw) => parse_symbols(raw).map_err(|e| RotatorError::InvalidParameter {
            name: "indices".into(),
            reason: e.to_string(),
        })?,
        None => configured_indices(config)?,
    };

    let engine = EngineConfig {
        index_window: config.get_int("engine", "index_window", defaults.index_window as i64) as usize,
        filters: build_screen_filters(config)?,
        max_position_size: config.get_double("engine", "max_position_size", defaults.max_position_size),
    };
    engine.validate()?;

    Ok(RunConfig {
        start_date: parse_date(config, "engine", "start_date")?,
        end_date: parse_date(config, "engine", "end_date")?,
        history_days: config.get_int("data", "history_days", DEFAULT_HISTORY_DAYS).max(0),
        index_symbols,
        rebalance_every: config.get_int("engine", "rebalance_every", 5) as usize,
        engine,
    })
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, RotatorError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .trim()
        .to_lowercase();

    match source.as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .ok_or_else(|| RotatorError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            Ok(Box::new(adapter))
        }
        other => Err(RotatorError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source '{other}'"),
        }),
    }
}

fn parse_cli_date(raw: &str) -> Result<NaiveDate, RotatorError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| RotatorError::InvalidParameter {
        name: "date".into(),
        reason: format!("invalid date '{raw}' (expected YYYY-MM-DD)"),
    })
}

fn load_market_data(
    port: &dyn DataPort,
    run: &RunConfig,
    first: NaiveDate,
    last: NaiveDate,
) -> MarketData {
    let load_start = first - Duration::days(run.history_days);
    info!(
        indices = run.index_symbols.len(),
        from = %load_start,
        to = %last,
        "loading market data"
    );
    let data = MarketData::load(port, &run.index_symbols, load_start, last);
    if !data.unavailable.is_empty() {
        warn!(count = data.unavailable.len(), "some symbols unavailable");
    }
    data
}

fn prepare(
    config_path: &Path,
    indices_override: Option<&str>,
) -> Result<(FileConfigAdapter, RunConfig, Box<dyn DataPort>), RotatorError> {
    let config = load_config(config_path)?;
    let run = build_run_config(&config, indices_override)?;
    let port = build_data_port(&config)?;
    Ok((config, run, port))
}

pub fn run_select(
    config_path: &Path,
    date: Option<&str>,
    output: Option<&Path>,
    indices_override: Option<&str>,
) -> Result<(), RotatorError> {
    let (config, run, port) = prepare(config_path, indices_override)?;
    let date = match date {
        Some(raw) => parse_cli_date(raw)?,
        None => run.end_date,
    };

    let data = load_market_data(port.as_ref(), &run, date.min(run.start_date), date);
    let engine = SelectionEngine::new(run.engine.clone())?;
    let decision = engine.evaluate(&data, date, None);

    print!("{}", tables::render_decision(&decision, run.engine.max_position_size));

    let output = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "selection_report").map(PathBuf::from));
    if let Some(path) = output {
        let reporter = TextReportAdapter::new(run.engine.max_position_size);
        reporter.write_selection_report(&decision, &path.to_string_lossy())?;
        info!(path = %path.display(), "selection report written");
    }
    Ok(())
}

pub fn run_rank(
    config_path: &Path,
    date: Option<&str>,
    indices_override: Option<&str>,
) -> Result<(), RotatorError> {
    let (_config, run, port) = prepare(config_path, indices_override)?;
    let date = match date {
        Some(raw) => parse_cli_date(raw)?,
        None => run.end_date,
    };

    let data = load_market_data(port.as_ref(), &run, date.min(run.start_date), date);
    let ranking = rank_indices(&data.indices, date, run.engine.index_window, None)?;

    println!("Index ranking for {date}");
    print!("{}", tables::render_regime(MarketRegime::assess(&ranking.scores()).as_ref()));
    print!("{}", tables::render_ranking_table(&ranking.ranked));
    for skipped in &ranking.skipped {
        println!(
            "  skipped {}: {} of {} bars",
            skipped.symbol, skipped.bars, skipped.required
        );
    }
    Ok(())
}

pub fn run_rotate(
    config_path: &Path,
    output: Option<&Path>,
    indices_override: Option<&str>,
) -> Result<(), RotatorError> {
    let (config, run, port) = prepare(config_path, indices_override)?;

    let data = load_market_data(port.as_ref(), &run, run.start_date, run.end_date);
    let timeline = build_unified_timeline(&data.indices);
    let dates = rebalance_dates(&timeline, run.start_date, run.end_date, run.rebalance_every)?;
    if dates.is_empty() {
        return Err(RotatorError::InsufficientData {
            symbol: run.index_symbols.join(","),
            bars: 0,
            required: 1,
        });
    }
    info!(dates = dates.len(), every = run.rebalance_every, "evaluating rebalance schedule");

    let engine = SelectionEngine::new(run.engine.clone())?;
    let decisions = engine.evaluate_schedule(&data, &dates);

    let rotated = decisions.iter().filter(|d| !d.is_hold() && !d.is_stay_out()).count();
    let held = decisions.iter().filter(|d| d.is_hold()).count();
    let stayed_out = decisions.iter().filter(|d| d.is_stay_out()).count();
    for decision in &decisions {
        print!("{} {}", decision.evaluation_date, tables::render_status(decision));
    }
    println!(
        "\n{} decisions: {rotated} rotated, {held} held, {stayed_out} stayed out",
        decisions.len()
    );

    let path = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "decision_log").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("decisions.csv"));
    let reporter = TextReportAdapter::new(run.engine.max_position_size);
    reporter.write_decision_log(&decisions, &path.to_string_lossy())?;
    info!(path = %path.display(), "decision log written");
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), RotatorError> {
    let config = load_config(config_path)?;
    let run = build_run_config(&config, None)?;

    println!("Configuration is valid.");
    println!("  indices:    {}", run.index_symbols.join(", "));
    println!("  period:     {} to {}", run.start_date, run.end_date);
    println!("  rebalance:  every {} trading days", run.rebalance_every);
    println!("  index window: {}", run.engine.index_window);
    let f = &run.engine.filters;
    println!(
        "  screen:     window {}, band {}-{}%, weights {}/{}, {}, top {} (min {})",
        f.stock_window,
        f.valuation_lower_pct,
        f.valuation_upper_pct,
        f.momentum_weight,
        f.valuation_weight,
        f.normalization,
        f.top_k,
        f.min_selection
    );
    Ok(())
}

pub fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), RotatorError> {
    let config = load_config(config_path)?;
    let port = build_data_port(&config)?;

    let symbols = match symbol {
        Some(raw) => parse_symbols(raw).map_err(|e| RotatorError::InvalidParameter {
            name: "symbol".into(),
            reason: e.to_string(),
        })?,
        None => configured_indices(&config)?,
    };

    for s in &symbols {
        match port.get_data_range(s) {
            Ok(Some((first, last, count))) => println!("{s}: {count} bars, {first} to {last}"),
            Ok(None) => println!("{s}: no data found"),
            Err(e) => eprintln!("error querying {s}: {e}"),
        }
    }
    Ok(())
}
