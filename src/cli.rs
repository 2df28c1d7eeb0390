//! CLI definition and dispatch.
//!
//! Every subcommand prints JSON on stdout. Logs go to stderr.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::adapters::config_market_adapter::ConfigMarketAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{analyze, Analysis};
use crate::domain::backtest::{run_backtest, RunStatus};
use crate::domain::candle::Candle;
use crate::domain::config_validation::{
    build_analysis_config, build_backtest_config, build_risk_config, candles_path, validate_config,
};
use crate::domain::error::SignalforgeError;
use crate::domain::risk::{size_position, RiskConfig, SetupRequest};
use crate::domain::scorer::Direction;
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_port::CandleSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::{AccountProvider, SymbolMetaProvider};

const DEFAULT_SIZE_CONFIDENCE: f64 = 75.0;

#[derive(Parser, Debug)]
#[command(name = "signalforge", about = "OHLC candle analytics, trade sizing and backtesting")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyse the most recent candles and print the signal
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Primary timeframe candles; defaults to [data] candles
        #[arg(long)]
        candles: Option<PathBuf>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Candles for the next higher timeframe
        #[arg(long)]
        higher: Option<PathBuf>,
        /// Candles for the next lower timeframe
        #[arg(long)]
        lower: Option<PathBuf>,
    },
    /// Replay the analysis over a candle file
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candles: Option<PathBuf>,
    },
    /// Size a position for a given entry
    Size {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        direction: String,
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        support: Option<f64>,
        #[arg(long)]
        resistance: Option<f64>,
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Validate every configuration section
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// JSON document and exit status of a finished command.
#[derive(Debug)]
pub struct Output {
    pub json: String,
    pub exit_code: u8,
}

impl Output {
    fn success(json: String) -> Self {
        Output { json, exit_code: 0 }
    }
}

pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(Targets::new().with_default(level));
    tracing_subscriber::registry().with(fmt_layer).init();
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(&cli.command) {
        Ok(output) => {
            println!("{}", output.json);
            ExitCode::from(output.exit_code)
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            (&e).into()
        }
    }
}

pub fn execute(command: &Command) -> Result<Output, SignalforgeError> {
    match command {
        Command::Analyze {
            config,
            candles,
            timeframe,
            higher,
            lower,
        } => run_analyze(
            config,
            candles.as_deref(),
            timeframe.as_deref(),
            higher.as_deref(),
            lower.as_deref(),
        ),
        Command::Backtest { config, candles } => run_backtest_command(config, candles.as_deref()),
        Command::Size {
            config,
            direction,
            entry,
            support,
            resistance,
            confidence,
        } => {
            let request = SetupRequest {
                direction: direction
                    .parse::<Direction>()
                    .map_err(|reason| SignalforgeError::Configuration { reason })?,
                entry: *entry,
                support: *support,
                resistance: *resistance,
                confidence: confidence.unwrap_or(DEFAULT_SIZE_CONFIDENCE),
            };
            run_size(config, &request)
        }
        Command::Validate { config } => run_validate(config),
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, SignalforgeError> {
    tracing::info!(file = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// A relative `[data] candles` path is taken relative to the config file.
fn resolve_candles_path(
    config_path: &Path,
    config: &dyn ConfigPort,
    flag: Option<&Path>,
) -> Result<PathBuf, SignalforgeError> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => candles_path(config)
            .map(|p| match config_path.parent() {
                Some(dir) => dir.join(p),
                None => PathBuf::from(p),
            })
            .ok_or_else(|| SignalforgeError::ConfigMissing {
                section: "data".into(),
                key: "candles".into(),
            }),
    }
}

fn configured_symbol(config: &dyn ConfigPort) -> Result<String, SignalforgeError> {
    config
        .get_string("analysis", "symbol")
        .or_else(|| config.get_string("symbol", "name"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SignalforgeError::ConfigMissing {
            section: "analysis".into(),
            key: "symbol".into(),
        })
}

fn run_analyze(
    config_path: &Path,
    candles_flag: Option<&Path>,
    timeframe: Option<&str>,
    higher: Option<&Path>,
    lower: Option<&Path>,
) -> Result<Output, SignalforgeError> {
    let market = ConfigMarketAdapter::new(load_config(config_path)?);
    let mut analysis_config = build_analysis_config(market.config())?;
    if let Some(tf) = timeframe {
        analysis_config.timeframe = tf.parse::<Timeframe>()?;
    }
    let primary = analysis_config.timeframe;

    let mut source = CsvAdapter::new().with_file(primary, resolve_candles_path(config_path, market.config(), candles_flag)?);
    for (neighbour, path) in [(primary.higher(), higher), (primary.lower(), lower)] {
        match (neighbour, path) {
            (Some(tf), Some(path)) => source = source.with_file(tf, path),
            (None, Some(path)) => {
                tracing::warn!(%primary, file = %path.display(), "no neighbouring timeframe, ignoring file")
            }
            _ => {}
        }
    }

    let symbol = analysis_config.symbol.clone();
    let candles = source.candles(&symbol, primary)?;
    let mut others: BTreeMap<Timeframe, Vec<Candle>> = BTreeMap::new();
    for tf in source.timeframes().filter(|tf| *tf != primary).collect::<Vec<_>>() {
        others.insert(tf, source.candles(&symbol, tf)?);
    }

    let mut analysis = analyze(&candles, &analysis_config, &others)?;
    if analysis.signal.is_some() {
        let risk = build_risk_config(market.config())?;
        attach_setup(&mut analysis, &market, &risk);
    }
    tracing::info!(
        symbol = %analysis.symbol,
        decision = ?analysis.decision,
        bullish = analysis.bullish_score,
        bearish = analysis.bearish_score,
        "analysis complete"
    );
    Ok(Output::success(serde_json::to_string_pretty(&analysis)?))
}

/// Sizing failures leave the analysis valid and are reported alongside it.
fn attach_setup<C: ConfigPort>(
    analysis: &mut Analysis,
    market: &ConfigMarketAdapter<C>,
    risk: &RiskConfig,
) {
    let result = market.account().and_then(|account| {
        let meta = market.symbol_meta(&analysis.symbol)?;
        analysis.attach_setup(&account, &meta, risk)
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "trade setup unavailable");
        analysis.setup_error = Some(e.to_string());
    }
}

fn run_backtest_command(config_path: &Path, candles_flag: Option<&Path>) -> Result<Output, SignalforgeError> {
    let market = ConfigMarketAdapter::new(load_config(config_path)?);
    let analysis_config = build_analysis_config(market.config())?;
    let risk = build_risk_config(market.config())?;
    let timeframe = analysis_config.timeframe;
    let backtest_config = build_backtest_config(market.config(), analysis_config, risk)?;
    let meta = market.symbol_meta(&backtest_config.analysis.symbol)?;

    let source = CsvAdapter::new().with_file(timeframe, resolve_candles_path(config_path, market.config(), candles_flag)?);
    let candles = source.candles(&meta.name, timeframe)?;

    let mut progress = |pct: u8, message: &str| tracing::info!(progress = pct, "{}", message);
    let report = run_backtest(&candles, &meta, &backtest_config, Some(&mut progress));

    let exit_code = match &report.status {
        RunStatus::Failed(e) => e.exit_code(),
        _ => 0,
    };
    Ok(Output {
        json: serde_json::to_string_pretty(&report)?,
        exit_code,
    })
}

fn run_size(config_path: &Path, request: &SetupRequest) -> Result<Output, SignalforgeError> {
    let market = ConfigMarketAdapter::new(load_config(config_path)?);
    let risk = build_risk_config(market.config())?;
    let symbol = configured_symbol(market.config())?;
    let account = market.account()?;
    let meta = market.symbol_meta(&symbol)?;
    let setup = size_position(request, &account, &meta, &risk)?;
    Ok(Output::success(serde_json::to_string_pretty(&setup)?))
}

fn run_validate(config_path: &Path) -> Result<Output, SignalforgeError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;
    tracing::info!(file = %config_path.display(), "configuration valid");
    let json = serde_json::json!({ "valid": true, "file": config_path.display().to_string() });
    Ok(Output::success(serde_json::to_string_pretty(&json)?))
}
