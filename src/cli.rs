//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::{CsvReportAdapter, format_summary, format_sweep_summary};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::strategies::build_strategies;
use crate::domain::backtest::BacktestConfig;
use crate::domain::config_validation::{SWEEP, parse_periods};
use crate::domain::error::TradesimError;
use crate::domain::metrics::Report;
use crate::domain::orchestrator::{RunContext, load_instrument_data, run_backtest};
use crate::domain::strategy::StrategyKind;
use crate::domain::sweep::{period_variants, run_sweep, seed_variants};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Multi-instrument backtest and portfolio risk simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Override the slippage seed from the config
        #[arg(long)]
        seed: Option<u64>,
        /// Validate config and load data without simulating
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one backtest per [sweep] period, or per seed, in parallel
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Comma-separated seeds; sweeps seeds instead of periods
        #[arg(long, value_delimiter = ',')]
        seeds: Option<Vec<u64>>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available strategies
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            seed,
            dry_run,
        } => run_single(&config, &output, seed, dry_run),
        Command::Sweep {
            config,
            output,
            seeds,
        } => run_sweep_command(&config, &output, seeds),
        Command::Validate { config } => run_validate(&config),
        Command::Strategies => run_strategies(),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: TradesimError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// Relative `data_dir` values resolve against the config file's directory.
fn data_dir(config_path: &Path, config: &BacktestConfig) -> PathBuf {
    let dir = PathBuf::from(&config.data_dir);
    if dir.is_absolute() {
        return dir;
    }
    config_path
        .parent()
        .map(|parent| parent.join(&dir))
        .unwrap_or(dir)
}

fn load_backtest_config(path: &Path) -> Result<(FileConfigAdapter, BacktestConfig), ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    let config = BacktestConfig::from_config(&adapter).map_err(fail)?;
    Ok((adapter, config))
}

fn run_single(config_path: &Path, output: &Path, seed: Option<u64>, dry_run: bool) -> ExitCode {
    let (_, config) = match load_backtest_config(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(data_dir(config_path, &config));

    if dry_run {
        return match load_instrument_data(&config, &data_port) {
            Ok(data) => {
                for d in &data {
                    eprintln!(
                        "{}: {} fine bars, {} coarse bars",
                        d.instrument,
                        d.fine.len(),
                        d.coarse.len()
                    );
                }
                eprintln!("Dry run OK");
                ExitCode::SUCCESS
            }
            Err(err) => fail(err),
        };
    }

    let strategies = build_strategies(&config);
    let mut ctx = RunContext::new(config, strategies);
    if let Some(seed) = seed {
        ctx = ctx.with_seed(seed);
    }

    eprintln!(
        "Running backtest on {} instrument(s)...",
        ctx.config.instruments.len()
    );
    let result = match run_backtest(ctx, &data_port) {
        Ok(result) => result,
        Err(err) => return fail(err),
    };
    let report = Report::compute(&result);
    eprint!("{}", format_summary(&result, &report));

    let output_dir = output.display().to_string();
    if let Err(err) = CsvReportAdapter::new().write(&result, &report, &output_dir) {
        return fail(err);
    }
    eprintln!("Reports written to {output_dir}");
    ExitCode::SUCCESS
}

fn run_sweep_command(config_path: &Path, output: &Path, seeds: Option<Vec<u64>>) -> ExitCode {
    let (adapter, config) = match load_backtest_config(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let variants = match seeds {
        Some(seeds) if !seeds.is_empty() => seed_variants(&config, &seeds),
        _ => match adapter.get_string(SWEEP, "periods") {
            Some(raw) => match parse_periods(&raw) {
                Ok(periods) => period_variants(&config, &periods),
                Err(err) => return fail(err),
            },
            None => {
                return fail(TradesimError::missing(SWEEP, "periods"));
            }
        },
    };

    eprintln!("Running {} sweep variant(s)...", variants.len());
    let data_port = CsvAdapter::new(data_dir(config_path, &config));
    let summary = match run_sweep(&config, &variants, &data_port, build_strategies) {
        Ok(summary) => summary,
        Err(err) => return fail(err),
    };
    eprint!("{}", format_sweep_summary(&summary));

    let output_dir = output.display().to_string();
    if let Err(err) = CsvReportAdapter::new().write_sweep(&summary, &output_dir) {
        return fail(err);
    }
    eprintln!("Sweep reports written to {output_dir}");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    match load_backtest_config(config_path) {
        Ok((_, config)) => {
            eprintln!(
                "Config OK: {} instrument(s), {} .. {}",
                config.instruments.len(),
                config.start_date,
                config.end_date
            );
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_strategies() -> ExitCode {
    for kind in StrategyKind::ALL {
        println!("{:<16} {}", kind.id(), kind.description());
    }
    ExitCode::SUCCESS
}
