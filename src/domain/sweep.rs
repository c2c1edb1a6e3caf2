//! Parallel sweep over periods or seeds.
//!
//! Each variant is a fully independent backtest with its own data, slots,
//! RNG streams and strategy instances, so variants run on the rayon pool
//! without any shared state.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::TradesimError;
use crate::domain::metrics::Report;
use crate::domain::orchestrator::{RunContext, run_backtest};
use crate::ports::data_port::DataPort;
use crate::ports::strategy_port::StrategyPort;

/// One run of a sweep: a date range and a seed.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepVariant {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub seed: u64,
}

impl SweepVariant {
    pub fn label(&self) -> String {
        format!("{}..{} seed={}", self.start_date, self.end_date, self.seed)
    }
}

/// One variant per period, all with the base seed.
pub fn period_variants(base: &BacktestConfig, periods: &[(NaiveDate, NaiveDate)]) -> Vec<SweepVariant> {
    periods
        .iter()
        .map(|&(start_date, end_date)| SweepVariant {
            start_date,
            end_date,
            seed: base.seed,
        })
        .collect()
}

/// One variant per seed over the base period.
pub fn seed_variants(base: &BacktestConfig, seeds: &[u64]) -> Vec<SweepVariant> {
    seeds
        .iter()
        .map(|&seed| SweepVariant {
            start_date: base.start_date,
            end_date: base.end_date,
            seed,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepRun {
    pub variant: SweepVariant,
    pub report: Report,
}

/// A variant that produced no result because its data was unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRun {
    pub variant: SweepVariant,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepSummary {
    pub runs: Vec<SweepRun>,
    pub skipped: Vec<SkippedRun>,
    pub mean_roi_pct: f64,
    pub worst_drawdown_pct: f64,
}

impl SweepSummary {
    fn from_outcomes(outcomes: Vec<Result<SweepRun, SkippedRun>>) -> Self {
        let mut runs = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(run) => runs.push(run),
                Err(skip) => skipped.push(skip),
            }
        }
        let mean_roi_pct = if runs.is_empty() {
            0.0
        } else {
            runs.iter().map(|r| r.report.roi_pct).sum::<f64>() / runs.len() as f64
        };
        let worst_drawdown_pct = runs
            .iter()
            .map(|r| r.report.max_drawdown_pct)
            .fold(0.0_f64, f64::max);
        SweepSummary {
            runs,
            skipped,
            mean_roi_pct,
            worst_drawdown_pct,
        }
    }
}

/// Run every variant in parallel.
///
/// Configuration errors abort the sweep. Data errors only skip the
/// affected variant.
pub fn run_sweep<F>(
    base: &BacktestConfig,
    variants: &[SweepVariant],
    data_port: &(dyn DataPort + Sync),
    make_strategies: F,
) -> Result<SweepSummary, TradesimError>
where
    F: Fn(&BacktestConfig) -> Vec<Box<dyn StrategyPort>> + Sync,
{
    base.validate()?;
    info!(variants = variants.len(), "starting sweep");

    let outcomes = variants
        .par_iter()
        .map(|variant| {
            let mut config = base.with_period(variant.start_date, variant.end_date);
            config.seed = variant.seed;
            let strategies = make_strategies(&config);
            let ctx = RunContext::new(config, strategies);
            match run_backtest(ctx, data_port) {
                Ok(result) => Ok(Ok(SweepRun {
                    variant: variant.clone(),
                    report: Report::compute(&result),
                })),
                Err(err @ (TradesimError::NoData { .. } | TradesimError::DataFeed { .. })) => {
                    warn!(variant = %variant.label(), error = %err, "skipping sweep variant");
                    Ok(Err(SkippedRun {
                        variant: variant.clone(),
                        reason: err.to_string(),
                    }))
                }
                Err(err) => Err(err),
            }
        })
        .collect::<Result<Vec<_>, TradesimError>>()?;

    let summary = SweepSummary::from_outcomes(outcomes);
    info!(
        runs = summary.runs.len(),
        skipped = summary.skipped.len(),
        mean_roi_pct = summary.mean_roi_pct,
        worst_drawdown_pct = summary.worst_drawdown_pct,
        "sweep complete"
    );
    Ok(summary)
}
