//! Report generation port trait.

use crate::domain::error::TradesimError;
use crate::domain::metrics::Report;
use crate::domain::orchestrator::BacktestResult;
use crate::domain::sweep::SweepSummary;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        report: &Report,
        output_dir: &str,
    ) -> Result<(), TradesimError>;

    fn write_sweep(&self, summary: &SweepSummary, output_dir: &str) -> Result<(), TradesimError>;
}
