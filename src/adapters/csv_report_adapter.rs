//! CSV and plain-text report adapter implementing ReportPort.
//!
//! Writes `trades.csv`, `equity.csv` and `summary.txt` for a single run, and
//! `sweep.csv` plus `sweep_summary.txt` for a sweep.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::domain::error::TradesimError;
use crate::domain::metrics::{InstrumentResult, Report};
use crate::domain::orchestrator::BacktestResult;
use crate::domain::sweep::SweepSummary;
use crate::ports::report_port::ReportPort;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn csv_err(path: &Path, e: csv::Error) -> TradesimError {
    TradesimError::Io(std::io::Error::other(format!("{}: {}", path.display(), e)))
}

fn write_trades(result: &BacktestResult, path: &Path) -> Result<(), TradesimError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    wtr.write_record([
        "entry_time",
        "exit_time",
        "instrument",
        "direction",
        "entry_price",
        "exit_price",
        "stop",
        "target",
        "size",
        "pnl",
        "exit_reason",
        "balance",
    ])
    .map_err(|e| csv_err(path, e))?;

    for trade in &result.trades {
        wtr.write_record([
            trade.entry_time.format(TIME_FORMAT).to_string(),
            trade.exit_time.format(TIME_FORMAT).to_string(),
            trade.instrument.clone(),
            trade.direction.to_string(),
            format!("{:.5}", trade.entry_price),
            format!("{:.5}", trade.exit_price),
            format!("{:.5}", trade.stop),
            format!("{:.5}", trade.target),
            format!("{:.2}", trade.size),
            format!("{:.2}", trade.pnl),
            trade.exit_reason.to_string(),
            format!("{:.2}", trade.balance),
        ])
        .map_err(|e| csv_err(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_equity(result: &BacktestResult, path: &Path) -> Result<(), TradesimError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    wtr.write_record(["time", "balance", "equity"])
        .map_err(|e| csv_err(path, e))?;
    for sample in &result.equity_curve {
        wtr.write_record([
            sample.time.format(TIME_FORMAT).to_string(),
            format!("{:.2}", sample.balance),
            format!("{:.2}", sample.equity),
        ])
        .map_err(|e| csv_err(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

fn instrument_row(out: &mut String, row: &InstrumentResult) {
    let stats = &row.stats;
    let _ = writeln!(
        out,
        "{:<10} {:>7} {:>6} {:>6} {:>8.1}% {:>12.2} {:>8} {:>8.1}%",
        row.instrument,
        stats.total_trades,
        stats.wins,
        stats.losses,
        stats.win_rate,
        stats.total_pnl,
        format_factor(stats.profit_factor),
        row.profit_contribution_pct,
    );
}

fn format_factor(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{value:.2}")
    }
}

/// Headline statistics and the per-instrument table as plain text.
pub fn format_summary(result: &BacktestResult, report: &Report) -> String {
    let stats = &report.stats;
    let mut out = String::new();
    let _ = writeln!(out, "Backtest {} .. {}", result.start_date, result.end_date);
    let _ = writeln!(out, "Instruments:     {}", result.instruments.join(", "));
    let _ = writeln!(out, "Seed:            {}", result.seed);
    let _ = writeln!(out);
    let _ = writeln!(out, "Initial balance: {:.2}", report.initial_balance);
    let _ = writeln!(out, "Final balance:   {:.2}", report.final_balance);
    let _ = writeln!(out, "Total P&L:       {:.2}", result.total_pnl());
    let _ = writeln!(out, "ROI:             {:.2}%", report.roi_pct);
    let _ = writeln!(out, "Max drawdown:    {:.2}%", report.max_drawdown_pct);
    let _ = writeln!(out, "Trades:          {}", stats.total_trades);
    let _ = writeln!(out, "Wins / losses:   {} / {}", stats.wins, stats.losses);
    let _ = writeln!(out, "Win rate:        {:.1}%", stats.win_rate);
    let _ = writeln!(out, "Profit factor:   {}", format_factor(stats.profit_factor));
    let _ = writeln!(out, "Avg trade:       {:.2}", stats.avg_trade);
    let _ = writeln!(out, "Sharpe ratio:    {:.2}", stats.sharpe_ratio);
    let _ = writeln!(out, "Avg win / loss:  {:.2} / {:.2}", stats.avg_win, stats.avg_loss);
    let _ = writeln!(
        out,
        "Largest win / loss: {:.2} / {:.2}",
        stats.largest_win, stats.largest_loss
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<10} {:>7} {:>6} {:>6} {:>9} {:>12} {:>8} {:>9}",
        "instrument", "trades", "wins", "losses", "win rate", "pnl", "pf", "contrib"
    );
    for row in &report.per_instrument {
        instrument_row(&mut out, row);
    }
    if !report.monthly.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<8} {:>12} {:>9}", "month", "pnl", "return");
        for month in &report.monthly {
            let _ = writeln!(
                out,
                "{:04}-{:02} {:>12.2} {:>8.2}%",
                month.year, month.month, month.pnl, month.return_pct
            );
        }
    }
    out
}

pub fn format_sweep_summary(summary: &SweepSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36} {:>7} {:>10} {:>10}",
        "run", "trades", "roi %", "max dd %"
    );
    for run in &summary.runs {
        let _ = writeln!(
            out,
            "{:<36} {:>7} {:>10.2} {:>10.2}",
            run.variant.label(),
            run.report.stats.total_trades,
            run.report.roi_pct,
            run.report.max_drawdown_pct
        );
    }
    for skip in &summary.skipped {
        let _ = writeln!(out, "{:<36} skipped: {}", skip.variant.label(), skip.reason);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Mean ROI:       {:.2}%", summary.mean_roi_pct);
    let _ = writeln!(out, "Worst drawdown: {:.2}%", summary.worst_drawdown_pct);
    out
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        report: &Report,
        output_dir: &str,
    ) -> Result<(), TradesimError> {
        let dir = Path::new(output_dir);
        fs::create_dir_all(dir)?;
        write_trades(result, &dir.join("trades.csv"))?;
        write_equity(result, &dir.join("equity.csv"))?;
        fs::write(dir.join("summary.txt"), format_summary(result, report))?;
        Ok(())
    }

    fn write_sweep(&self, summary: &SweepSummary, output_dir: &str) -> Result<(), TradesimError> {
        let dir = Path::new(output_dir);
        fs::create_dir_all(dir)?;
        let path = dir.join("sweep.csv");
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| csv_err(&path, e))?;
        wtr.write_record([
            "start_date",
            "end_date",
            "seed",
            "trades",
            "win_rate",
            "roi_pct",
            "max_drawdown_pct",
            "final_balance",
        ])
        .map_err(|e| csv_err(&path, e))?;
        for run in &summary.runs {
            wtr.write_record([
                run.variant.start_date.to_string(),
                run.variant.end_date.to_string(),
                run.variant.seed.to_string(),
                run.report.stats.total_trades.to_string(),
                format!("{:.2}", run.report.stats.win_rate),
                format!("{:.2}", run.report.roi_pct),
                format!("{:.2}", run.report.max_drawdown_pct),
                format!("{:.2}", run.report.final_balance),
            ])
            .map_err(|e| csv_err(&path, e))?;
        }
        wtr.flush()?;
        fs::write(dir.join("sweep_summary.txt"), format_sweep_summary(summary))?;
        Ok(())
    }
}
