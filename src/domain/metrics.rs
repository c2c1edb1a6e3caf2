//! Ledger statistics for a finished run.

use chrono::Datelike;
use std::collections::BTreeMap;

use super::orchestrator::BacktestResult;
use super::position::ClosedTrade;

/// Trading days per year used to annualize the per-trade Sharpe ratio.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Win/loss statistics over a set of closed trades.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with positive P&L.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean P&L per trade.
    pub avg_trade: f64,
    /// Annualized Sharpe of per-trade returns on the initial balance.
    pub sharpe_ratio: f64,
    /// Sum of winning P&L.
    pub gross_profit: f64,
}

impl TradeStats {
    pub fn compute<'a, I>(trades: I, initial_balance: f64) -> Self
    where
        I: IntoIterator<Item = &'a ClosedTrade>,
    {
        let mut returns = Vec::new();
        let mut total_trades = 0usize;
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            total_trades += 1;
            let pnl = trade.pnl;
            if initial_balance > 0.0 {
                returns.push(pnl / initial_balance);
            }
            if pnl > 0.0 {
                wins += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                losses += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let total_pnl = total_wins - total_losses;
        TradeStats {
            total_trades,
            wins,
            losses,
            win_rate,
            total_pnl,
            profit_factor,
            avg_win: if wins > 0 { total_wins / wins as f64 } else { 0.0 },
            avg_loss: if losses > 0 {
                total_losses / losses as f64
            } else {
                0.0
            },
            largest_win,
            largest_loss,
            avg_trade: if total_trades > 0 {
                total_pnl / total_trades as f64
            } else {
                0.0
            },
            sharpe_ratio: sharpe(&returns),
            gross_profit: total_wins,
        }
    }
}

/// Mean over sample standard deviation, scaled by `sqrt(252)`. Zero when
/// fewer than two returns exist or they do not vary.
fn sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();
    if std <= f64::EPSILON {
        return 0.0;
    }
    mean / std * TRADING_DAYS_PER_YEAR.sqrt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentResult {
    pub instrument: String,
    pub stats: TradeStats,
    /// Share of the portfolio's gross profit earned by this instrument.
    pub profit_contribution_pct: f64,
}

/// Realized P&L of trades closed in one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPnl {
    pub year: i32,
    pub month: u32,
    pub pnl: f64,
    /// `pnl` as a percent of the initial balance.
    pub return_pct: f64,
}

impl MonthlyPnl {
    /// Grouped by exit month, oldest first.
    pub fn group(trades: &[ClosedTrade], initial_balance: f64) -> Vec<MonthlyPnl> {
        let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for trade in trades {
            let key = (trade.exit_time.year(), trade.exit_time.month());
            *months.entry(key).or_insert(0.0) += trade.pnl;
        }
        months
            .into_iter()
            .map(|((year, month), pnl)| MonthlyPnl {
                year,
                month,
                pnl,
                return_pct: if initial_balance > 0.0 {
                    pnl / initial_balance * 100.0
                } else {
                    0.0
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub stats: TradeStats,
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Percent return on the initial balance.
    pub roi_pct: f64,
    pub max_drawdown_pct: f64,
    pub per_instrument: Vec<InstrumentResult>,
    pub monthly: Vec<MonthlyPnl>,
}

impl Report {
    pub fn compute(result: &BacktestResult) -> Self {
        let balance = result.initial_balance;
        let stats = TradeStats::compute(&result.trades, balance);
        let per_instrument = result
            .instruments
            .iter()
            .map(|id| {
                let inst = TradeStats::compute(
                    result.trades.iter().filter(|t| &t.instrument == id),
                    balance,
                );
                let profit_contribution_pct = if stats.gross_profit > 0.0 {
                    inst.gross_profit / stats.gross_profit * 100.0
                } else {
                    0.0
                };
                InstrumentResult {
                    instrument: id.clone(),
                    stats: inst,
                    profit_contribution_pct,
                }
            })
            .collect();

        Report {
            stats,
            initial_balance: balance,
            final_balance: result.final_balance,
            roi_pct: result.roi_pct(),
            max_drawdown_pct: result.max_drawdown_pct,
            per_instrument,
            monthly: MonthlyPnl::group(&result.trades, balance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Direction, ExitReason};
    use chrono::{NaiveDate, NaiveDateTime};

    fn time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_trade(instrument: &str, pnl: f64) -> ClosedTrade {
        closed_at(instrument, pnl, time())
    }

    fn closed_at(instrument: &str, pnl: f64, exit_time: NaiveDateTime) -> ClosedTrade {
        ClosedTrade {
            instrument: instrument.into(),
            direction: Direction::Long,
            entry_time: exit_time,
            exit_time,
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            stop: 90.0,
            target: 120.0,
            size: 1.0,
            commission: 0.0,
            pnl,
            exit_reason: if pnl > 0.0 {
                ExitReason::TakeProfit
            } else {
                ExitReason::StopLoss
            },
            balance: 0.0,
        }
    }

    fn make_result(trades: Vec<ClosedTrade>) -> BacktestResult {
        let initial = 1000.0;
        let final_balance = initial + trades.iter().map(|t| t.pnl).sum::<f64>();
        BacktestResult {
            instruments: vec!["XAUUSD".into(), "EURUSD".into()],
            start_date: time().date(),
            end_date: time().date(),
            seed: 1,
            initial_balance: initial,
            final_balance,
            final_equity: final_balance,
            peak_balance: final_balance.max(initial),
            max_drawdown_pct: 5.0,
            trades,
            equity_curve: vec![],
        }
    }

    #[test]
    fn empty_ledger() {
        let report = Report::compute(&make_result(vec![]));
        assert_eq!(report.stats.total_trades, 0);
        assert!((report.stats.win_rate - 0.0).abs() < f64::EPSILON);
        assert!((report.stats.profit_factor - 0.0).abs() < f64::EPSILON);
        assert!((report.roi_pct - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wins_losses_and_rate() {
        let report = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 100.0),
            make_trade("XAUUSD", -50.0),
            make_trade("EURUSD", 200.0),
            make_trade("EURUSD", 0.0),
        ]));
        assert_eq!(report.stats.total_trades, 4);
        assert_eq!(report.stats.wins, 2);
        assert_eq!(report.stats.losses, 1);
        assert!((report.stats.win_rate - 50.0).abs() < 1e-9);
        assert!((report.stats.total_pnl - 250.0).abs() < 1e-9);
        assert!((report.roi_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_and_averages() {
        let report = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 100.0),
            make_trade("XAUUSD", -60.0),
            make_trade("EURUSD", 200.0),
            make_trade("EURUSD", -40.0),
        ]));
        assert!((report.stats.profit_factor - 3.0).abs() < 1e-9);
        assert!((report.stats.avg_win - 150.0).abs() < 1e-9);
        assert!((report.stats.avg_loss - 50.0).abs() < 1e-9);
        assert!((report.stats.largest_win - 200.0).abs() < 1e-9);
        assert!((report.stats.largest_loss - 60.0).abs() < 1e-9);
    }

    #[test]
    fn only_wins_gives_infinite_profit_factor() {
        let report = Report::compute(&make_result(vec![make_trade("XAUUSD", 10.0)]));
        assert!(report.stats.profit_factor.is_infinite());
    }

    #[test]
    fn per_instrument_breakdown() {
        let report = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 100.0),
            make_trade("EURUSD", -30.0),
            make_trade("EURUSD", -20.0),
        ]));
        assert_eq!(report.per_instrument.len(), 2);
        let gold = &report.per_instrument[0];
        assert_eq!(gold.instrument, "XAUUSD");
        assert_eq!(gold.stats.wins, 1);
        let eur = &report.per_instrument[1];
        assert_eq!(eur.stats.losses, 2);
        assert!((eur.stats.total_pnl + 50.0).abs() < 1e-9);
    }

    #[test]
    fn avg_trade_is_mean_pnl() {
        let report = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 100.0),
            make_trade("XAUUSD", -40.0),
            make_trade("EURUSD", 0.0),
        ]));
        assert!((report.stats.avg_trade - 20.0).abs() < 1e-9);
    }

    #[test]
    fn sharpe_uses_sample_deviation_of_trade_returns() {
        // returns 0.1 and -0.05 on 1000: mean 0.025, sample std 0.075 * sqrt(2)
        let report = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 100.0),
            make_trade("XAUUSD", -50.0),
        ]));
        let expected = 0.025 / (0.075 * 2.0_f64.sqrt()) * 252.0_f64.sqrt();
        assert!((report.stats.sharpe_ratio - expected).abs() < 1e-9);
    }

    #[test]
    fn sharpe_is_zero_without_variation() {
        let single = Report::compute(&make_result(vec![make_trade("XAUUSD", 100.0)]));
        assert_eq!(single.stats.sharpe_ratio, 0.0);
        let flat = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 30.0),
            make_trade("EURUSD", 30.0),
        ]));
        assert_eq!(flat.stats.sharpe_ratio, 0.0);
    }

    #[test]
    fn contribution_splits_gross_profit() {
        let report = Report::compute(&make_result(vec![
            make_trade("XAUUSD", 300.0),
            make_trade("XAUUSD", -200.0),
            make_trade("EURUSD", 100.0),
        ]));
        assert!((report.per_instrument[0].profit_contribution_pct - 75.0).abs() < 1e-9);
        assert!((report.per_instrument[1].profit_contribution_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn contribution_is_zero_without_profit() {
        let report = Report::compute(&make_result(vec![make_trade("XAUUSD", -10.0)]));
        assert!(
            report
                .per_instrument
                .iter()
                .all(|r| r.profit_contribution_pct == 0.0)
        );
    }

    #[test]
    fn monthly_groups_by_exit_month() {
        let at = |m: u32, d: u32| {
            NaiveDate::from_ymd_opt(2024, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        };
        let report = Report::compute(&make_result(vec![
            closed_at("XAUUSD", 50.0, at(2, 3)),
            closed_at("XAUUSD", 100.0, at(1, 5)),
            closed_at("EURUSD", -30.0, at(1, 31)),
        ]));
        assert_eq!(report.monthly.len(), 2);
        let jan = &report.monthly[0];
        assert_eq!((jan.year, jan.month), (2024, 1));
        assert!((jan.pnl - 70.0).abs() < 1e-9);
        assert!((jan.return_pct - 7.0).abs() < 1e-9);
        let feb = &report.monthly[1];
        assert_eq!((feb.year, feb.month), (2024, 2));
        assert!((feb.pnl - 50.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_passes_through() {
        let report = Report::compute(&make_result(vec![]));
        assert!((report.max_drawdown_pct - 5.0).abs() < f64::EPSILON);
    }
}
