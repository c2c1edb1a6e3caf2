//! Shared account state, equity curve and the portfolio risk budget.

use chrono::NaiveDateTime;

use super::position::ClosedTrade;

#[derive(Debug, Clone, PartialEq)]
pub struct EquitySample {
    pub time: NaiveDateTime,
    pub balance: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub initial_balance: f64,
    pub balance: f64,
    pub equity: f64,
    pub peak_balance: f64,
    pub max_drawdown_pct: f64,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquitySample>,
}

impl PortfolioState {
    pub fn new(initial_balance: f64) -> Self {
        PortfolioState {
            initial_balance,
            balance: initial_balance,
            equity: initial_balance,
            peak_balance: initial_balance,
            max_drawdown_pct: 0.0,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    /// Fold a closed trade into the balance and append it to the ledger,
    /// stamped with the resulting balance.
    pub fn record_trade(&mut self, mut trade: ClosedTrade) {
        self.balance += trade.pnl;
        trade.balance = self.balance;
        self.trades.push(trade);
    }

    /// Mark the account at `time` with the summed floating P&L of all open
    /// positions. A repeated timestamp replaces the previous sample.
    pub fn mark(&mut self, time: NaiveDateTime, floating: f64) {
        self.equity = self.balance + floating;

        let sample = EquitySample {
            time,
            balance: self.balance,
            equity: self.equity,
        };
        match self.equity_curve.last_mut() {
            Some(last) if last.time == time => *last = sample,
            _ => self.equity_curve.push(sample),
        }

        self.peak_balance = self.peak_balance.max(self.equity);
        self.max_drawdown_pct = self.max_drawdown_pct.max(self.drawdown_pct());
    }

    /// Current drawdown from peak, in percent, clamped to [0, 100].
    pub fn drawdown_pct(&self) -> f64 {
        if self.peak_balance <= 0.0 {
            return 0.0;
        }
        ((self.peak_balance - self.equity) / self.peak_balance * 100.0).clamp(0.0, 100.0)
    }

    pub fn total_pnl(&self) -> f64 {
        self.balance - self.initial_balance
    }
}

/// Portfolio-wide cap on the summed risk fractions (percent) of open
/// positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBudget {
    pub max_total: f64,
}

impl RiskBudget {
    const TOLERANCE: f64 = 1e-9;

    pub fn new(max_total: f64) -> Self {
        RiskBudget { max_total }
    }

    /// Sum of the risk fractions whose slot currently holds a position.
    pub fn current<I>(open_fractions: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        open_fractions.into_iter().sum()
    }

    pub fn admits(&self, current: f64, fraction: f64) -> bool {
        current + fraction <= self.max_total + Self::TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Direction, ExitReason};
    use chrono::{NaiveDate, TimeDelta};

    fn t(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::minutes(minute)
    }

    fn trade(pnl: f64) -> ClosedTrade {
        ClosedTrade {
            instrument: "XAUUSD".into(),
            direction: Direction::Long,
            entry_time: t(0),
            exit_time: t(15),
            entry_price: 2000.0,
            exit_price: 2000.0 + pnl / 10.0,
            stop: 1990.0,
            target: 2020.0,
            size: 0.1,
            commission: 0.0,
            pnl,
            exit_reason: ExitReason::TakeProfit,
            balance: 0.0,
        }
    }

    #[test]
    fn new_state() {
        let state = PortfolioState::new(1000.0);
        assert!((state.balance - 1000.0).abs() < f64::EPSILON);
        assert!((state.peak_balance - 1000.0).abs() < f64::EPSILON);
        assert!(state.trades.is_empty());
        assert!(state.equity_curve.is_empty());
    }

    #[test]
    fn record_trade_stamps_balance() {
        let mut state = PortfolioState::new(1000.0);
        state.record_trade(trade(200.0));
        state.record_trade(trade(-50.0));
        assert!((state.balance - 1150.0).abs() < f64::EPSILON);
        assert!((state.trades[0].balance - 1200.0).abs() < f64::EPSILON);
        assert!((state.trades[1].balance - 1150.0).abs() < f64::EPSILON);
        assert!((state.total_pnl() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_timestamp_replaces_sample() {
        let mut state = PortfolioState::new(1000.0);
        state.mark(t(0), 10.0);
        state.mark(t(0), -20.0);
        assert_eq!(state.equity_curve.len(), 1);
        assert!((state.equity_curve[0].equity - 980.0).abs() < f64::EPSILON);
        state.mark(t(15), 0.0);
        assert_eq!(state.equity_curve.len(), 2);
    }

    #[test]
    fn drawdown_tracks_running_max() {
        let mut state = PortfolioState::new(1000.0);
        state.mark(t(0), 0.0);
        state.mark(t(15), -100.0);
        assert!((state.max_drawdown_pct - 10.0).abs() < 1e-9);
        state.mark(t(30), 500.0);
        assert!((state.peak_balance - 1500.0).abs() < f64::EPSILON);
        state.mark(t(45), 200.0);
        assert!((state.drawdown_pct() - 20.0).abs() < 1e-9);
        assert!((state.max_drawdown_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_clamped_when_equity_negative() {
        let mut state = PortfolioState::new(100.0);
        state.mark(t(0), -250.0);
        assert!((state.drawdown_pct() - 100.0).abs() < f64::EPSILON);
        assert!((state.max_drawdown_pct - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn risk_budget_rejects_overflow() {
        let budget = RiskBudget::new(1.25);
        assert!(budget.admits(0.0, 0.75));
        assert!(!budget.admits(0.75, 0.75));
        assert!(budget.admits(0.75, 0.5));
        assert!((RiskBudget::current([0.5, 0.25]) - 0.75).abs() < f64::EPSILON);
    }
}
