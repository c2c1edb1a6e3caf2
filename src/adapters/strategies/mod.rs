//! Reference strategies and the registry that builds them from config.

pub mod sma_trend;
pub mod swing_breakout;

use crate::domain::backtest::BacktestConfig;
use crate::domain::bar::Bar;
use crate::domain::signal::{Signal, TradeParams, risk_sized_lots};
use crate::domain::strategy::StrategyKind;
use crate::ports::strategy_port::StrategyPort;

pub use sma_trend::SmaTrend;
pub use swing_breakout::SwingBreakout;

pub fn build_strategy(kind: StrategyKind, contract_size: f64) -> Box<dyn StrategyPort> {
    match kind {
        StrategyKind::SwingBreakout => Box::new(SwingBreakout::new(contract_size)),
        StrategyKind::SmaTrend => Box::new(SmaTrend::new(contract_size)),
    }
}

/// One fresh strategy per configured instrument, in configuration order.
pub fn build_strategies(config: &BacktestConfig) -> Vec<Box<dyn StrategyPort>> {
    config
        .instruments
        .iter()
        .map(|inst| build_strategy(inst.strategy, inst.costs.contract_size))
        .collect()
}

/// Fixed-fractional sizing shared by the reference strategies.
pub(crate) fn size_by_risk(
    signal: &Signal,
    balance: f64,
    risk_fraction: f64,
    contract_size: f64,
) -> Option<TradeParams> {
    let size = risk_sized_lots(balance, risk_fraction, signal.entry, signal.stop, contract_size)?;
    Some(TradeParams {
        size,
        entry: signal.entry,
        stop: signal.stop,
        target: signal.target,
    })
}

/// Wilder-smoothed average true range. `None` until `period` bars exist.
pub(crate) fn wilder_atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }
    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut atr = tr[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(atr);
    for i in period..bars.len() {
        atr = (atr * (period - 1) as f64 + tr[i]) / period as f64;
        out[i] = Some(atr);
    }
    out
}

/// Simple moving average of closes. `None` until `period` bars exist.
pub(crate) fn sma(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        sum += bar.close;
        if i >= period {
            sum -= bars[i - period].close;
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::bar::Bar;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    pub fn t(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + TimeDelta::minutes(minute)
    }

    pub fn bar(minute: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time: t(minute),
            open: close,
            high,
            low,
            close,
        }
    }

    pub fn flat_bars(closes: &[f64], step: i64) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(i as i64 * step, c + 1.0, c - 1.0, c))
            .collect()
    }
}
