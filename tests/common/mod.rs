#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::collections::HashMap;
pub use tradesim::domain::bar::{Bar, Timeframe};
use tradesim::domain::backtest::{BacktestConfig, ExitMode, InstrumentConfig};
use tradesim::domain::cost::CostParameters;
use tradesim::domain::error::TradesimError;
use tradesim::domain::position::Direction;
use tradesim::domain::signal::{Signal, TradeParams};
use tradesim::domain::strategy::StrategyKind;
use tradesim::domain::timeline::{InstrumentData, ReferenceMode};
use tradesim::ports::data_port::DataPort;
use tradesim::ports::strategy_port::StrategyPort;

/// In-memory bars keyed by instrument and timeframe.
pub struct MockDataPort {
    pub data: HashMap<(String, Timeframe), Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.data.insert((instrument.to_string(), timeframe), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, TradesimError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(TradesimError::DataFeed {
                reason: reason.clone(),
            });
        }
        let bars: Vec<Bar> = self
            .data
            .get(&(instrument.to_string(), timeframe))
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.time.date() >= start && b.time.date() <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(TradesimError::NoData {
                instrument: instrument.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(bars)
    }
}

/// Emits preset signals at chosen fine indices and sizes at a fixed lot.
pub struct ScriptedStrategy {
    pub signals: HashMap<usize, Signal>,
    pub size: f64,
}

impl ScriptedStrategy {
    pub fn new(size: f64) -> Self {
        Self {
            signals: HashMap::new(),
            size,
        }
    }

    pub fn at(mut self, fine_index: usize, signal: Signal) -> Self {
        self.signals.insert(fine_index, signal);
        self
    }

    pub fn boxed(self) -> Box<dyn StrategyPort> {
        Box::new(self)
    }
}

impl StrategyPort for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn refresh_context(&mut self, _data: &InstrumentData, _coarse_index: usize) {}

    fn generate_signal(
        &mut self,
        _data: &InstrumentData,
        fine_index: usize,
        _price: f64,
        _time: NaiveDateTime,
    ) -> Signal {
        self.signals
            .remove(&fine_index)
            .unwrap_or_else(Signal::none)
    }

    fn size_trade(&self, signal: &Signal, _balance: f64, _risk: f64) -> Option<TradeParams> {
        Some(TradeParams {
            size: self.size,
            entry: signal.entry,
            stop: signal.stop,
            target: signal.target,
        })
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

pub fn t(minute: i64) -> NaiveDateTime {
    day().and_hms_opt(0, 0, 0).unwrap() + TimeDelta::minutes(minute)
}

pub fn make_bar(minute: i64, close: f64) -> Bar {
    Bar {
        time: t(minute),
        open: close,
        high: close,
        low: close,
        close,
    }
}

/// Fine bars every `step` minutes, one per close.
pub fn fine_bars(closes: &[f64], step: i64) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64 * step, c))
        .collect()
}

/// Hourly bars at a constant price.
pub fn coarse_bars(hours: i64, price: f64) -> Vec<Bar> {
    (0..hours).map(|h| make_bar(60 * h, price)).collect()
}

/// Deterministic zig-zag path for longer runs.
pub fn generate_bars(count: usize, start: f64, step: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let wave = ((i % 12) as f64 - 6.0).abs();
            let close = start + wave * 2.0 + (i / 12) as f64;
            Bar {
                time: t(i as i64 * step),
                open: close - 0.5,
                high: close + 1.5,
                low: close - 1.5,
                close,
            }
        })
        .collect()
}

pub fn long_2000() -> Signal {
    Signal::new(Direction::Long, 2000.0, 1990.0, 2020.0)
}

pub fn gold(risk_pct: f64) -> InstrumentConfig {
    instrument("XAUUSD", risk_pct)
}

pub fn instrument(id: &str, risk_pct: f64) -> InstrumentConfig {
    InstrumentConfig {
        instrument: id.to_string(),
        strategy: StrategyKind::SmaTrend,
        costs: CostParameters {
            leverage: 100.0,
            contract_size: 100.0,
            ..CostParameters::default()
        },
        risk_pct,
    }
}

pub fn config(instruments: Vec<InstrumentConfig>) -> BacktestConfig {
    BacktestConfig {
        initial_balance: 10_000.0,
        max_total_risk: 1.25,
        start_date: day(),
        end_date: day(),
        instruments,
        fine_timeframe: Timeframe::M15,
        coarse_timeframe: Timeframe::H1,
        reference: ReferenceMode::Union,
        min_coarse_bars: 0,
        min_fine_bars: 0,
        exit_mode: ExitMode::Close,
        seed: 42,
        data_dir: "data".to_string(),
    }
}
