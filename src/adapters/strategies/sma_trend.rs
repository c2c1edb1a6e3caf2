//! SMA(5) / SMA(20) crossover on the fine timeframe.

use chrono::NaiveDateTime;

use crate::domain::position::Direction;
use crate::domain::signal::{Signal, TradeParams};
use crate::domain::timeline::InstrumentData;
use crate::ports::strategy_port::StrategyPort;

use super::{size_by_risk, sma};

const FAST: usize = 5;
const SLOW: usize = 20;
const STOP_PCT: f64 = 2.0;
const TARGET_PCT: f64 = 5.0;

pub struct SmaTrend {
    contract_size: f64,
    fast: Vec<Option<f64>>,
    slow: Vec<Option<f64>>,
}

impl SmaTrend {
    pub fn new(contract_size: f64) -> Self {
        SmaTrend {
            contract_size,
            fast: Vec::new(),
            slow: Vec::new(),
        }
    }

    fn ensure_series(&mut self, data: &InstrumentData) {
        if self.slow.len() != data.fine.len() {
            self.fast = sma(&data.fine, FAST);
            self.slow = sma(&data.fine, SLOW);
        }
    }

    fn spread_at(&self, i: usize) -> Option<f64> {
        Some(self.fast.get(i).copied().flatten()? - self.slow.get(i).copied().flatten()?)
    }
}

impl StrategyPort for SmaTrend {
    fn name(&self) -> &str {
        "sma_trend"
    }

    fn refresh_context(&mut self, _data: &InstrumentData, _coarse_index: usize) {}

    fn generate_signal(
        &mut self,
        data: &InstrumentData,
        fine_index: usize,
        price: f64,
        _time: NaiveDateTime,
    ) -> Signal {
        self.ensure_series(data);
        let Some(prev_index) = fine_index.checked_sub(1) else {
            return Signal::none();
        };
        let (Some(prev), Some(now)) = (self.spread_at(prev_index), self.spread_at(fine_index)) else {
            return Signal::none();
        };

        let direction = if prev <= 0.0 && now > 0.0 {
            Direction::Long
        } else if prev >= 0.0 && now < 0.0 {
            Direction::Short
        } else {
            return Signal::none();
        };

        let sign = direction.sign();
        let stop = price * (1.0 - sign * STOP_PCT / 100.0);
        let target = price * (1.0 + sign * TARGET_PCT / 100.0);
        Signal::new(direction, price, stop, target)
    }

    fn size_trade(&self, signal: &Signal, balance: f64, risk_fraction: f64) -> Option<TradeParams> {
        size_by_risk(signal, balance, risk_fraction, self.contract_size)
    }
}
