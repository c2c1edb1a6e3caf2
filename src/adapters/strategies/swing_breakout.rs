//! Coarse-timeframe swing break with ATR-based levels.
//!
//! A swing high (low) is a closed coarse bar whose high (low) exceeds both
//! neighbours. A later coarse close beyond the last swing sets the bias, and
//! the next fine bar emits one signal in that direction: entry at the fine
//! close, stop 1.5 x ATR(14) of the fine bars away, target at 2R.

use chrono::NaiveDateTime;

use crate::domain::bar::Bar;
use crate::domain::position::Direction;
use crate::domain::signal::{Signal, TradeParams};
use crate::domain::timeline::InstrumentData;
use crate::ports::strategy_port::StrategyPort;

use super::{size_by_risk, wilder_atr};

const ATR_PERIOD: usize = 14;
const STOP_ATR: f64 = 1.5;
const REWARD_RISK: f64 = 2.0;

pub struct SwingBreakout {
    contract_size: f64,
    /// Coarse bars with index below this have been folded into the swings.
    processed: usize,
    swing_high: Option<f64>,
    swing_low: Option<f64>,
    bias: Option<Direction>,
    fresh_break: bool,
    atr: Vec<Option<f64>>,
}

impl SwingBreakout {
    pub fn new(contract_size: f64) -> Self {
        SwingBreakout {
            contract_size,
            processed: 0,
            swing_high: None,
            swing_low: None,
            bias: None,
            fresh_break: false,
            atr: Vec::new(),
        }
    }

    pub fn bias(&self) -> Option<Direction> {
        self.bias
    }

    fn on_closed_bar(&mut self, bars: &[Bar], k: usize) {
        let close = bars[k].close;
        if self.swing_high.is_some_and(|high| close > high) {
            self.set_bias(Direction::Long);
            self.swing_high = None;
        } else if self.swing_low.is_some_and(|low| close < low) {
            self.set_bias(Direction::Short);
            self.swing_low = None;
        }

        if k >= 2 {
            let (left, mid, right) = (&bars[k - 2], &bars[k - 1], &bars[k]);
            if mid.high > left.high && mid.high >= right.high {
                self.swing_high = Some(mid.high);
            }
            if mid.low < left.low && mid.low <= right.low {
                self.swing_low = Some(mid.low);
            }
        }
    }

    fn set_bias(&mut self, direction: Direction) {
        self.bias = Some(direction);
        self.fresh_break = true;
    }
}

impl StrategyPort for SwingBreakout {
    fn name(&self) -> &str {
        "swing_breakout"
    }

    fn refresh_context(&mut self, data: &InstrumentData, coarse_index: usize) {
        // The bar at coarse_index is still forming.
        let closed = coarse_index.min(data.coarse.len());
        while self.processed < closed {
            let k = self.processed;
            self.on_closed_bar(&data.coarse, k);
            self.processed += 1;
        }
    }

    fn generate_signal(
        &mut self,
        data: &InstrumentData,
        fine_index: usize,
        price: f64,
        _time: NaiveDateTime,
    ) -> Signal {
        if self.atr.len() != data.fine.len() {
            self.atr = wilder_atr(&data.fine, ATR_PERIOD);
        }
        if !self.fresh_break {
            return Signal::none();
        }
        let (Some(direction), Some(atr)) = (self.bias, self.atr.get(fine_index).copied().flatten())
        else {
            return Signal::none();
        };
        if atr <= 0.0 {
            return Signal::none();
        }

        self.fresh_break = false;
        let risk = STOP_ATR * atr;
        let sign = direction.sign();
        Signal::new(
            direction,
            price,
            price - sign * risk,
            price + sign * risk * REWARD_RISK,
        )
    }

    fn size_trade(&self, signal: &Signal, balance: f64, risk_fraction: f64) -> Option<TradeParams> {
        size_by_risk(signal, balance, risk_fraction, self.contract_size)
    }
}
