//! Per-instrument position lifecycle.
//!
//! A [`PositionSlot`] holds at most one open position for its instrument and
//! owns the seeded RNG used for that instrument's slippage draws. Every
//! outcome (rejected entry, no exit, exit) is a return value.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;

use super::bar::Bar;
use super::cost::CostParameters;
use super::position::{ClosedTrade, ExitReason, Position};
use super::signal::Signal;

/// Result of feeding a price to a slot.
///
/// `trade.balance` is left at zero; the portfolio stamps it once the P&L has
/// been folded into the account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub closed: bool,
    pub pnl: f64,
    pub trade: Option<ClosedTrade>,
}

impl UpdateOutcome {
    fn unchanged() -> Self {
        UpdateOutcome::default()
    }
}

#[derive(Debug, Clone)]
pub struct PositionSlot {
    instrument: String,
    costs: CostParameters,
    rng: StdRng,
    position: Option<Position>,
    last_price: Option<f64>,
}

impl PositionSlot {
    pub fn new(instrument: impl Into<String>, costs: CostParameters, rng: StdRng) -> Self {
        PositionSlot {
            instrument: instrument.into(),
            costs,
            rng,
            position: None,
            last_price: None,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn costs(&self) -> &CostParameters {
        &self.costs
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    /// Most recent price this slot was marked at.
    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Try to open a position. Returns `false`, with no side effect, when a
    /// position is already open, the signal is not actionable, the size is
    /// not positive, or free margin does not cover the new position.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        signal: &Signal,
        size: f64,
        price: f64,
        time: NaiveDateTime,
        balance: f64,
        equity: f64,
        used_margin: f64,
    ) -> bool {
        if self.position.is_some() || !signal.is_actionable() || size <= 0.0 {
            return false;
        }
        let Some(direction) = signal.direction else {
            return false;
        };
        if !self
            .costs
            .can_admit(balance, equity, used_margin, size, price)
        {
            return false;
        }

        let entry_price = self.costs.apply_entry_cost(price, direction, &mut self.rng);
        self.position = Some(Position {
            instrument: self.instrument.clone(),
            direction,
            entry_price,
            stop: signal.stop,
            target: signal.target,
            initial_stop: signal.stop,
            size,
            entry_time: time,
            commission: self.costs.commission(size),
            break_even_armed: false,
        });
        self.last_price = Some(price);
        true
    }

    /// Mark the position at `price`: stop first, then target, then the
    /// break-even ratchet.
    pub fn update(&mut self, price: f64, time: NaiveDateTime) -> UpdateOutcome {
        self.last_price = Some(price);
        let Some(pos) = self.position.as_ref() else {
            return UpdateOutcome::unchanged();
        };

        if pos.stop_hit(price) {
            return self.close(price, time, ExitReason::StopLoss);
        }
        if pos.target_hit(price) {
            return self.close(price, time, ExitReason::TakeProfit);
        }
        self.arm_break_even(price);
        UpdateOutcome::unchanged()
    }

    /// Bar-range variant of [`update`](Self::update). The stop is tested
    /// against the adverse extreme and the target against the favorable one,
    /// stop first. Fills happen at the level, or at the open when the bar
    /// gapped through it. Break-even arming uses the close.
    pub fn update_intrabar(&mut self, bar: &Bar, time: NaiveDateTime) -> UpdateOutcome {
        self.last_price = Some(bar.close);
        let Some(pos) = self.position.as_ref() else {
            return UpdateOutcome::unchanged();
        };

        let (adverse, favorable) = if pos.is_long() {
            (bar.low, bar.high)
        } else {
            (bar.high, bar.low)
        };

        if pos.stop_hit(adverse) {
            let fill = if pos.stop_hit(bar.open) { bar.open } else { pos.stop };
            return self.close(fill, time, ExitReason::StopLoss);
        }
        if pos.target_hit(favorable) {
            let fill = if pos.target_hit(bar.open) {
                bar.open
            } else {
                pos.target
            };
            return self.close(fill, time, ExitReason::TakeProfit);
        }
        self.arm_break_even(bar.close);
        UpdateOutcome::unchanged()
    }

    /// Close whatever is open at `price`, regardless of levels.
    pub fn force_close(&mut self, price: f64, time: NaiveDateTime) -> UpdateOutcome {
        self.last_price = Some(price);
        if self.position.is_none() {
            return UpdateOutcome::unchanged();
        }
        self.close(price, time, ExitReason::Forced)
    }

    /// Gross P&L of the open position at `price`. Commission is only
    /// charged against the realized P&L on close.
    pub fn floating_pnl(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => pos.gross_pnl(price, self.costs.contract_size),
            None => 0.0,
        }
    }

    pub fn used_margin(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => self.costs.required_margin(pos.size, price),
            None => 0.0,
        }
    }

    /// Floating P&L at the last marked price.
    pub fn marked_pnl(&self) -> f64 {
        self.last_price.map_or(0.0, |p| self.floating_pnl(p))
    }

    /// Used margin at the last marked price.
    pub fn marked_margin(&self) -> f64 {
        self.last_price.map_or(0.0, |p| self.used_margin(p))
    }

    pub fn risk_multiple(&self, price: f64) -> f64 {
        self.position
            .as_ref()
            .map_or(0.0, |pos| pos.risk_multiple(price))
    }

    fn arm_break_even(&mut self, price: f64) {
        let Some(pos) = self.position.as_mut() else {
            return;
        };
        if pos.break_even_armed || pos.risk_multiple(price) < 1.0 {
            return;
        }
        // Only tighten: a stop already past entry stays where it is.
        let tighter = if pos.is_long() {
            pos.stop.max(pos.entry_price)
        } else {
            pos.stop.min(pos.entry_price)
        };
        pos.stop = tighter;
        pos.break_even_armed = true;
    }

    fn close(&mut self, exit_price: f64, time: NaiveDateTime, reason: ExitReason) -> UpdateOutcome {
        let Some(pos) = self.position.take() else {
            return UpdateOutcome::unchanged();
        };
        let pnl = pos.gross_pnl(exit_price, self.costs.contract_size) - pos.commission;
        let trade = ClosedTrade {
            instrument: pos.instrument,
            direction: pos.direction,
            entry_time: pos.entry_time,
            exit_time: time,
            entry_price: pos.entry_price,
            exit_price,
            stop: pos.stop,
            target: pos.target,
            size: pos.size,
            commission: pos.commission,
            pnl,
            exit_reason: reason,
            balance: 0.0,
        };
        UpdateOutcome {
            closed: true,
            pnl,
            trade: Some(trade),
        }
    }
}
