//! Open positions and the closed-trade ledger entries they produce.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("BUY"),
            Direction::Short => f.write_str("SELL"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Direction::Long),
            "SELL" | "SHORT" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Forced,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => f.write_str("SL"),
            ExitReason::TakeProfit => f.write_str("TP"),
            ExitReason::Forced => f.write_str("forced"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub instrument: String,
    pub direction: Direction,
    /// Fill price after spread and slippage.
    pub entry_price: f64,
    pub stop: f64,
    pub target: f64,
    pub initial_stop: f64,
    pub size: f64,
    pub entry_time: NaiveDateTime,
    pub commission: f64,
    pub break_even_armed: bool,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    /// Price move in the trader's favor, negative when adverse.
    pub fn favorable_move(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price)
    }

    /// Gross P&L at `price`, before commission.
    pub fn gross_pnl(&self, price: f64, contract_size: f64) -> f64 {
        self.favorable_move(price) * contract_size * self.size
    }

    pub fn stop_hit(&self, price: f64) -> bool {
        if self.is_long() {
            price <= self.stop
        } else {
            price >= self.stop
        }
    }

    pub fn target_hit(&self, price: f64) -> bool {
        if self.is_long() {
            price >= self.target
        } else {
            price <= self.target
        }
    }

    /// Favorable excursion measured in units of the current stop distance.
    pub fn risk_multiple(&self, price: f64) -> f64 {
        let distance = (self.entry_price - self.stop).abs();
        if distance == 0.0 {
            return 0.0;
        }
        self.favorable_move(price) / distance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub instrument: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop: f64,
    pub target: f64,
    pub size: f64,
    pub commission: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    /// Account balance after this trade's P&L was applied.
    pub balance: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
