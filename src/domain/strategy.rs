//! Strategy identifiers accepted in configuration.
//!
//! The engine only sees strategies through
//! [`StrategyPort`](crate::ports::strategy_port::StrategyPort); this enum is
//! the closed set of ids a config file may name. Construction lives in
//! [`adapters::strategies`](crate::adapters::strategies).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    SwingBreakout,
    SmaTrend,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::SwingBreakout, StrategyKind::SmaTrend];

    pub fn id(self) -> &'static str {
        match self {
            StrategyKind::SwingBreakout => "swing_breakout",
            StrategyKind::SmaTrend => "sma_trend",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StrategyKind::SwingBreakout => {
                "coarse swing break sets direction; 1.5x ATR(14) stop, 2:1 target"
            }
            StrategyKind::SmaTrend => "SMA(5) vs SMA(20) on fine bars; 2% stop, 5% target",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.id() == wanted)
            .ok_or_else(|| format!("unknown strategy '{}'", s.trim()))
    }
}
