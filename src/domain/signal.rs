//! Strategy output types: entry signals and sized trade parameters.

use super::position::Direction;

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub valid: bool,
    pub direction: Option<Direction>,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl Signal {
    pub fn none() -> Self {
        Signal {
            valid: false,
            direction: None,
            entry: 0.0,
            stop: 0.0,
            target: 0.0,
        }
    }

    pub fn new(direction: Direction, entry: f64, stop: f64, target: f64) -> Self {
        Signal {
            valid: true,
            direction: Some(direction),
            entry,
            stop,
            target,
        }
    }

    /// A signal the engine may act on: flagged valid, carrying a direction,
    /// and with finite price levels. Anything else counts as "no signal".
    pub fn is_actionable(&self) -> bool {
        self.valid
            && self.direction.is_some()
            && self.entry.is_finite()
            && self.stop.is_finite()
            && self.target.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeParams {
    pub size: f64,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

/// Standard fixed-fractional sizing: lots whose stop-out loses `risk_pct`
/// percent of `balance`. Rounded to 0.01 lots with a floor of 0.01.
///
/// Returns `None` when the stop distance is zero.
pub fn risk_sized_lots(balance: f64, risk_pct: f64, entry: f64, stop: f64, contract_size: f64) -> Option<f64> {
    let distance = (entry - stop).abs();
    if distance == 0.0 || contract_size <= 0.0 {
        return None;
    }
    let risk_amount = balance * risk_pct / 100.0;
    let raw = risk_amount / (distance * contract_size);
    let rounded = (raw * 100.0).round() / 100.0;
    Some(rounded.max(0.01))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_not_actionable() {
        assert!(!Signal::none().is_actionable());
    }

    #[test]
    fn valid_without_direction_is_rejected() {
        let sig = Signal {
            direction: None,
            ..Signal::new(Direction::Long, 1.0, 0.9, 1.2)
        };
        assert!(!sig.is_actionable());
    }

    #[test]
    fn non_finite_levels_are_rejected() {
        let sig = Signal::new(Direction::Short, 1.0, f64::NAN, 0.8);
        assert!(!sig.is_actionable());
        let sig = Signal::new(Direction::Short, 1.0, 1.1, f64::INFINITY);
        assert!(!sig.is_actionable());
    }

    #[test]
    fn sizing_formula() {
        // 10000 * 1% = 100 risk; 10 points * 100 contract = 1000 per lot
        let lots = risk_sized_lots(10_000.0, 1.0, 2000.0, 1990.0, 100.0).unwrap();
        assert!((lots - 0.1).abs() < 1e-9);
    }

    #[test]
    fn sizing_floor_and_zero_distance() {
        let lots = risk_sized_lots(100.0, 0.75, 2000.0, 1990.0, 100.0).unwrap();
        assert!((lots - 0.01).abs() < 1e-9);
        assert!(risk_sized_lots(100.0, 1.0, 2000.0, 2000.0, 100.0).is_none());
    }
}
