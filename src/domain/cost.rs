//! Venue cost model: margin, spread, slippage and commission.
//!
//! All prices are in quote currency per unit of the instrument, sizes are in
//! lots. Spread and slippage are absolute price offsets and always move the
//! fill against the trader.

use rand::Rng;
use rand::rngs::StdRng;

use super::position::Direction;

/// Per-instrument cost parameters, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CostParameters {
    pub leverage: f64,
    pub spread: f64,
    pub commission_per_unit: f64,
    pub contract_size: f64,
    pub slippage_min: f64,
    pub slippage_max: f64,
}

impl Default for CostParameters {
    fn default() -> Self {
        CostParameters {
            leverage: 100.0,
            spread: 0.0,
            commission_per_unit: 0.0,
            contract_size: 1.0,
            slippage_min: 0.0,
            slippage_max: 0.0,
        }
    }
}

impl CostParameters {
    /// Margin locked by a position of `size` lots opened at `price`.
    pub fn required_margin(&self, size: f64, price: f64) -> f64 {
        size * self.contract_size * price / self.leverage
    }

    /// Entry fill price after spread and a slippage draw.
    ///
    /// When the slippage bounds coincide the fixed amount is applied and the
    /// RNG is left untouched.
    pub fn apply_entry_cost(&self, price: f64, direction: Direction, rng: &mut StdRng) -> f64 {
        let slippage = if self.slippage_max > self.slippage_min {
            rng.gen_range(self.slippage_min..=self.slippage_max)
        } else {
            self.slippage_min
        };
        price + direction.sign() * (self.spread + slippage)
    }

    pub fn commission(&self, size: f64) -> f64 {
        size * self.commission_per_unit
    }

    /// True iff free margin (`equity - used_margin`) covers the margin the
    /// new position would lock.
    pub fn can_admit(
        &self,
        _balance: f64,
        equity: f64,
        used_margin: f64,
        size: f64,
        price: f64,
    ) -> bool {
        equity - used_margin >= self.required_margin(size, price)
    }
}
