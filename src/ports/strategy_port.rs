//! Signal generation port.

use chrono::NaiveDateTime;

use crate::domain::signal::{Signal, TradeParams};
use crate::domain::timeline::InstrumentData;

/// A per-instrument strategy instance driven by the orchestrator.
///
/// The orchestrator lends the instrument's bar history on every call; the
/// strategy must not look past `fine_index` / `coarse_index`.
pub trait StrategyPort {
    fn name(&self) -> &str;

    /// Called once per tick after the coarse cursor has advanced and is ready.
    fn refresh_context(&mut self, data: &InstrumentData, coarse_index: usize);

    fn generate_signal(
        &mut self,
        data: &InstrumentData,
        fine_index: usize,
        price: f64,
        time: NaiveDateTime,
    ) -> Signal;

    /// Turn an actionable signal into a sized trade, or `None` to pass.
    fn size_trade(&self, signal: &Signal, balance: f64, risk_fraction: f64) -> Option<TradeParams>;
}
